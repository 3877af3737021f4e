use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub starts_at: NaiveDateTime,
    pub price: f64,
    pub total_seats: i32,
    pub available_seats: i32,
    pub created_by: i64,
    pub created_at: NaiveDateTime,
}

impl Event {
    pub async fn find_by_id(pool: &sqlx::PgPool, id: i64) -> Result<Option<Event>, sqlx::Error> {
        sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
