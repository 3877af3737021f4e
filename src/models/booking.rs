use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Statuses are stored as text, the allowed values are pinned by CHECK constraints.
pub const STATUS_CONFIRMED: &str = "confirmed";
pub const STATUS_CANCELED: &str = "canceled";
pub const PAYMENT_PENDING: &str = "pending";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub event_id: i64,
    pub quantity: i32,
    pub status: String,
    pub payment_status: String,
    pub created_at: NaiveDateTime,
}
