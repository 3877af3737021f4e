use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::cache::events::{list_cache_key, DEFAULT_PAGE_SIZE};
use crate::error::AppError;
use crate::middleware::{AdminUser, AuthUser};
use crate::models::Event;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", get(list_events))
        .route("/events", post(create_event))
        .route("/events/{id}", get(get_event))
        .route("/events/{id}", put(update_event))
        .route("/events/{id}", delete(delete_event))
}

/* ---------- LISTING ---------- */

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub query: Option<String>,
    pub page: Option<u32>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<u32>,
}

// GET /api/events
async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventsQuery>,
) -> Result<Response, AppError> {
    let query_val = params.query.as_deref().unwrap_or_default();
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 50);

    // 1. Listing pages are cached under a key built from the query params
    let cache_key = list_cache_key(query_val, page, page_size);

    if let Ok(Some(cached_json)) = state.cache.get_cached_listing(&cache_key).await {
        return Ok(Response::builder()
            .header("Content-Type", "application/json")
            .header("X-Cache", "HIT")
            .body(Body::from(cached_json))
            .unwrap());
    }

    // 2. Cache miss: go to the database
    let limit = page_size as i64;
    let offset = (page as i64 - 1) * page_size as i64;

    let events = if query_val.is_empty() {
        // Fast path for unfiltered listings
        sqlx::query_as::<_, Event>(
            "SELECT * FROM events
             WHERE starts_at > NOW()
             ORDER BY starts_at
             LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.db.pool)
        .await?
    } else {
        let pattern = format!("%{}%", query_val);
        sqlx::query_as::<_, Event>(
            "SELECT * FROM events
             WHERE starts_at > NOW()
               AND (title ILIKE $1 OR location ILIKE $1)
             ORDER BY starts_at
             LIMIT $2 OFFSET $3",
        )
        .bind(pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.db.pool)
        .await?
    };

    let body = json!({
        "events": events,
        "count": events.len(),
    });

    // 3. Store the serialized page for the next caller
    let json_str = serde_json::to_string(&body)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("serialize listing: {}", e)))?;

    if let Err(e) = state.cache.cache_listing(&cache_key, &json_str).await {
        tracing::error!("Failed to cache event listing: {:?}", e);
    }

    Ok(Response::builder()
        .header("Content-Type", "application/json")
        .header("X-Cache", "MISS")
        .body(Body::from(json_str))
        .unwrap())
}

// GET /api/events/{id}
async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let event = state
        .cache
        .get_event(id)
        .await?
        .ok_or(AppError::NotFound("Event"))?;

    Ok(Json(event))
}

/* ---------- MUTATIONS ---------- */

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateEventRequest {
    #[validate(length(min = 3, max = 200, message = "Title must be between 3 and 200 characters"))]
    title: String,
    #[validate(length(max = 2000, message = "Description must not exceed 2000 characters"))]
    description: Option<String>,
    #[validate(length(min = 2, max = 200, message = "Location must be between 2 and 200 characters"))]
    location: String,
    starts_at: NaiveDateTime,
    #[validate(range(min = 0.0, max = 100_000.0, message = "Price must be between 0 and 100,000"))]
    price: f64,
    #[validate(range(min = 1, max = 100_000, message = "Total seats must be between 1 and 100,000"))]
    total_seats: i32,
}

// POST /api/events
async fn create_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    // A new event starts fully available
    let event = sqlx::query_as::<_, Event>(
        "INSERT INTO events
             (title, description, location, starts_at, price, total_seats, available_seats, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $6, $7)
         RETURNING *",
    )
    .bind(&req.title)
    .bind(&req.description)
    .bind(&req.location)
    .bind(req.starts_at)
    .bind(req.price)
    .bind(req.total_seats)
    .bind(user.id)
    .fetch_one(&state.db.pool)
    .await?;

    state.cache.invalidate_listings().await;
    tracing::info!("event {} created by user {}", event.id, user.id);

    Ok((StatusCode::CREATED, Json(event)))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct UpdateEventRequest {
    #[validate(length(min = 3, max = 200, message = "Title must be between 3 and 200 characters"))]
    title: Option<String>,
    #[validate(length(max = 2000, message = "Description must not exceed 2000 characters"))]
    description: Option<String>,
    #[validate(length(min = 2, max = 200, message = "Location must be between 2 and 200 characters"))]
    location: Option<String>,
    starts_at: Option<NaiveDateTime>,
    #[validate(range(min = 0.0, max = 100_000.0, message = "Price must be between 0 and 100,000"))]
    price: Option<f64>,
}

// PUT /api/events/{id}
//
// total_seats is fixed at creation and not updatable.
async fn update_event(
    State(state): State<Arc<AppState>>,
    AdminUser(user): AdminUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let event = sqlx::query_as::<_, Event>(
        "UPDATE events
         SET title       = COALESCE($1, title),
             description = COALESCE($2, description),
             location    = COALESCE($3, location),
             starts_at   = COALESCE($4, starts_at),
             price       = COALESCE($5, price)
         WHERE id = $6
         RETURNING *",
    )
    .bind(&req.title)
    .bind(&req.description)
    .bind(&req.location)
    .bind(req.starts_at)
    .bind(req.price)
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await?
    .ok_or(AppError::NotFound("Event"))?;

    state.cache.invalidate_event(id).await;
    state.cache.invalidate_listings().await;
    tracing::info!("event {} updated by admin {}", id, user.id);

    Ok(Json(event))
}

// DELETE /api/events/{id}
async fn delete_event(
    State(state): State<Arc<AppState>>,
    AdminUser(user): AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Event"));
    }

    state.cache.invalidate_event(id).await;
    state.cache.invalidate_listings().await;
    tracing::info!("event {} removed by admin {}", id, user.id);

    Ok(Json(json!({ "message": "Event removed" })))
}
