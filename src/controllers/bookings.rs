use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::Row;
use std::sync::Arc;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::{AdminUser, AuthUser};
use crate::models::Event;
use crate::services::booking;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(create_booking))
        .route("/bookings", get(get_all_bookings))
        .route("/bookings/user/{id}", get(get_user_bookings))
        .route("/bookings/cancel", patch(cancel_booking))
}

/* ---------- CREATE ---------- */

// POST /api/bookings
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateBookingRequest {
    #[validate(range(min = 1, message = "Event ID must be positive"))]
    event_id: Option<i64>,
    #[validate(range(min = 1, max = 50, message = "Quantity must be between 1 and 50"))]
    quantity: Option<i32>,
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Rejected here, before any storage is touched
    req.validate()?;
    let (event_id, quantity) = match (req.event_id, req.quantity) {
        (Some(event_id), Some(quantity)) => (event_id, quantity),
        _ => return Err(AppError::BadRequest("Missing fields".to_string())),
    };

    let booking = booking::create_booking(&state.db.pool, user.id, event_id, quantity).await?;

    // The seat count changed, cached copies of the event are stale
    state.cache.invalidate_event(event_id).await;
    state.cache.invalidate_listings().await;

    Ok((StatusCode::CREATED, Json(booking)))
}

/* ---------- QUERIES ---------- */

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BookingWithEvent {
    id: i64,
    quantity: i32,
    status: String,
    payment_status: String,
    created_at: NaiveDateTime,
    event: Event,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserSummary {
    id: i64,
    name: String,
    email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BookingWithEventAndUser {
    id: i64,
    quantity: i32,
    status: String,
    payment_status: String,
    created_at: NaiveDateTime,
    event: Event,
    user: UserSummary,
}

fn event_from_row(row: &sqlx::postgres::PgRow) -> Event {
    Event {
        id: row.get("e_id"),
        title: row.get("title"),
        description: row.get("description"),
        location: row.get("location"),
        starts_at: row.get("starts_at"),
        price: row.get("price"),
        total_seats: row.get("total_seats"),
        available_seats: row.get("available_seats"),
        created_by: row.get("created_by"),
        created_at: row.get("e_created_at"),
    }
}

// GET /api/bookings/user/{id}
//
// Callers may only fetch their own bookings, admins anyone's.
async fn get_user_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !user.is_admin() && user.id != id {
        return Err(AppError::Forbidden);
    }

    let rows = sqlx::query(
        r#"
        SELECT b.id AS b_id, b.quantity, b.status, b.payment_status, b.created_at AS b_created_at,
               e.id AS e_id, e.title, e.description, e.location, e.starts_at, e.price,
               e.total_seats, e.available_seats, e.created_by, e.created_at AS e_created_at
        FROM bookings b
        JOIN events e ON e.id = b.event_id
        WHERE b.user_id = $1
        ORDER BY b.created_at DESC
        "#,
    )
    .bind(id)
    .fetch_all(&state.db.pool)
    .await?;

    let bookings: Vec<BookingWithEvent> = rows
        .iter()
        .map(|row| BookingWithEvent {
            id: row.get("b_id"),
            quantity: row.get("quantity"),
            status: row.get("status"),
            payment_status: row.get("payment_status"),
            created_at: row.get("b_created_at"),
            event: event_from_row(row),
        })
        .collect();

    Ok(Json(bookings))
}

// GET /api/bookings  (admin)
async fn get_all_bookings(
    State(state): State<Arc<AppState>>,
    AdminUser(_user): AdminUser,
) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query(
        r#"
        SELECT b.id AS b_id, b.quantity, b.status, b.payment_status, b.created_at AS b_created_at,
               e.id AS e_id, e.title, e.description, e.location, e.starts_at, e.price,
               e.total_seats, e.available_seats, e.created_by, e.created_at AS e_created_at,
               u.id AS u_id, u.name AS u_name, u.email AS u_email
        FROM bookings b
        JOIN events e ON e.id = b.event_id
        JOIN users u ON u.id = b.user_id
        ORDER BY b.created_at DESC
        "#,
    )
    .fetch_all(&state.db.pool)
    .await?;

    let bookings: Vec<BookingWithEventAndUser> = rows
        .iter()
        .map(|row| BookingWithEventAndUser {
            id: row.get("b_id"),
            quantity: row.get("quantity"),
            status: row.get("status"),
            payment_status: row.get("payment_status"),
            created_at: row.get("b_created_at"),
            event: event_from_row(row),
            user: UserSummary {
                id: row.get("u_id"),
                name: row.get("u_name"),
                email: row.get("u_email"),
            },
        })
        .collect();

    Ok(Json(bookings))
}

/* ---------- CANCEL ---------- */

// PATCH /api/bookings/cancel
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CancelBookingRequest {
    #[validate(range(min = 1, message = "Booking ID must be positive"))]
    booking_id: Option<i64>,
}

async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CancelBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let Some(booking_id) = req.booking_id else {
        return Err(AppError::BadRequest("Missing fields".to_string()));
    };

    let booking =
        booking::cancel_booking(&state.db.pool, user.id, user.is_admin(), booking_id).await?;

    state.cache.invalidate_event(booking.event_id).await;
    state.cache.invalidate_listings().await;

    Ok(Json(json!({ "message": "Booking successfully canceled" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn missing_fields_are_detected() {
        let req = CreateBookingRequest {
            event_id: None,
            quantity: Some(2),
        };
        // range validators skip absent fields, the handler catches them
        assert!(req.validate().is_ok());
        assert!(req.event_id.is_none());
    }

    proptest! {
        #[test]
        fn quantity_within_bounds_is_accepted(quantity in 1i32..=50) {
            let req = CreateBookingRequest {
                event_id: Some(1),
                quantity: Some(quantity),
            };
            prop_assert!(req.validate().is_ok());
        }

        #[test]
        fn quantity_outside_bounds_is_rejected(
            quantity in prop_oneof![i32::MIN..=0, 51i32..=i32::MAX]
        ) {
            let req = CreateBookingRequest {
                event_id: Some(1),
                quantity: Some(quantity),
            };
            prop_assert!(req.validate().is_err());
        }
    }

    #[test]
    fn nonpositive_event_id_is_rejected() {
        let req = CreateBookingRequest {
            event_id: Some(0),
            quantity: Some(1),
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("event_id"));
    }
}
