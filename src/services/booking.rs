//! booking.rs
//!
//! Seat inventory transactions. Both entry points run against a single
//! Postgres transaction so the seat counter and the booking records can
//! never diverge:
//!
//! 1. `create_booking` — conditionally decrements `available_seats` and
//!    inserts the booking. The decrement is one atomic UPDATE, never a
//!    read-then-write, so two requests racing for the last seats serialize
//!    on the event row and exactly one of them wins.
//! 2. `cancel_booking` — flips a confirmed booking to canceled and returns
//!    its quantity to the inventory.

use sqlx::PgPool;
use tracing::info;

use crate::error::AppError;
use crate::models::booking::{Booking, PAYMENT_PENDING, STATUS_CANCELED, STATUS_CONFIRMED};

/// Per-request ceiling for the seat quantity. Enforced again at the DTO
/// layer before any storage is touched.
pub const MAX_QUANTITY_PER_REQUEST: i32 = 50;

/// Reserves `quantity` seats on the event and records the booking.
///
/// Fails with `NotFound` when the event does not exist and with
/// `InsufficientSeats` when it exists but has fewer seats left than
/// requested. The two cases are distinguished with an existence check on
/// the failure path only.
pub async fn create_booking(
    pool: &PgPool,
    user_id: i64,
    event_id: i64,
    quantity: i32,
) -> Result<Booking, AppError> {
    if !(1..=MAX_QUANTITY_PER_REQUEST).contains(&quantity) {
        return Err(AppError::BadRequest(
            "Quantity must be between 1 and 50".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    // Atomic conditional decrement. The WHERE clause is the whole point:
    // the check and the mutation are one indivisible statement.
    let remaining = sqlx::query_scalar::<_, i32>(
        "UPDATE events
         SET available_seats = available_seats - $1
         WHERE id = $2 AND available_seats >= $1
         RETURNING available_seats",
    )
    .bind(quantity)
    .bind(event_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(remaining) = remaining else {
        // Zero rows matched: either the event is missing or it is sold out
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM events WHERE id = $1)")
                .bind(event_id)
                .fetch_one(&mut *tx)
                .await?;
        tx.rollback().await?;

        return Err(if exists {
            AppError::InsufficientSeats
        } else {
            AppError::NotFound("Event")
        });
    };

    // Same transaction as the decrement: if this insert fails, the
    // decrement rolls back with it.
    let booking = sqlx::query_as::<_, Booking>(
        "INSERT INTO bookings (user_id, event_id, quantity, status, payment_status)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING *",
    )
    .bind(user_id)
    .bind(event_id)
    .bind(quantity)
    .bind(STATUS_CONFIRMED)
    .bind(PAYMENT_PENDING)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        "booking {} created: event {} x{}, {} seats remaining",
        booking.id, event_id, quantity, remaining
    );
    Ok(booking)
}

/// Cancels a confirmed booking and returns its seats to the event.
///
/// Only the booking's owner or an admin may cancel. A second cancel of the
/// same booking fails cleanly instead of double-crediting the inventory.
pub async fn cancel_booking(
    pool: &PgPool,
    caller_id: i64,
    caller_is_admin: bool,
    booking_id: i64,
) -> Result<Booking, AppError> {
    let owner: Option<i64> = sqlx::query_scalar("SELECT user_id FROM bookings WHERE id = $1")
        .bind(booking_id)
        .fetch_optional(pool)
        .await?;

    let Some(owner) = owner else {
        return Err(AppError::NotFound("Booking"));
    };
    if owner != caller_id && !caller_is_admin {
        return Err(AppError::Forbidden);
    }

    let mut tx = pool.begin().await?;

    // Status guard makes the cancel idempotence-safe: the second attempt
    // matches zero rows and never reaches the seat increment.
    let booking = sqlx::query_as::<_, Booking>(
        "UPDATE bookings
         SET status = $1
         WHERE id = $2 AND status = $3
         RETURNING *",
    )
    .bind(STATUS_CANCELED)
    .bind(booking_id)
    .bind(STATUS_CONFIRMED)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(booking) = booking else {
        tx.rollback().await?;
        return Err(AppError::BadRequest("Booking already canceled".to_string()));
    };

    let updated = sqlx::query(
        "UPDATE events
         SET available_seats = available_seats + $1
         WHERE id = $2",
    )
    .bind(booking.quantity)
    .bind(booking.event_id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(AppError::NotFound("Event"));
    }

    tx.commit().await?;

    info!(
        "booking {} canceled: {} seats returned to event {}",
        booking.id, booking.quantity, booking.event_id
    );
    Ok(booking)
}
