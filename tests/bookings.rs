//! Inventory properties of the booking transaction, run against a real
//! Postgres instance. Ignored by default; run with
//! `DATABASE_URL=... cargo test -- --ignored`.

use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use sqlx::PgPool;

use event_booking::error::AppError;
use event_booking::services::booking::{cancel_booking, create_booking};

async fn seed_user(pool: &PgPool, tag: &str) -> i64 {
    let name: String = Name().fake();
    let email: String = format!("{}.{}", tag, SafeEmail().fake::<String>());
    sqlx::query_scalar(
        "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, 'x') RETURNING id",
    )
    .bind(name)
    .bind(email)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn seed_event(pool: &PgPool, owner: i64, total_seats: i32) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO events (title, location, starts_at, price, total_seats, available_seats, created_by)
         VALUES ('Load Test Night', 'Almaty', NOW() + interval '1 day', 10, $1, $1, $2)
         RETURNING id",
    )
    .bind(total_seats)
    .bind(owner)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn available_seats(pool: &PgPool, event_id: i64) -> i32 {
    sqlx::query_scalar("SELECT available_seats FROM events WHERE id = $1")
        .bind(event_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test(migrations = "./src/migrations")]
#[ignore = "requires a running Postgres"]
async fn booking_every_seat_then_one_more_fails(pool: PgPool) {
    let user = seed_user(&pool, "u1").await;
    let event = seed_event(&pool, user, 5).await;

    let booking = create_booking(&pool, user, event, 5).await.unwrap();
    assert_eq!(booking.quantity, 5);
    assert_eq!(booking.status, "confirmed");
    assert_eq!(booking.payment_status, "pending");
    assert_eq!(available_seats(&pool, event).await, 0);

    let err = create_booking(&pool, user, event, 1).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientSeats));
    assert_eq!(available_seats(&pool, event).await, 0);
}

#[sqlx::test(migrations = "./src/migrations")]
#[ignore = "requires a running Postgres"]
async fn unknown_event_is_distinguished_from_sold_out(pool: PgPool) {
    let user = seed_user(&pool, "u1").await;

    let err = create_booking(&pool, user, 999_999, 1).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound("Event")));
}

#[sqlx::test(migrations = "./src/migrations")]
#[ignore = "requires a running Postgres"]
async fn sequential_overbooking_scenario(pool: PgPool) {
    let u1 = seed_user(&pool, "u1").await;
    let u2 = seed_user(&pool, "u2").await;
    let event = seed_event(&pool, u1, 10).await;

    create_booking(&pool, u1, event, 3).await.unwrap();
    assert_eq!(available_seats(&pool, event).await, 7);

    let err = create_booking(&pool, u2, event, 8).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientSeats));
    assert_eq!(available_seats(&pool, event).await, 7);

    create_booking(&pool, u2, event, 7).await.unwrap();
    assert_eq!(available_seats(&pool, event).await, 0);
}

#[sqlx::test(migrations = "./src/migrations")]
#[ignore = "requires a running Postgres"]
async fn concurrent_requests_for_the_last_seat(pool: PgPool) {
    let u1 = seed_user(&pool, "u1").await;
    let u2 = seed_user(&pool, "u2").await;
    let event = seed_event(&pool, u1, 1).await;

    let p1 = pool.clone();
    let p2 = pool.clone();
    let first = tokio::spawn(async move { create_booking(&p1, u1, event, 1).await });
    let second = tokio::spawn(async move { create_booking(&p2, u2, event, 1).await });

    let results = [first.await.unwrap(), second.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let sold_out = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::InsufficientSeats)))
        .count();

    // exactly one winner, never both, never neither
    assert_eq!(successes, 1);
    assert_eq!(sold_out, 1);
    assert_eq!(available_seats(&pool, event).await, 0);
}

#[sqlx::test(migrations = "./src/migrations")]
#[ignore = "requires a running Postgres"]
async fn invalid_quantity_never_touches_storage(pool: PgPool) {
    let user = seed_user(&pool, "u1").await;
    let event = seed_event(&pool, user, 10).await;

    for quantity in [0, -3, 51] {
        let err = create_booking(&pool, user, event, quantity)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    assert_eq!(available_seats(&pool, event).await, 10);
    let bookings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE event_id = $1")
        .bind(event)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(bookings, 0);
}

#[sqlx::test(migrations = "./src/migrations")]
#[ignore = "requires a running Postgres"]
async fn cancel_restores_inventory_exactly_once(pool: PgPool) {
    let owner = seed_user(&pool, "owner").await;
    let stranger = seed_user(&pool, "stranger").await;
    let event = seed_event(&pool, owner, 10).await;

    let booking = create_booking(&pool, owner, event, 4).await.unwrap();
    assert_eq!(available_seats(&pool, event).await, 6);

    // not the owner, not an admin
    let err = cancel_booking(&pool, stranger, false, booking.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    assert_eq!(available_seats(&pool, event).await, 6);

    let canceled = cancel_booking(&pool, owner, false, booking.id)
        .await
        .unwrap();
    assert_eq!(canceled.status, "canceled");
    assert_eq!(available_seats(&pool, event).await, 10);

    // a second cancel must not double-credit the seats
    let err = cancel_booking(&pool, owner, false, booking.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(available_seats(&pool, event).await, 10);
}

#[sqlx::test(migrations = "./src/migrations")]
#[ignore = "requires a running Postgres"]
async fn admin_may_cancel_a_foreign_booking(pool: PgPool) {
    let owner = seed_user(&pool, "owner").await;
    let admin = seed_user(&pool, "admin").await;
    let event = seed_event(&pool, owner, 3).await;

    let booking = create_booking(&pool, owner, event, 2).await.unwrap();
    cancel_booking(&pool, admin, true, booking.id).await.unwrap();
    assert_eq!(available_seats(&pool, event).await, 3);
}

#[sqlx::test(migrations = "./src/migrations")]
#[ignore = "requires a running Postgres"]
async fn canceling_a_missing_booking_is_not_found(pool: PgPool) {
    let user = seed_user(&pool, "u1").await;

    let err = cancel_booking(&pool, user, false, 424_242).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound("Booking")));
}
