use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::{Validate, ValidationError};

use crate::error::AppError;
use crate::middleware::create_token;
use crate::models::User;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/* ---------- REGISTER ---------- */

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    #[validate(length(min = 2, max = 50, message = "Name must be between 2 and 50 characters"))]
    name: String,
    #[validate(email(message = "Please provide a valid email"))]
    email: String,
    #[validate(
        length(min = 8, message = "Password must be at least 8 characters"),
        custom(function = password_strength)
    )]
    password: String,
}

fn password_strength(password: &str) -> Result<(), ValidationError> {
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_ascii_alphanumeric());

    if has_lower && has_upper && has_digit && has_special {
        Ok(())
    } else {
        let mut err = ValidationError::new("password_strength");
        err.message =
            Some("Password must contain uppercase, lowercase, number, and special character".into());
        Err(err)
    }
}

// POST /api/auth/register
async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    if User::find_by_email(&state.db.pool, &req.email)
        .await?
        .is_some()
    {
        return Err(AppError::BadRequest(
            "User already exists with this email".to_string(),
        ));
    }

    // bcrypt is CPU-bound, keep it off the async workers
    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || {
        bcrypt::hash(password, bcrypt::DEFAULT_COST)
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("hashing task failed: {}", e)))?
    .map_err(|e| AppError::Internal(anyhow::anyhow!("bcrypt failure: {}", e)))?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (name, email, password_hash)
         VALUES ($1, $2, $3)
         RETURNING *",
    )
    .bind(&req.name)
    .bind(&req.email)
    .bind(&password_hash)
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| match &e {
        // Lost the pre-check race: same unique index, same answer
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::BadRequest("User already exists with this email".to_string())
        }
        _ => AppError::Database(e),
    })?;

    let token = create_token(&user, &state.config.jwt)?;
    tracing::info!("user {} registered", user.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful",
            "id": user.id,
            "name": user.name,
            "email": user.email,
            "role": user.role,
            "token": token,
        })),
    ))
}

/* ---------- LOGIN ---------- */

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    #[validate(email(message = "Please provide a valid email"))]
    email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
}

// POST /api/auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    // Same error for unknown email and wrong password
    let user = User::find_by_email(&state.db.pool, &req.email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let candidate = user.clone();
    let password = req.password;
    let verified = tokio::task::spawn_blocking(move || candidate.verify_password(&password))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("verify task failed: {}", e)))?;

    if !verified {
        return Err(AppError::InvalidCredentials);
    }

    let token = create_token(&user, &state.config.jwt)?;

    Ok(Json(json!({
        "message": "Login successful",
        "id": user.id,
        "name": user.name,
        "email": user.email,
        "role": user.role,
        "token": token,
    })))
}
