use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error taxonomy. Every failure a handler can produce maps to
/// exactly one HTTP response here; nothing is retried.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Not enough seats available")]
    InsufficientSeats,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("Not authorized")]
    Unauthorized,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Access denied")]
    Forbidden,

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InsufficientSeats | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            // Field-level detail for the caller, mirroring the request DTO rules
            AppError::Validation(errors) => json!({
                "message": "Validation failed",
                "errors": errors,
            }),
            AppError::Database(e) => {
                tracing::error!("database error: {:?}", e);
                internal_body(&format!("{:?}", e))
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {:?}", e);
                internal_body(&format!("{:?}", e))
            }
            other => json!({ "message": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

// Production-safe message; the cause only leaks into the body in debug builds.
fn internal_body(detail: &str) -> serde_json::Value {
    if cfg!(debug_assertions) {
        json!({ "message": "Something went wrong", "detail": detail })
    } else {
        json!({ "message": "Something went wrong" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_seats_is_a_bad_request_with_the_exact_message() {
        let err = AppError::InsufficientSeats;
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Not enough seats available");
    }

    #[test]
    fn not_found_and_auth_failures_map_to_their_statuses() {
        assert_eq!(AppError::NotFound("Event").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::InvalidCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn storage_failures_stay_internal() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_errors_carry_field_detail() {
        let mut errors = validator::ValidationErrors::new();
        errors.add("quantity".into(), validator::ValidationError::new("range"));
        let err = AppError::Validation(errors);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
