use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{config::JwtConfig, error::AppError, models::User};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub role: String,
    pub exp: i64,
}

/// Signs a token for the given user.
pub fn create_token(user: &User, config: &JwtConfig) -> Result<String, AppError> {
    let expires_at = Utc::now() + chrono::Duration::hours(config.expires_in_hours);
    let claims = Claims {
        sub: user.id,
        role: user.role.clone(),
        exp: expires_at.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to sign token: {}", e)))
}

pub fn decode_token(token: &str, config: &JwtConfig) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized)
}

/// The authenticated caller, resolved from a Bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

// Bearer token extractor
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthorized)?;

        let claims = decode_token(token, &state.config.jwt)?;

        // Role and profile come from the store, not the token; a deleted or
        // demoted user is rejected even while their token is still live.
        let user = User::find_by_id(&state.db.pool, claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(AuthUser {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        })
    }
}

/// An authenticated caller with the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl FromRequestParts<Arc<crate::AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            expires_in_hours: 24,
        }
    }

    fn test_user(role: &str) -> User {
        User {
            id: 42,
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            password_hash: String::new(),
            role: role.to_string(),
            created_at: NaiveDateTime::default(),
        }
    }

    #[test]
    fn token_roundtrip_preserves_identity_and_role() {
        let config = test_config();
        let token = create_token(&test_user("admin"), &config).unwrap();
        let claims = decode_token(&token, &config).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, "admin");
    }

    #[test]
    fn token_signed_with_a_different_secret_is_rejected() {
        let token = create_token(&test_user("user"), &test_config()).unwrap();
        let other = JwtConfig {
            secret: "other-secret".to_string(),
            expires_in_hours: 24,
        };
        assert!(matches!(
            decode_token(&token, &other),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = JwtConfig {
            secret: "test-secret".to_string(),
            expires_in_hours: -1,
        };
        let token = create_token(&test_user("user"), &config).unwrap();
        assert!(matches!(
            decode_token(&token, &config),
            Err(AppError::Unauthorized)
        ));
    }
}
