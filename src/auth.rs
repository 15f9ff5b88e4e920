use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

const DEV_USER_HEADER: &str = "x-user-id";

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[allow(dead_code)]
    exp: usize,
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
}

pub async fn require_auth(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, AppError> {
    if state.config.auth_dev_overrides_enabled() {
        if let Some(raw) = headers.get(DEV_USER_HEADER).and_then(|v| v.to_str().ok()) {
            let id = Uuid::parse_str(raw.trim()).map_err(|_| {
                AppError::Unauthorized("Invalid x-user-id override.".to_string())
            })?;
            return Ok(AuthUser { id, email: None });
        }
    }

    let token = bearer_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token.".to_string()))?;
    let secret = state
        .config
        .jwt_secret
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Dependency("JWT_SECRET is not configured.".to_string()))?;

    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| AppError::Unauthorized("Invalid or expired token.".to_string()))?;

    let id = Uuid::parse_str(decoded.claims.sub.trim())
        .map_err(|_| AppError::Unauthorized("Invalid token subject.".to_string()))?;

    Ok(AuthUser {
        id,
        email: decoded.claims.email,
    })
}

pub async fn require_user_id(state: &AppState, headers: &HeaderMap) -> Result<Uuid, AppError> {
    Ok(require_auth(state, headers).await?.id)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
