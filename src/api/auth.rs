//! Registration, login, and the bearer-token middleware.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::routes::AppState;
use super::types::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use crate::auth::{self, AuthUser};
use crate::error::ApiError;

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let email = req.email.trim().to_lowercase();
    auth::validate_registration(&email, &req.password, &req.name).map_err(ApiError::Validation)?;

    let password_hash = auth::hash_password(&req.password);
    let user = state
        .store
        .create_user(&email, &password_hash, req.name.trim())
        .await?;

    tracing::info!(user = %user.id, "registered new user");
    Ok(Json(RegisterResponse {
        message: "registration successful, please log in".to_string(),
    }))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = req.email.trim().to_lowercase();

    let user = match state.store.user_by_email(&email).await? {
        Some(user) => {
            if !auth::verify_password(&req.password, &user.password_hash) {
                return Err(ApiError::InvalidCredentials);
            }
            user
        }
        None => {
            // Burn equivalent work so unknown email is not distinguishable
            // by timing.
            auth::dummy_verify(&req.password);
            return Err(ApiError::InvalidCredentials);
        }
    };

    let identity = AuthUser {
        id: user.id,
        email: user.email,
    };
    let (token, exp) = auth::issue_jwt(
        &state.config.jwt_secret,
        state.config.jwt_ttl_days,
        &identity,
    )?;

    Ok(Json(LoginResponse { token, exp }))
}

/// Require a valid `Authorization: Bearer <jwt>` and attach the resolved
/// [`AuthUser`] as a request extension.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .unwrap_or("");

    if token.is_empty() {
        return ApiError::Unauthenticated.into_response();
    }

    match auth::verify_jwt(token, &state.config.jwt_secret) {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(_) => ApiError::Unauthenticated.into_response(),
    }
}
