//! HTTP handlers
//!
//! Successful bodies are `{"status":"success", ...}`. Sessions carry the
//! user and an `authorisation` object with the token, its type and its
//! lifetime in seconds.

use axum::Extension;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde_json::{Value, json};
use warden_auth::{AuthSession, LoginRequest, RegisterRequest, VerifiedToken};

use crate::error::ApiError;
use crate::middleware::BearerToken;
use crate::state::AppState;

type ApiResult = Result<Json<Value>, ApiError>;

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload?;
    let session = state.gateway.login(request).await?;
    Ok(Json(session_body(&session, None)))
}

/// `POST /api/auth/register`
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload?;
    let session = state.gateway.register(request).await?;
    Ok(Json(session_body(
        &session,
        Some("User created successfully"),
    )))
}

/// `POST /api/auth/logout`
pub async fn logout(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> ApiResult {
    state.gateway.logout(token.as_str()).await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Successfully logged out",
    })))
}

/// `POST /api/auth/refresh`
pub async fn refresh(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> ApiResult {
    let session = state.gateway.refresh(token.as_str()).await?;
    Ok(Json(session_body(&session, None)))
}

/// `GET /api/auth/me`
pub async fn me(
    State(state): State<AppState>,
    Extension(verified): Extension<VerifiedToken>,
) -> ApiResult {
    let user = state
        .gateway
        .profile(&verified)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(json!({ "status": "success", "user": user })))
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Any unrouted request that got past the bearer layer
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

fn session_body(session: &AuthSession, message: Option<&str>) -> Value {
    let user = match &session.user {
        Some(user) => json!(user),
        None => json!({ "id": session.subject }),
    };

    let mut body = json!({
        "status": "success",
        "user": user,
        "authorisation": {
            "token": session.token.token(),
            "type": session.token_type(),
            "expires_in": session.expires_in(),
        },
    });
    if let Some(message) = message {
        body["message"] = json!(message);
    }
    body
}
