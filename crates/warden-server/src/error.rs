//! HTTP error responses
//!
//! Every body has the shape `{"status":"error","message":...}`. Validation
//! failures add a per-field `errors` map. Nothing about why a token or
//! credential was refused ever reaches the client.

use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::debug;
use warden_auth::GatewayError;
use warden_auth::gateway::FieldErrors;

/// Error returned by handlers and the bearer layer
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing, invalid, expired or revoked credentials
    #[error("Unauthorized")]
    Unauthorized,

    /// Request fields failed validation
    #[error("The given data was invalid.")]
    Validation(FieldErrors),

    /// Body could not be read as JSON
    #[error("Malformed request body: {0}")]
    BadRequest(String),

    /// Resource does not exist
    #[error("Not found")]
    NotFound,

    /// A dependency is down
    #[error("Service unavailable")]
    Unavailable,

    /// Anything else
    #[error("Server error")]
    Internal,
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::Unauthorized => ApiError::Unauthorized,
            GatewayError::Validation(errors) => ApiError::Validation(errors),
            GatewayError::Unavailable(_) => ApiError::Unavailable,
            GatewayError::Internal(_) => ApiError::Internal,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(error = %rejection, "Rejected request body");
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation(errors) => json!({
                "status": "error",
                "message": self.to_string(),
                "errors": errors,
            }),
            ApiError::BadRequest(_) => json!({
                "status": "error",
                "message": "Malformed request body",
            }),
            _ => json!({
                "status": "error",
                "message": self.to_string(),
            }),
        };

        let mut response = (status, axum::Json(body)).into_response();
        if matches!(self, ApiError::Unauthorized) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
