//! Client-facing errors of the proxy routes

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use relay_core::{ErrorKind, RelayError};
use tracing::error;

/// Error returned by a proxy route
///
/// Upstream details are logged, never returned; the client only sees the
/// kind and a fixed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    UpstreamUnavailable,
    Internal(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Unauthorized(_) => ErrorKind::Unauthorized,
            ApiError::BadRequest(_) => ErrorKind::BadRequest,
            ApiError::UpstreamUnavailable => ErrorKind::UpstreamUnavailable,
            ApiError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Unauthorized(msg) | ApiError::BadRequest(msg) | ApiError::Internal(msg) => {
                msg.clone()
            }
            ApiError::UpstreamUnavailable => "The agent server is unavailable".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({
            "success": false,
            "error": self.message(),
            "kind": self.kind().as_str(),
            "code": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        match err.kind() {
            ErrorKind::Unauthorized => ApiError::Unauthorized(err.to_string()),
            ErrorKind::BadRequest | ErrorKind::MalformedEvent => {
                ApiError::BadRequest(err.to_string())
            }
            ErrorKind::UpstreamUnavailable => {
                error!("Upstream failure: {}", err);
                ApiError::UpstreamUnavailable
            }
            ErrorKind::Internal => {
                error!("RelayError: {}", err);
                ApiError::Internal("Internal error".to_string())
            }
        }
    }
}
