use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::warn;

use portier_identity::IdentityError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// An error returned from a handler, rendered as `{"error": ...}`.
#[derive(Debug)]
pub enum ApiError {
    Identity(IdentityError),
    Internal(String),
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        Self::Identity(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Identity(IdentityError::Validation(_)) => StatusCode::BAD_REQUEST,
            Self::Identity(IdentityError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Identity(IdentityError::Upstream(_) | IdentityError::Indeterminate { .. }) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Identity(IdentityError::Backend(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Identity(IdentityError::AllocationExhausted) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            Self::Identity(e) => e.to_string(),
            Self::Internal(msg) => msg,
        };
        if status.is_server_error() {
            warn!(status = status.as_u16(), %error, "request failed");
        }
        (status, Json(ErrorBody { error })).into_response()
    }
}
