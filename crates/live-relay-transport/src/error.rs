//! HTTP error mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use live_relay_core::traits::UpstreamError;
use serde_json::json;

/// Error returned by the pass-through handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Upstream answered with a non-2xx status, mirrored to the caller.
    #[error("{what} failed: {body}")]
    Upstream {
        what: &'static str,
        status: StatusCode,
        body: String,
    },
    /// Upstream could not be reached.
    #[error("upstream connection failed: {0}")]
    Unavailable(String),
    /// Upstream answered with something that is not JSON.
    #[error("{what} returned a malformed body: {reason}")]
    BadGateway { what: &'static str, reason: String },
    /// Request parameters out of range.
    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    /// Map an upstream failure for the request described by `what`.
    #[must_use]
    pub fn upstream(what: &'static str, err: UpstreamError) -> Self {
        match err {
            UpstreamError::Status { status, body } => Self::Upstream {
                what,
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                body,
            },
            UpstreamError::Decode(reason) => Self::BadGateway { what, reason },
            err @ (UpstreamError::Timeout | UpstreamError::Transport(_)) => {
                Self::Unavailable(err.to_string())
            }
        }
    }

    /// Status code sent to the caller.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Upstream { status, .. } => *status,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{self}");
        } else {
            tracing::warn!("{self}");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
