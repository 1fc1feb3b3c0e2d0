//! Mapping from [`LensError`] to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use uilens_core::LensError;

/// Handler error: a [`LensError`] rendered as
/// `{"success": false, "description": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub LensError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LensError::InvalidArgument { .. }
            | LensError::UnsupportedLocator(_)
            | LensError::UnsupportedPlatform(_)
            | LensError::Unsupported { .. } => StatusCode::BAD_REQUEST,
            LensError::ElementNotFound(_) | LensError::Widget(_) => StatusCode::NOT_FOUND,
            LensError::CommandTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            LensError::Connection { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LensError> for ApiError {
    fn from(e: LensError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self.0, "request rejected");
        }
        let body = json!({"success": false, "description": self.0.to_string()});
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (LensError::invalid_argument("x", "bad"), StatusCode::BAD_REQUEST),
            (LensError::UnsupportedLocator("id".into()), StatusCode::BAD_REQUEST),
            (LensError::unsupported("ios", "shell"), StatusCode::BAD_REQUEST),
            (LensError::ElementNotFound("text=OK".into()), StatusCode::NOT_FOUND),
            (LensError::Widget("00009".into()), StatusCode::NOT_FOUND),
            (
                LensError::CommandTimeout {
                    command: "sleep".into(),
                    secs: 60,
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (LensError::connection("android", "offline"), StatusCode::SERVICE_UNAVAILABLE),
            (LensError::sdk("android", "boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }
}
