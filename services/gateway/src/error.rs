use axum::{
    Json,
    extract::rejection::{BytesRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use stream_engine::ChannelClosed;
use thiserror::Error;
use types::errors::EventError;

/// Central error type for the Gateway application
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// An axum extractor refused the request before a handler ran.
    #[error("Request rejected: {1}")]
    Rejected(StatusCode, String),
}

impl From<EventError> for AppError {
    fn from(err: EventError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<BytesRejection> for AppError {
    fn from(rejection: BytesRejection) -> Self {
        AppError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<ChannelClosed> for AppError {
    fn from(_: ChannelClosed) -> Self {
        AppError::ServiceUnavailable("Aggregation engine is not accepting events".into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST"),
            AppError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                msg,
                "SERVICE_UNAVAILABLE",
            ),
            AppError::Rejected(status, msg) => {
                let code = match status {
                    StatusCode::BAD_REQUEST => "BAD_REQUEST",
                    StatusCode::PAYLOAD_TOO_LARGE => "PAYLOAD_TOO_LARGE",
                    s if s.is_server_error() => "INTERNAL_ERROR",
                    _ => "INVALID_REQUEST",
                };
                (status, msg, code)
            }
        };

        let body = Json(json!({
            "error": code,
            "message": error_message
        }));

        (status, body).into_response()
    }
}
