use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ferry_client::UpstreamError;
use ferry_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for codec/domain errors and [`UpstreamError`] for
/// outbound failures, and adds HTTP-specific variants. Implements
/// [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `ferry_core` (bad format name, decode
    /// failure).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An outbound call to a source or target service failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// No credential on the incoming request.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The access-control service denied the request.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),

            AppError::Upstream(upstream) => match upstream {
                UpstreamError::Rejected { status, body } => {
                    tracing::warn!(status, body = %body, "Upstream rejected request");
                    (
                        StatusCode::BAD_GATEWAY,
                        "UPSTREAM_REJECTED",
                        format!("Upstream service returned error: {status}"),
                    )
                }
                UpstreamError::Transport(err) => {
                    tracing::error!(error = %err, "Upstream unreachable");
                    (
                        StatusCode::BAD_GATEWAY,
                        "UPSTREAM_UNAVAILABLE",
                        format!("Failed to reach upstream service: {err}"),
                    )
                }
                UpstreamError::Payload(msg) => (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_INVALID",
                    format!("Upstream service returned an invalid payload: {msg}"),
                ),
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a core error into an HTTP status, error code, and message.
///
/// Decode errors carry the offending line/column when the parser reports
/// them; everything else in the core taxonomy is a plain bad request.
fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::Decode {
            message,
            line,
            column,
        } => {
            let position = match (line, column) {
                (Some(l), Some(c)) => format!(" (line {l}, column {c})"),
                (Some(l), None) => format!(" (line {l})"),
                _ => String::new(),
            };
            (
                StatusCode::BAD_REQUEST,
                "DECODE_ERROR",
                format!("{message}{position}"),
            )
        }
        CoreError::NotAnArray => (
            StatusCode::BAD_REQUEST,
            "DECODE_ERROR",
            err.to_string(),
        ),
        CoreError::UndetectedDialect => (
            StatusCode::BAD_REQUEST,
            "DECODE_ERROR",
            err.to_string(),
        ),
        CoreError::UnknownFormat(_) | CoreError::UnknownDialect(_) => {
            (StatusCode::BAD_REQUEST, "BAD_REQUEST", err.to_string())
        }
    }
}
