use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Staging or filesystem write failed. Non-retryable for this request.
    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    /// An external tool or in-process transform failed. Carries the captured
    /// stderr/stdout (or library error text) as diagnostic detail.
    #[error("Conversion failed: {0}")]
    Conversion(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    /// A component contract was violated (e.g. packager called with zero
    /// outputs). Programming error, surfaced as a generic 500.
    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Io(e) => {
                tracing::error!("Storage error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("storage failure: {}", e),
                )
            }
            AppError::Conversion(detail) => {
                tracing::error!("Conversion failed: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("conversion failed: {}", detail),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Multipart(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("length limit exceeded") {
                    (
                        StatusCode::PAYLOAD_TOO_LARGE,
                        "Request body exceeds the maximum allowed limit".to_string(),
                    )
                } else {
                    (StatusCode::BAD_REQUEST, err_msg)
                }
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
