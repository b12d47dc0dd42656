use std::time::Duration;

use axum::http::header::{CONTENT_TYPE, RETRY_AFTER};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use photosheet_core::error::CoreError;
use photosheet_pipeline::{Stage, StageFailure};

/// Body of a 400 response when the upload has no image.
pub const NO_IMAGE_MESSAGE: &str = "No image uploaded";

const INTERNAL_MESSAGE: &str = "An internal error occurred";

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`StageFailure`] for pipeline
/// failures, and adds HTTP-specific variants. Error bodies are plain text,
/// except the rate limit page.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `photosheet_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The upload carried no image field.
    #[error("No image uploaded")]
    MissingInput,

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A pipeline stage failed; terminal for the request.
    #[error(transparent)]
    Pipeline(#[from] StageFailure),

    /// The caller exhausted a rate limit window.
    #[error("Rate limit exceeded; retry after {deadline}")]
    RateLimited {
        retry_after: Duration,
        /// Human-readable retry deadline in the display timezone.
        deadline: String,
    },

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
                other => {
                    tracing::error!(error = %other, "Internal core error");
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
                }
            },

            // --- Pipeline failures ---
            AppError::Pipeline(failure) => classify_stage_failure(failure),

            // --- Rate limiting ---
            AppError::RateLimited {
                retry_after,
                deadline,
            } => return rate_limited_response(retry_after, &deadline),

            // --- HTTP-specific errors ---
            AppError::MissingInput => (StatusCode::BAD_REQUEST, NO_IMAGE_MESSAGE.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
            }
        };

        (status, message).into_response()
    }
}

/// Map a stage failure to a status and plain-text body.
///
/// - `decode` (the upload itself) maps to 400.
/// - Remote stages map to 500 with the upstream body surfaced verbatim.
/// - `enhancement_decode` maps to 500 with the decode reason.
/// - Local stages map to 500 with a sanitized message.
fn classify_stage_failure(failure: StageFailure) -> (StatusCode, String) {
    match failure.stage {
        Stage::Decode => (
            StatusCode::BAD_REQUEST,
            format!("Uploaded file is not a readable image: {}", failure.message),
        ),
        Stage::BackgroundRemoval | Stage::ImageHosting | Stage::Enhancement => {
            (StatusCode::INTERNAL_SERVER_ERROR, failure.message)
        }
        Stage::EnhancementDecode => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Enhancement response could not be decoded: {}", failure.message),
        ),
        Stage::Standardize | Stage::Compose | Stage::Export => {
            tracing::error!(stage = %failure.stage, error = %failure.message, "Local stage failed");
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
        }
    }
}

/// 429 page telling the caller when to come back.
fn rate_limited_response(retry_after: Duration, deadline: &str) -> Response {
    let seconds = retry_after.as_secs().max(1);
    let body = format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head><meta charset=\"utf-8\"><title>Too many requests</title></head>\n\
         <body>\n\
         <h1>Too many requests</h1>\n\
         <p>You have reached the limit for photo sheets. Please try again after {deadline}.</p>\n\
         </body>\n\
         </html>\n"
    );

    (
        StatusCode::TOO_MANY_REQUESTS,
        [
            (CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (RETRY_AFTER, seconds.to_string()),
        ],
        body,
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
