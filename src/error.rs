//! Error types for the task pipeline.
//!
//! Every failure is returned to the immediate caller and none are retried
//! inside the core; retry, if desired, is the producer's responsibility.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

/// Failures raised by the task store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database-level errors (constraint violations, bad statements, ...)
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(String),
}

/// Outcome taxonomy for one dispatch call.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The limiter wait was aborted by the caller's deadline before a token
    /// was acquired. No side effects; safe to resubmit.
    #[error("admission cancelled: deadline elapsed while waiting for a token")]
    AdmissionCancelled,

    /// The simulated-work suspension was aborted by the caller's deadline.
    /// No side effects; safe to resubmit.
    #[error("processing cancelled: deadline elapsed during simulated work")]
    ProcessingCancelled,

    /// The store write failed after processing completed in memory. The
    /// completed result is lost; the caller decides whether to resubmit.
    #[error("failed to persist completed task: {0}")]
    PersistenceFailed(#[source] StoreError),

    /// Pool construction or schema init failed. Fatal to the consumer
    /// process at startup; there is no degraded mode.
    #[error("task store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
}

impl ResponseError for PipelineError {
    fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::AdmissionCancelled | PipelineError::ProcessingCancelled => {
                StatusCode::REQUEST_TIMEOUT
            }
            PipelineError::PersistenceFailed(_) | PipelineError::StoreUnavailable(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let PipelineError::PersistenceFailed(e) = self {
            log::error!("Failed to save task: {}", e);
        }
        let status = self.status_code();
        HttpResponse::build(status).json(serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16()
        }))
    }
}

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
