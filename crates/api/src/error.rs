//! HTTP error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use clinical_protocol::{QueryError, TierResult};
use failover::EvaluationError;
use serde_json::json;
use storage::StorageError;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] QueryError),

    /// Every tier failed; the attempts are still returned to the caller
    #[error("All tiers exhausted")]
    Exhausted {
        query_id: Uuid,
        attempts: Vec<TierResult>,
    },

    #[error("Evaluation not found")]
    NotFound,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ApiError {
    pub(crate) fn from_evaluation(query_id: Uuid, err: EvaluationError) -> Self {
        match err {
            EvaluationError::InvalidQuery(e) => ApiError::InvalidQuery(e),
            EvaluationError::AllTiersExhausted { attempts } => ApiError::Exhausted { query_id, attempts },
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => ApiError::NotFound,
            StorageError::DatabaseError(msg) => ApiError::Storage(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::InvalidQuery(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "status": "invalid_query", "error": e.to_string() }),
            ),
            ApiError::Exhausted { query_id, attempts } => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({
                    "status": "system_failure",
                    "error": "No tier produced a valid assessment",
                    "query_id": query_id,
                    "attempts": attempts,
                }),
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                json!({ "status": "not_found", "error": "Evaluation not found" }),
            ),
            ApiError::Storage(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "status": "error", "error": msg }),
            ),
        };
        (status, Json(body)).into_response()
    }
}
