//! Stored evaluation endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use clinical_protocol::Tier;
use serde::Deserialize;
use std::sync::Arc;
use storage::EvaluationRecord;
use uuid::Uuid;

use crate::{error::ApiError, AppState};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

/// Query parameters for listing evaluations
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
    /// Only evaluations answered by this tier
    pub tier: Option<Tier>,
}

/// List recent evaluations, newest first
pub async fn list_evaluations(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<EvaluationRecord>>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    Ok(Json(state.repository.list(params.tier, limit)?))
}

/// Get one evaluation by query id
pub async fn get_evaluation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<EvaluationRecord>, ApiError> {
    Ok(Json(state.repository.get(id)?))
}
