//! Evaluation endpoints

use axum::{extract::State, Json};
use clinical_protocol::{split_prescription, ClinicalQuery, QueryPayload, Tier};
use failover::Evaluation;
use serde::Deserialize;
use std::sync::Arc;
use storage::EvaluationRecord;
use tracing::{info, warn};

use crate::{error::ApiError, AppState};

/// Body of `POST /api/v1/evaluate`
#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub subject_id: String,
    pub query: QueryPayload,
}

/// Body of `POST /api/v1/risk-check`
#[derive(Debug, Deserialize)]
pub struct RiskCheckRequest {
    pub subject_id: String,
    /// Free text such as "Warfarin+Aspirin"
    pub prescription: String,
    #[serde(default)]
    pub patient_context: Option<String>,
}

/// Body of `POST /api/v1/medicine-info`
#[derive(Debug, Deserialize)]
pub struct MedicineInfoRequest {
    pub subject_id: String,
    pub medicine: String,
}

/// Full escalation for an arbitrary query
pub async fn evaluate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<Evaluation>, ApiError> {
    let query = ClinicalQuery::new(request.subject_id, request.query)?;
    run(&state, query, Tier::Primary).await.map(Json)
}

/// Manual risk check, answered by the rule engine only
pub async fn risk_check(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RiskCheckRequest>,
) -> Result<Json<Evaluation>, ApiError> {
    let payload = QueryPayload::RiskCheck {
        drugs: split_prescription(&request.prescription),
        patient_context: request.patient_context,
    };
    let query = ClinicalQuery::new(request.subject_id, payload)?;
    run(&state, query, Tier::Tertiary).await.map(Json)
}

/// Patient-facing medicine explanation with full escalation
pub async fn medicine_info(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MedicineInfoRequest>,
) -> Result<Json<Evaluation>, ApiError> {
    let query = ClinicalQuery::medicine_info(request.subject_id, &request.medicine)?;
    run(&state, query, Tier::Primary).await.map(Json)
}

/// Evaluate and store the outcome, answered or not
async fn run(state: &AppState, query: ClinicalQuery, entry: Tier) -> Result<Evaluation, ApiError> {
    match state.orchestrator.evaluate_from(&query, entry).await {
        Ok(evaluation) => {
            let record = EvaluationRecord::new(
                &query,
                Some(evaluation.assessment.clone()),
                evaluation.attempts.clone(),
            );
            store(state, record);
            info!(query_id = %query.id(), tier = %evaluation.answered_by(), "Answered");
            Ok(evaluation)
        }
        Err(failover::EvaluationError::AllTiersExhausted { attempts }) => {
            store(state, EvaluationRecord::new(&query, None, attempts.clone()));
            Err(ApiError::Exhausted {
                query_id: query.id(),
                attempts,
            })
        }
        Err(e) => Err(ApiError::from_evaluation(query.id(), e)),
    }
}

fn store(state: &AppState, record: EvaluationRecord) {
    // The caller still gets the answer if the audit write fails
    if let Err(e) = state.repository.insert(record) {
        metrics::counter!("evaluation_store_errors_total").increment(1);
        warn!(error = %e, "Failed to store evaluation");
    }
}
