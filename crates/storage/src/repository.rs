//! Repository Implementation

use crate::StorageError;
use chrono::{DateTime, Utc};
use clinical_protocol::{AssessmentResult, ClinicalQuery, QueryKind, Tier, TierResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

/// Retention settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Oldest records are evicted past this count
    pub max_records: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { max_records: 10_000 }
    }
}

/// Stored evaluation with its attempt trail
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRecord {
    /// Insertion sequence number, assigned by the repository
    pub seq: u64,
    pub query_id: Uuid,
    pub subject_id: String,
    pub kind: QueryKind,
    /// `None` when every tier failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment: Option<AssessmentResult>,
    pub attempts: Vec<TierResult>,
    pub recorded_at: DateTime<Utc>,
}

impl EvaluationRecord {
    pub fn new(
        query: &ClinicalQuery,
        assessment: Option<AssessmentResult>,
        attempts: Vec<TierResult>,
    ) -> Self {
        Self {
            seq: 0,
            query_id: query.id(),
            subject_id: query.subject_id().to_string(),
            kind: query.kind(),
            assessment,
            attempts,
            recorded_at: Utc::now(),
        }
    }

    /// Tier that answered, if any
    pub fn answering_tier(&self) -> Option<Tier> {
        self.assessment.as_ref().map(|a| a.answering_tier)
    }
}

/// Repository for evaluation records
pub struct Repository {
    records: Mutex<VecDeque<EvaluationRecord>>,
    next_seq: Mutex<u64>,
    config: StorageConfig,
}

impl Repository {
    /// Create a new in-memory repository
    pub fn new(config: StorageConfig) -> Self {
        info!("Creating in-memory audit repository (max {} records)", config.max_records);
        Self {
            records: Mutex::new(VecDeque::with_capacity(config.max_records.min(1024))),
            next_seq: Mutex::new(1),
            config,
        }
    }

    /// Store a record, returning its sequence number
    pub fn insert(&self, mut record: EvaluationRecord) -> Result<u64, StorageError> {
        let mut records = self.records()?;
        let mut seq = self.next_seq.lock().map_err(|e| {
            StorageError::DatabaseError(format!("Lock error: {}", e))
        })?;

        record.seq = *seq;
        *seq += 1;

        // Enforce retention
        while records.len() >= self.config.max_records.max(1) {
            records.pop_front();
        }

        debug!(query_id = %record.query_id, seq = record.seq, "Stored evaluation");
        let stored = record.seq;
        records.push_back(record);
        Ok(stored)
    }

    /// Look up an evaluation by query id
    pub fn get(&self, query_id: Uuid) -> Result<EvaluationRecord, StorageError> {
        self.records()?
            .iter()
            .rev()
            .find(|r| r.query_id == query_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    /// Most recent records first, optionally only those answered by `tier`
    pub fn list(&self, tier: Option<Tier>, limit: usize) -> Result<Vec<EvaluationRecord>, StorageError> {
        Ok(self
            .records()?
            .iter()
            .rev()
            .filter(|r| tier.map_or(true, |t| r.answering_tier() == Some(t)))
            .take(limit)
            .cloned()
            .collect())
    }

    /// Get total record count
    pub fn count(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn records(&self) -> Result<MutexGuard<'_, VecDeque<EvaluationRecord>>, StorageError> {
        self.records
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new(StorageConfig::default())
    }
}
