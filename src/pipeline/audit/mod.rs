//! Append-only record of every pipeline run.
//!
//! One record per run, written before the result is returned. Sink failures
//! are logged by the caller and never fail the run.

pub mod jsonl;
pub mod memory;
pub mod sqlite;

pub use jsonl::*;
pub use memory::*;
pub use sqlite::*;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::engine_service::OperationKind;
use crate::models::ClinicalInput;
use crate::pipeline::agents::{AgentRole, AgentRun};
use crate::pipeline::retrieval::RetrievalSummary;
use crate::pipeline::validation::Validated;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Audit I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Audit database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Internal lock error")]
    LockPoisoned,
}

/// Destination for audit records. Implementations only ever append.
pub trait AuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// Lets a caller keep a handle on the sink it gave the pipeline.
impl<S: AuditSink + ?Sized> AuditSink for std::sync::Arc<S> {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        (**self).record(record)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Parsed,
    Degraded,
    Failed,
}

/// One agent call as seen by the audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct AgentEvent {
    pub stage: AgentRole,
    pub status: EventStatus,
    /// Raw model output, verbatim.
    pub raw: String,
    /// What was handed downstream: the validated artifact, or the safe
    /// default when degraded. Absent when the call failed.
    pub parsed: Option<serde_json::Value>,
    pub reason: Option<String>,
    pub elapsed_ms: u64,
}

impl AgentEvent {
    pub fn from_run<T: Serialize>(stage: AgentRole, run: &AgentRun<T>) -> Self {
        let elapsed_ms = run.elapsed.as_millis() as u64;
        match &run.output {
            Validated::Parsed(value) => Self {
                stage,
                status: EventStatus::Parsed,
                raw: run.raw.clone(),
                parsed: serde_json::to_value(value).ok(),
                reason: None,
                elapsed_ms,
            },
            Validated::Degraded {
                fallback, reason, ..
            } => Self {
                stage,
                status: EventStatus::Degraded,
                raw: run.raw.clone(),
                parsed: serde_json::to_value(fallback).ok(),
                reason: Some(reason.clone()),
                elapsed_ms,
            },
        }
    }

    pub fn failed(stage: AgentRole, error: &str) -> Self {
        Self {
            stage,
            status: EventStatus::Failed,
            raw: String::new(),
            parsed: None,
            reason: Some(error.to_string()),
            elapsed_ms: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditOutcome {
    Complete,
    Degraded { sections: Vec<&'static str> },
    Failed { stage: AgentRole, error: String },
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Degraded { .. } => "degraded",
            Self::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub run_id: Uuid,
    /// Equal to the result's `completed_at` for successful runs.
    pub timestamp: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub kind: OperationKind,
    pub model_id: String,
    pub app_version: &'static str,
    pub input_fingerprint: String,
    pub events: Vec<AgentEvent>,
    pub retrieval: Option<RetrievalSummary>,
    pub processing_time_seconds: f64,
    pub outcome: AuditOutcome,
}

impl AuditRecord {
    /// A record for a run that has just started. `timestamp`, timing and
    /// outcome are stamped when the run ends.
    pub fn begin(run_id: Uuid, kind: OperationKind, model_id: &str, input: &ClinicalInput) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            timestamp: now,
            started_at: now,
            kind,
            model_id: model_id.to_string(),
            app_version: crate::config::APP_VERSION,
            input_fingerprint: fingerprint(input),
            events: Vec::new(),
            retrieval: None,
            processing_time_seconds: 0.0,
            outcome: AuditOutcome::Complete,
        }
    }

    pub fn push<T: Serialize>(&mut self, stage: AgentRole, run: &AgentRun<T>) {
        self.events.push(AgentEvent::from_run(stage, run));
    }

    pub fn finish(
        &mut self,
        completed_at: DateTime<Utc>,
        processing_time_seconds: f64,
        outcome: AuditOutcome,
    ) {
        self.timestamp = completed_at;
        self.processing_time_seconds = processing_time_seconds;
        self.outcome = outcome;
    }
}

/// Stable identifier for an input without storing it. `sha256:` + 16 hex.
pub fn fingerprint(input: &ClinicalInput) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.clinical_notes().as_bytes());
    hasher.update([0u8]);
    hasher.update(input.lab_results().unwrap_or_default().as_bytes());
    hasher.update([0u8]);
    hasher.update(input.radiology_text().unwrap_or_default().as_bytes());
    hasher.update([0u8]);
    hasher.update(input.demographics().unwrap_or_default().as_bytes());
    let digest = hasher.finalize();

    let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    format!("sha256:{hex}")
}

/// Write a record, logging instead of propagating failure.
pub fn record_best_effort(sink: &dyn AuditSink, record: &AuditRecord) {
    match sink.record(record) {
        Ok(()) => tracing::debug!(run_id = %record.run_id, outcome = record.outcome.as_str(), "Audit record written"),
        Err(e) => tracing::error!(run_id = %record.run_id, error = %e, "Audit write failed"),
    }
}
