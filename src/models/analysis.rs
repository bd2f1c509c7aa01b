use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{DifferentialDiagnosis, GuidelineRecommendation, PatientExplanation, SoapNote};
use crate::pipeline::validation::Validated;

/// Everything one pipeline run produced. Each section is independently
/// either parsed or degraded; a run that reaches this type never failed.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub run_id: Uuid,
    pub soap: Validated<SoapNote>,
    pub differential: Validated<DifferentialDiagnosis>,
    pub guidelines: Validated<GuidelineRecommendation>,
    pub patient: Validated<PatientExplanation>,
    pub model_id: String,
    pub processing_time_seconds: f64,
    pub completed_at: DateTime<Utc>,
    pub disclaimer: String,
}

/// Result of the SOAP-only entry point.
#[derive(Debug, Clone, Serialize)]
pub struct SoapAnalysis {
    pub run_id: Uuid,
    pub soap: Validated<SoapNote>,
    pub model_id: String,
    pub processing_time_seconds: f64,
    pub completed_at: DateTime<Utc>,
    pub disclaimer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Complete,
    Degraded { sections: Vec<&'static str> },
}

impl AnalysisResult {
    pub fn status(&self) -> RunStatus {
        let sections: Vec<&'static str> = [
            ("soap", self.soap.is_degraded()),
            ("differential", self.differential.is_degraded()),
            ("guidelines", self.guidelines.is_degraded()),
            ("patient", self.patient.is_degraded()),
        ]
        .into_iter()
        .filter_map(|(name, degraded)| degraded.then_some(name))
        .collect();

        if sections.is_empty() {
            RunStatus::Complete
        } else {
            RunStatus::Degraded { sections }
        }
    }
}
