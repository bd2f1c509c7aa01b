use serde::{Deserialize, Serialize};

pub const MAX_KEY_POINTS: usize = 5;

/// Plain-language summary for the patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientExplanation {
    pub summary: String,
    pub key_points: Vec<String>,
    pub next_steps_suggestion: String,
    #[serde(default)]
    pub raw: String,
}
