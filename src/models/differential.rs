use serde::{Deserialize, Serialize};

use super::enums::Likelihood;

/// Most entries a differential may carry.
pub const MAX_DIAGNOSES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisEntry {
    pub rank: u8,
    pub condition: String,
    pub likelihood: Likelihood,
    #[serde(default)]
    pub supporting_features: String,
    #[serde(default)]
    pub against_features: String,
}

/// Ranked differential. Ranks are contiguous from 1 and there are at most
/// [`MAX_DIAGNOSES`] entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferentialDiagnosis {
    pub diagnoses: Vec<DiagnosisEntry>,
    pub reasoning_summary: String,
    #[serde(default)]
    pub raw: String,
}

impl DifferentialDiagnosis {
    pub fn condition_names(&self) -> impl Iterator<Item = &str> {
        self.diagnoses.iter().map(|d| d.condition.as_str())
    }

    pub fn ranks_are_contiguous(&self) -> bool {
        self.diagnoses
            .iter()
            .enumerate()
            .all(|(i, d)| d.rank as usize == i + 1)
    }
}
