use serde::{Deserialize, Serialize};

use super::enums::{EvidenceConfidence, GuidelineCategory};

/// Canonical text of the single entry emitted when retrieval found nothing.
pub const NO_GUIDELINE_TEXT: &str = "no relevant guideline excerpt available";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidelineEntry {
    pub category: GuidelineCategory,
    pub recommendation: String,
    #[serde(default)]
    pub source: String,
    pub confidence: EvidenceConfidence,
}

impl GuidelineEntry {
    pub fn no_evidence() -> Self {
        Self {
            category: GuidelineCategory::Other,
            recommendation: NO_GUIDELINE_TEXT.to_string(),
            source: String::new(),
            confidence: EvidenceConfidence::LowEvidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidelineRecommendation {
    pub recommendations: Vec<GuidelineEntry>,
    /// Distinct sources of the chunks shown to the model, in rank order.
    /// Always empty when `recommendations` is empty.
    pub retrieved_sources: Vec<String>,
    #[serde(default)]
    pub raw: String,
}
