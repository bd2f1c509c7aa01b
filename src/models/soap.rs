use serde::{Deserialize, Serialize};

/// Structured SOAP note produced from the clinician's free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoapNote {
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan_suggestions: String,
    /// Model text this note was decoded from. Empty for fallbacks.
    #[serde(default)]
    pub raw: String,
}
