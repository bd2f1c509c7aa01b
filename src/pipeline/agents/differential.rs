use super::prompts::DIFFERENTIAL_SYSTEM;
use super::{AgentRole, AgentSpec};
use crate::config::DIFFERENTIAL_MAX_TOKENS;
use crate::models::{ClinicalInput, DifferentialDiagnosis, SoapNote};
use crate::pipeline::validation::{decode_differential, Validated};

/// SOAP note -> ranked differential.
pub struct DifferentialAgent;

pub struct DifferentialContext<'a> {
    pub soap: &'a SoapNote,
    /// Read for demographics only.
    pub input: &'a ClinicalInput,
}

impl AgentSpec for DifferentialAgent {
    type Context<'a> = DifferentialContext<'a>;
    type Output = DifferentialDiagnosis;

    fn role(&self) -> AgentRole {
        AgentRole::Differential
    }

    fn system_prompt(&self) -> &'static str {
        DIFFERENTIAL_SYSTEM
    }

    fn build_prompt(&self, ctx: &DifferentialContext<'_>) -> String {
        format!(
            "Generate a ranked differential diagnosis from the structured clinical data below.\n\n\
             SUBJECTIVE:\n{}\n\n\
             OBJECTIVE:\n{}\n\n\
             ASSESSMENT (clinician's stated impressions):\n{}\n\n\
             PATIENT DEMOGRAPHICS:\n{}\n\n\
             Remember: possibilities only, no confirmed diagnoses, no treatments.",
            ctx.soap.subjective,
            ctx.soap.objective,
            ctx.soap.assessment,
            ctx.input.demographics().as_deref().unwrap_or("Not provided"),
        )
    }

    fn max_new_tokens(&self) -> u32 {
        DIFFERENTIAL_MAX_TOKENS
    }

    fn decode(&self, raw: &str, _ctx: &DifferentialContext<'_>) -> Validated<DifferentialDiagnosis> {
        decode_differential(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClinicalInputDraft, PatientSex};
    use crate::pipeline::validation::schemas;

    fn input() -> ClinicalInput {
        ClinicalInput::validate(ClinicalInputDraft {
            clinical_notes: "Raw note text that must not reach the differential prompt.".into(),
            patient_age: Some(67),
            patient_sex: Some(PatientSex::Male),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn prompt_uses_soap_sections_and_demographics() {
        let mut soap = schemas::soap_fallback();
        soap.subjective = "Exertional chest tightness".into();
        soap.assessment = "Possible stable angina".into();
        let input = input();
        let ctx = DifferentialContext {
            soap: &soap,
            input: &input,
        };
        let prompt = DifferentialAgent.build_prompt(&ctx);
        assert!(prompt.contains("Exertional chest tightness"));
        assert!(prompt.contains("Possible stable angina"));
        assert!(prompt.contains("67-year-old male"));
        assert!(!prompt.contains("Raw note text"));
    }

    #[test]
    fn eight_entries_truncate_to_five() {
        let entries: Vec<String> = (1..=8)
            .rev()
            .map(|i| format!(r#"{{"rank": {i}, "condition": "Dx {i}", "likelihood": "Low"}}"#))
            .collect();
        let raw = format!(r#"{{"diagnoses": [{}]}}"#, entries.join(","));
        let soap = schemas::soap_fallback();
        let input = input();
        let ctx = DifferentialContext {
            soap: &soap,
            input: &input,
        };
        let v = DifferentialAgent.decode(&raw, &ctx);
        let ddx = v.value();
        assert_eq!(ddx.diagnoses.len(), 5);
        let ranks: Vec<u8> = ddx.diagnoses.iter().map(|d| d.rank).collect();
        assert_eq!(ranks, [1, 2, 3, 4, 5]);
        assert_eq!(ddx.diagnoses[0].condition, "Dx 1");
        assert_eq!(ddx.diagnoses[4].condition, "Dx 5");
    }
}
