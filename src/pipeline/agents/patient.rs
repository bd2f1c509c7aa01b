use super::prompts::PATIENT_SYSTEM;
use super::{AgentRole, AgentSpec};
use crate::config::PATIENT_MAX_TOKENS;
use crate::models::{DifferentialDiagnosis, PatientExplanation, SoapNote};
use crate::pipeline::validation::{decode_patient, Validated};

/// Conditions named to the patient, as possibilities only.
const MAX_CONDITIONS_SHOWN: usize = 3;

/// Note + differential -> plain-language explanation.
pub struct PatientAgent;

pub struct PatientContext<'a> {
    pub soap: &'a SoapNote,
    pub ddx: &'a DifferentialDiagnosis,
}

impl AgentSpec for PatientAgent {
    type Context<'a> = PatientContext<'a>;
    type Output = PatientExplanation;

    fn role(&self) -> AgentRole {
        AgentRole::Patient
    }

    fn system_prompt(&self) -> &'static str {
        PATIENT_SYSTEM
    }

    fn build_prompt(&self, ctx: &PatientContext<'_>) -> String {
        let considered: Vec<&str> = ctx
            .ddx
            .condition_names()
            .take(MAX_CONDITIONS_SHOWN)
            .collect();
        let considered = if considered.is_empty() {
            "No specific conditions listed yet".to_string()
        } else {
            considered.join(", ")
        };

        format!(
            "Explain the following clinical summary to the patient.\n\n\
             WHAT THE PATIENT REPORTED:\n{}\n\n\
             WHAT THE DOCTOR FOUND:\n{}\n\n\
             POSSIBILITIES BEING CONSIDERED (not confirmed):\n{considered}\n\n\
             SUGGESTED NEXT STEPS FOR THE DOCTOR:\n{}\n\n\
             Do not name any medication. Do not say the patient has any of these conditions.",
            ctx.soap.subjective, ctx.soap.objective, ctx.soap.plan_suggestions,
        )
    }

    fn max_new_tokens(&self) -> u32 {
        PATIENT_MAX_TOKENS
    }

    fn decode(&self, raw: &str, _ctx: &PatientContext<'_>) -> Validated<PatientExplanation> {
        decode_patient(raw)
    }
}
