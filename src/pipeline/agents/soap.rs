use super::prompts::SOAP_SYSTEM;
use super::{or_not_provided, AgentRole, AgentSpec};
use crate::config::SOAP_MAX_TOKENS;
use crate::models::{ClinicalInput, SoapNote};
use crate::pipeline::sanitize::sanitize_clinical_text;
use crate::pipeline::validation::{decode_soap, Validated};

/// Free text -> SOAP note.
pub struct SoapAgent;

impl AgentSpec for SoapAgent {
    type Context<'a> = &'a ClinicalInput;
    type Output = SoapNote;

    fn role(&self) -> AgentRole {
        AgentRole::Soap
    }

    fn system_prompt(&self) -> &'static str {
        SOAP_SYSTEM
    }

    fn build_prompt(&self, input: &&ClinicalInput) -> String {
        let notes = sanitize_clinical_text(input.clinical_notes(), "clinical_notes");
        let labs = input
            .lab_results()
            .map(|t| sanitize_clinical_text(t, "lab_results"));
        let imaging = input
            .radiology_text()
            .map(|t| sanitize_clinical_text(t, "radiology_text"));

        format!(
            "Organise the following clinical information into SOAP format.\n\n\
             CLINICAL NOTES:\n{notes}\n\n\
             LAB RESULTS:\n{}\n\n\
             RADIOLOGY TEXT:\n{}\n\n\
             PATIENT DEMOGRAPHICS:\n{}\n\n\
             Return only the JSON object.",
            or_not_provided(labs.as_deref()),
            or_not_provided(imaging.as_deref()),
            input.demographics().as_deref().unwrap_or("Not provided"),
        )
    }

    fn max_new_tokens(&self) -> u32 {
        SOAP_MAX_TOKENS
    }

    fn decode(&self, raw: &str, input: &&ClinicalInput) -> Validated<SoapNote> {
        let mut note = decode_soap(raw);
        if let Validated::Parsed(soap) = &mut note {
            soap.objective = enforce_objective_lines(
                &soap.objective,
                input.lab_results().is_some(),
                input.radiology_text().is_some(),
            );
        }
        note
    }
}

/// The objective section always carries `Labs:` and `Imaging:` lines. When
/// the input had no such data, whatever the model wrote there is replaced.
fn enforce_objective_lines(objective: &str, has_labs: bool, has_imaging: bool) -> String {
    let objective = enforce_line(objective, "Labs", has_labs, "see lab results provided");
    enforce_line(&objective, "Imaging", has_imaging, "see radiology report provided")
}

fn enforce_line(objective: &str, label: &str, documented: bool, pointer: &str) -> String {
    let has_line = objective.lines().any(|l| is_labelled(l, label));
    if documented && has_line {
        return objective.to_string();
    }

    if has_line {
        tracing::debug!(label, "Replacing objective line for data not present in input");
    }
    let mut lines: Vec<String> = objective
        .lines()
        .filter(|l| !is_labelled(l, label))
        .map(str::to_string)
        .collect();
    lines.push(if documented {
        format!("{label}: Not summarised; {pointer}.")
    } else {
        format!("{label}: Not documented.")
    });
    lines.join("\n")
}

fn is_labelled(line: &str, label: &str) -> bool {
    let line = line.trim_start().trim_start_matches(['-', '*', ' ']);
    line.len() > label.len()
        && line.is_char_boundary(label.len())
        && line[..label.len()].eq_ignore_ascii_case(label)
        && line[label.len()..].trim_start().starts_with(':')
}
