use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::enums::PatientSex;
use crate::config::{MAX_INPUT_CHARS, MIN_NOTES_CHARS};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("Clinical notes must contain at least {min} characters (got {actual})")]
    NotesTooShort { min: usize, actual: usize },

    #[error("Patient age {0} is outside 0..=120")]
    AgeOutOfRange(u16),

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },
}

/// Unvalidated request shape, as it arrives from a caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinicalInputDraft {
    pub clinical_notes: String,
    #[serde(default)]
    pub lab_results: Option<String>,
    #[serde(default)]
    pub radiology_text: Option<String>,
    #[serde(default)]
    pub patient_age: Option<u16>,
    #[serde(default)]
    pub patient_sex: Option<PatientSex>,
}

/// Accepted clinical input. Fields are private so the only way to get one
/// is through [`ClinicalInput::validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalInput {
    clinical_notes: String,
    lab_results: Option<String>,
    radiology_text: Option<String>,
    patient_age: Option<u8>,
    patient_sex: Option<PatientSex>,
}

impl ClinicalInput {
    pub fn validate(draft: ClinicalInputDraft) -> Result<Self, InputError> {
        let notes = truncate_chars(draft.clinical_notes.trim(), MAX_INPUT_CHARS);
        let actual = notes.chars().count();
        if actual < MIN_NOTES_CHARS {
            return Err(InputError::NotesTooShort {
                min: MIN_NOTES_CHARS,
                actual,
            });
        }

        let patient_age = match draft.patient_age {
            None => None,
            Some(age) if age <= 120 => Some(age as u8),
            Some(age) => return Err(InputError::AgeOutOfRange(age)),
        };

        Ok(Self {
            clinical_notes: notes,
            lab_results: optional_text(draft.lab_results),
            radiology_text: optional_text(draft.radiology_text),
            patient_age,
            patient_sex: draft.patient_sex,
        })
    }

    /// Shorthand for notes-only input.
    pub fn from_notes(notes: impl Into<String>) -> Result<Self, InputError> {
        Self::validate(ClinicalInputDraft {
            clinical_notes: notes.into(),
            ..Default::default()
        })
    }

    pub fn clinical_notes(&self) -> &str {
        &self.clinical_notes
    }

    pub fn lab_results(&self) -> Option<&str> {
        self.lab_results.as_deref()
    }

    pub fn radiology_text(&self) -> Option<&str> {
        self.radiology_text.as_deref()
    }

    pub fn has_labs(&self) -> bool {
        self.lab_results.is_some()
    }

    pub fn has_imaging(&self) -> bool {
        self.radiology_text.is_some()
    }

    pub fn patient_age(&self) -> Option<u8> {
        self.patient_age
    }

    pub fn patient_sex(&self) -> Option<PatientSex> {
        self.patient_sex
    }

    /// "54-year-old female", "male", or `None` when nothing is known.
    pub fn demographics(&self) -> Option<String> {
        match (self.patient_age, self.patient_sex) {
            (Some(age), Some(sex)) => Some(format!("{age}-year-old {sex}")),
            (Some(age), None) => Some(format!("{age}-year-old")),
            (None, Some(sex)) => Some(sex.to_string()),
            (None, None) => None,
        }
    }
}

/// Blank optional text counts as absent.
fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| truncate_chars(v.trim(), MAX_INPUT_CHARS))
        .filter(|v| !v.is_empty())
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(notes: &str) -> ClinicalInputDraft {
        ClinicalInputDraft {
            clinical_notes: notes.into(),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_minimal_notes() {
        let input = ClinicalInput::from_notes("54F, 3 days of productive cough and fever.").unwrap();
        assert!(input.lab_results().is_none());
        assert!(input.demographics().is_none());
    }

    #[test]
    fn rejects_short_notes() {
        let err = ClinicalInput::validate(draft("   cough   ")).unwrap_err();
        assert_eq!(err, InputError::NotesTooShort { min: 20, actual: 5 });
    }

    #[test]
    fn rejects_age_out_of_range() {
        let mut d = draft("Patient presents with chest pain radiating to the left arm.");
        d.patient_age = Some(121);
        assert_eq!(
            ClinicalInput::validate(d).unwrap_err(),
            InputError::AgeOutOfRange(121)
        );
    }

    #[test]
    fn blank_optional_text_is_absent() {
        let mut d = draft("Patient presents with chest pain radiating to the left arm.");
        d.lab_results = Some("   ".into());
        d.radiology_text = Some("CXR: clear".into());
        let input = ClinicalInput::validate(d).unwrap();
        assert!(input.lab_results().is_none());
        assert_eq!(input.radiology_text(), Some("CXR: clear"));
        assert!(!input.has_labs());
        assert!(input.has_imaging());
    }

    #[test]
    fn long_notes_are_truncated() {
        let long = "é".repeat(MAX_INPUT_CHARS + 50);
        let input = ClinicalInput::from_notes(long).unwrap();
        assert_eq!(input.clinical_notes().chars().count(), MAX_INPUT_CHARS);
    }

    #[test]
    fn demographics_formatting() {
        let mut d = draft("Patient presents with chest pain radiating to the left arm.");
        d.patient_age = Some(54);
        d.patient_sex = Some(PatientSex::Female);
        let input = ClinicalInput::validate(d).unwrap();
        assert_eq!(input.demographics().as_deref(), Some("54-year-old female"));
    }

    #[test]
    fn draft_deserializes_from_wire() {
        let d: ClinicalInputDraft = serde_json::from_str(
            r#"{"clinical_notes":"Fever and cough for three days.","patient_sex":"male"}"#,
        )
        .unwrap();
        assert_eq!(d.patient_sex, Some(PatientSex::Male));
        assert!(d.patient_age.is_none());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
