//! Per-artifact schemas. Every decoder either returns `Parsed` or fails
//! closed to the artifact's safe default.

use serde_json::{Map, Value};

use super::extract::extract_json_object;
use super::outcome::Validated;
use super::policy::{
    bound_text, cap_list, coerce_category, coerce_confidence, coerce_likelihood, value_to_list,
    value_to_text, MAX_CONDITION_CHARS, MAX_FIELD_CHARS,
};
use super::SchemaViolation;
use crate::models::{
    DiagnosisEntry, DifferentialDiagnosis, GuidelineEntry, GuidelineRecommendation,
    PatientExplanation, SoapNote, MAX_DIAGNOSES, MAX_KEY_POINTS,
};

/// Marker used in every safe default.
pub const UNAVAILABLE: &str = "[Unavailable: model output failed validation]";
pub const NOT_DOCUMENTED: &str = "Not documented.";
pub const MAX_RECOMMENDATIONS: usize = 12;
pub const DEFAULT_NEXT_STEPS: &str =
    "Please speak with your doctor about your results and next steps.";

type Object = Map<String, Value>;

fn decode_with<T>(
    schema: &'static str,
    raw: &str,
    fallback: fn() -> T,
    build: impl FnOnce(&Object) -> Result<T, SchemaViolation>,
) -> Validated<T> {
    match extract_json_object(raw).and_then(|obj| build(&obj)) {
        Ok(value) => Validated::Parsed(value),
        Err(violation) => {
            tracing::warn!(
                schema,
                reason = %violation,
                raw_chars = raw.chars().count(),
                "Model output failed validation, using safe default"
            );
            Validated::Degraded {
                fallback: fallback(),
                raw: raw.to_string(),
                reason: violation.to_string(),
            }
        }
    }
}

fn required<'a>(obj: &'a Object, field: &'static str) -> Result<&'a Value, SchemaViolation> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(SchemaViolation::MissingField(field)),
        Some(value) => Ok(value),
    }
}

fn required_text(
    obj: &Object,
    field: &'static str,
    separator: &str,
) -> Result<String, SchemaViolation> {
    value_to_text(required(obj, field)?, separator).ok_or(SchemaViolation::WrongType {
        field,
        expected: "string",
    })
}

fn required_array<'a>(
    obj: &'a Object,
    field: &'static str,
) -> Result<&'a Vec<Value>, SchemaViolation> {
    required(obj, field)?
        .as_array()
        .ok_or(SchemaViolation::WrongType {
            field,
            expected: "array",
        })
}

fn optional_text(obj: &Object, field: &str, separator: &str) -> Option<String> {
    obj.get(field)
        .and_then(|v| value_to_text(v, separator))
        .filter(|s| !s.is_empty())
}

// ── SOAP ─────────────────────────────────────────────────

pub fn decode_soap(raw: &str) -> Validated<SoapNote> {
    decode_with("soap", raw, soap_fallback, |obj| {
        if let Some(refusal) = obj.get("error") {
            let message = value_to_text(refusal, " ").unwrap_or_default();
            return Err(SchemaViolation::Refusal(bound_text(
                "error",
                message,
                MAX_CONDITION_CHARS,
            )));
        }

        let section = |field: &'static str| -> Result<String, SchemaViolation> {
            let text = required_text(obj, field, "\n")?;
            if text.is_empty() {
                return Ok(NOT_DOCUMENTED.to_string());
            }
            Ok(bound_text(field, text, MAX_FIELD_CHARS))
        };

        Ok(SoapNote {
            subjective: section("subjective")?,
            objective: section("objective")?,
            assessment: section("assessment")?,
            plan_suggestions: section("plan_suggestions")?,
            raw: raw.to_string(),
        })
    })
}

pub fn soap_fallback() -> SoapNote {
    SoapNote {
        subjective: UNAVAILABLE.to_string(),
        objective: UNAVAILABLE.to_string(),
        assessment: UNAVAILABLE.to_string(),
        plan_suggestions: UNAVAILABLE.to_string(),
        raw: String::new(),
    }
}

// ── Differential ─────────────────────────────────────────

pub fn decode_differential(raw: &str) -> Validated<DifferentialDiagnosis> {
    decode_with("differential", raw, differential_fallback, |obj| {
        let items = required_array(obj, "diagnoses")?;

        let mut ranked: Vec<(u64, DiagnosisEntry)> = Vec::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            let Some(entry) = item.as_object() else {
                tracing::debug!(position, "Dropping non-object diagnosis entry");
                continue;
            };
            let Some(condition) = optional_text(entry, "condition", " ") else {
                tracing::debug!(position, "Dropping diagnosis entry without condition");
                continue;
            };
            let model_rank = entry
                .get("rank")
                .and_then(|r| r.as_u64().or_else(|| r.as_str()?.trim().parse().ok()))
                .unwrap_or(position as u64 + 1);

            ranked.push((
                model_rank,
                DiagnosisEntry {
                    rank: 0,
                    condition: bound_text("condition", condition, MAX_CONDITION_CHARS),
                    likelihood: coerce_likelihood(entry.get("likelihood")),
                    supporting_features: feature_text(entry, "supporting_features"),
                    against_features: feature_text(entry, "against_features"),
                },
            ));
        }

        // Stable: equal model ranks keep the model's order.
        ranked.sort_by_key(|(rank, _)| *rank);
        let mut diagnoses: Vec<DiagnosisEntry> = ranked.into_iter().map(|(_, e)| e).collect();
        diagnoses = cap_list("diagnoses", diagnoses, MAX_DIAGNOSES);
        for (i, entry) in diagnoses.iter_mut().enumerate() {
            entry.rank = (i + 1) as u8;
        }

        let reasoning_summary = optional_text(obj, "reasoning_summary", "\n")
            .map(|s| bound_text("reasoning_summary", s, MAX_FIELD_CHARS))
            .unwrap_or_else(|| "Unavailable.".to_string());

        Ok(DifferentialDiagnosis {
            diagnoses,
            reasoning_summary,
            raw: raw.to_string(),
        })
    })
}

fn feature_text(entry: &Object, field: &'static str) -> String {
    optional_text(entry, field, "; ")
        .map(|s| bound_text(field, s, MAX_FIELD_CHARS))
        .unwrap_or_default()
}

pub fn differential_fallback() -> DifferentialDiagnosis {
    DifferentialDiagnosis {
        diagnoses: Vec::new(),
        reasoning_summary: UNAVAILABLE.to_string(),
        raw: String::new(),
    }
}

// ── Guideline ────────────────────────────────────────────

/// `retrieved_sources` is left empty here; the guideline agent fills it
/// from the chunks it actually showed the model.
pub fn decode_guideline(raw: &str) -> Validated<GuidelineRecommendation> {
    decode_with("guideline", raw, guideline_fallback, |obj| {
        let items = required_array(obj, "recommendations")?;

        let recommendations: Vec<GuidelineEntry> = items
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|entry| {
                let text = optional_text(entry, "recommendation", " ")?;
                Some(GuidelineEntry {
                    category: coerce_category(entry.get("category")),
                    recommendation: bound_text("recommendation", text, MAX_FIELD_CHARS),
                    source: optional_text(entry, "source", " ")
                        .map(|s| bound_text("source", s, MAX_CONDITION_CHARS))
                        .unwrap_or_default(),
                    confidence: coerce_confidence(entry.get("confidence")),
                })
            })
            .collect();

        Ok(GuidelineRecommendation {
            recommendations: cap_list("recommendations", recommendations, MAX_RECOMMENDATIONS),
            retrieved_sources: Vec::new(),
            raw: raw.to_string(),
        })
    })
}

pub fn guideline_fallback() -> GuidelineRecommendation {
    GuidelineRecommendation {
        recommendations: Vec::new(),
        retrieved_sources: Vec::new(),
        raw: String::new(),
    }
}

// ── Patient ──────────────────────────────────────────────

pub fn decode_patient(raw: &str) -> Validated<PatientExplanation> {
    decode_with("patient", raw, patient_fallback, |obj| {
        let summary = required_text(obj, "summary", " ")?;
        if summary.is_empty() {
            return Err(SchemaViolation::MissingField("summary"));
        }

        let key_points: Vec<String> = obj
            .get("key_points")
            .map(value_to_list)
            .unwrap_or_default()
            .into_iter()
            .map(|p| bound_text("key_points", p, MAX_FIELD_CHARS))
            .collect();

        Ok(PatientExplanation {
            summary: bound_text("summary", summary, MAX_FIELD_CHARS),
            key_points: cap_list("key_points", key_points, MAX_KEY_POINTS),
            next_steps_suggestion: optional_text(obj, "next_steps_suggestion", " ")
                .map(|s| bound_text("next_steps_suggestion", s, MAX_FIELD_CHARS))
                .unwrap_or_else(|| DEFAULT_NEXT_STEPS.to_string()),
            raw: raw.to_string(),
        })
    })
}

pub fn patient_fallback() -> PatientExplanation {
    PatientExplanation {
        summary: UNAVAILABLE.to_string(),
        key_points: Vec::new(),
        next_steps_suggestion: DEFAULT_NEXT_STEPS.to_string(),
        raw: String::new(),
    }
}
