use std::fmt::Write;

use super::excerpts::entries_from_chunks;
use super::prompts::{GUIDELINE_SYSTEM, NO_EXCERPT_INSTRUCTION};
use super::{AgentRole, AgentSpec};
use crate::config::GUIDELINE_MAX_TOKENS;
use crate::models::{
    DifferentialDiagnosis, EvidenceConfidence, GuidelineEntry, GuidelineRecommendation, SoapNote,
};
use crate::pipeline::retrieval::{distinct_sources, RetrievedChunk};
use crate::pipeline::validation::{decode_guideline, Validated};

/// Note + differential + retrieved excerpts -> cited recommendations.
pub struct GuidelineAgent;

pub struct GuidelineContext<'a> {
    pub soap: &'a SoapNote,
    pub ddx: &'a DifferentialDiagnosis,
    /// Retrieval output, best first. May be empty.
    pub chunks: &'a [RetrievedChunk],
}

impl AgentSpec for GuidelineAgent {
    type Context<'a> = GuidelineContext<'a>;
    type Output = GuidelineRecommendation;

    fn role(&self) -> AgentRole {
        AgentRole::Guideline
    }

    fn system_prompt(&self) -> &'static str {
        GUIDELINE_SYSTEM
    }

    fn build_prompt(&self, ctx: &GuidelineContext<'_>) -> String {
        let conditions: Vec<&str> = ctx.ddx.condition_names().collect();
        let conditions = if conditions.is_empty() {
            "None listed".to_string()
        } else {
            conditions.join(", ")
        };

        let mut prompt = format!(
            "CLINICAL ASSESSMENT:\n{}\n\n\
             CONDITIONS UNDER CONSIDERATION:\n{conditions}\n\n\
             CURRENT PLAN SUGGESTIONS:\n{}\n\n",
            ctx.soap.assessment, ctx.soap.plan_suggestions,
        );

        if ctx.chunks.is_empty() {
            prompt.push_str(NO_EXCERPT_INSTRUCTION);
            return prompt;
        }

        prompt.push_str("GUIDELINE EXCERPTS (cite only these):\n");
        for chunk in ctx.chunks {
            // Infallible on String.
            let _ = write!(
                prompt,
                "\n[{}] source: {}\n{}\n",
                chunk.rank, chunk.source, chunk.text
            );
        }
        prompt.push_str(
            "\nSummarise what these excerpts recommend for this case. \
             Cite the source of each recommendation exactly as shown above.",
        );
        prompt
    }

    fn max_new_tokens(&self) -> u32 {
        GUIDELINE_MAX_TOKENS
    }

    fn decode(&self, raw: &str, ctx: &GuidelineContext<'_>) -> Validated<GuidelineRecommendation> {
        let mut output = fill_from_excerpts(decode_guideline(raw), raw, ctx.chunks);
        ground_in_chunks(output.value_mut(), ctx.chunks);
        output
    }
}

/// Excerpts were retrieved but the model gave nothing usable: read the
/// excerpts by rule instead. The section stays (or becomes) `Degraded`
/// because these entries did not come from a validated model answer.
fn fill_from_excerpts(
    output: Validated<GuidelineRecommendation>,
    raw: &str,
    chunks: &[RetrievedChunk],
) -> Validated<GuidelineRecommendation> {
    if chunks.is_empty() {
        return output;
    }
    let reason = match &output {
        Validated::Parsed(rec) if rec.recommendations.is_empty() => {
            Some("model returned no recommendations for retrieved excerpts".to_string())
        }
        Validated::Parsed(_) => None,
        Validated::Degraded { reason, .. } => Some(reason.clone()),
    };
    let Some(reason) = reason else {
        return output;
    };

    let entries = entries_from_chunks(chunks);
    if entries.is_empty() {
        return output;
    }
    tracing::info!(
        entries = entries.len(),
        "Guideline entries read from excerpts in place of model output"
    );

    let mut fallback = output.into_value();
    fallback.recommendations = entries;
    fallback.raw = String::new();
    Validated::Degraded {
        fallback,
        raw: raw.to_string(),
        reason: format!("{reason}; entries read from retrieved excerpts"),
    }
}

/// Tie the model's answer to what retrieval actually returned.
fn ground_in_chunks(rec: &mut GuidelineRecommendation, chunks: &[RetrievedChunk]) {
    if chunks.is_empty() {
        if !rec.recommendations.is_empty() {
            tracing::warn!(
                dropped = rec.recommendations.len(),
                "Guideline output without excerpts replaced by no-evidence entry"
            );
        }
        rec.recommendations = vec![GuidelineEntry::no_evidence()];
        rec.retrieved_sources = Vec::new();
        return;
    }

    let sources = distinct_sources(chunks);
    let mut downgraded = 0usize;
    for entry in &mut rec.recommendations {
        if entry.confidence != EvidenceConfidence::LowEvidence && !cites_any(&entry.source, &sources)
        {
            entry.confidence = EvidenceConfidence::LowEvidence;
            downgraded += 1;
        }
    }
    if downgraded > 0 {
        tracing::debug!(downgraded, "Recommendations citing unretrieved sources downgraded");
    }

    rec.retrieved_sources = if rec.recommendations.is_empty() {
        Vec::new()
    } else {
        sources
    };
}

/// Models sometimes decorate the citation ("cap.md, section 2"), so a
/// contained source name counts.
fn cites_any(cited: &str, sources: &[String]) -> bool {
    let cited = cited.trim().to_lowercase();
    !cited.is_empty()
        && sources
            .iter()
            .any(|s| cited.contains(&s.to_lowercase()))
}
