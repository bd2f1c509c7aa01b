//! The four agents. Each is a strategy (`AgentSpec`) run through one generic
//! driver, so prompt construction and decoding are the only per-agent code.

pub mod differential;
pub mod excerpts;
pub mod guideline;
pub mod patient;
pub mod prompts;
pub mod soap;

pub use differential::*;
pub use guideline::*;
pub use patient::*;
pub use soap::*;

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::pipeline::inference::{GenerationParams, GenerationRequest, InferenceError, LlmGenerate};
use crate::pipeline::validation::Validated;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Soap,
    Differential,
    Guideline,
    Patient,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Soap => "soap",
            Self::Differential => "differential",
            Self::Guideline => "guideline",
            Self::Patient => "patient",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-agent strategy: what to ask and how to read the answer.
pub trait AgentSpec {
    /// Borrowed inputs this agent reads.
    type Context<'a>;
    type Output;

    fn role(&self) -> AgentRole;

    fn system_prompt(&self) -> &'static str;

    fn build_prompt(&self, ctx: &Self::Context<'_>) -> String;

    fn max_new_tokens(&self) -> u32;

    /// Never fails: schema violations become `Degraded`.
    fn decode(&self, raw: &str, ctx: &Self::Context<'_>) -> Validated<Self::Output>;
}

/// Everything one agent call produced.
#[derive(Debug, Clone)]
pub struct AgentRun<T> {
    pub output: Validated<T>,
    pub prompt: String,
    pub raw: String,
    pub elapsed: Duration,
}

/// Build the prompt, call the engine once, decode. Only an engine failure
/// is an error.
pub fn run_agent<A: AgentSpec>(
    agent: &A,
    engine: &dyn LlmGenerate,
    ctx: &A::Context<'_>,
) -> Result<AgentRun<A::Output>, InferenceError> {
    let role = agent.role();
    let _span = tracing::info_span!("agent", stage = role.as_str()).entered();

    let prompt = agent.build_prompt(ctx);
    let request = GenerationRequest {
        role,
        system: agent.system_prompt(),
        prompt: &prompt,
        params: GenerationParams::with_max_tokens(agent.max_new_tokens()),
    };

    let start = Instant::now();
    let raw = engine.generate(&request).map_err(|e| {
        tracing::error!(error = %e, "Inference failed");
        e
    })?;
    let elapsed = start.elapsed();

    let output = agent.decode(&raw, ctx);
    tracing::info!(
        elapsed_ms = elapsed.as_millis() as u64,
        prompt_chars = prompt.chars().count(),
        raw_chars = raw.chars().count(),
        degraded = output.is_degraded(),
        "Agent finished"
    );

    Ok(AgentRun {
        output,
        prompt,
        raw,
        elapsed,
    })
}

/// "Not provided" for absent optional text.
pub(crate) fn or_not_provided(value: Option<&str>) -> &str {
    value.unwrap_or("Not provided")
}
