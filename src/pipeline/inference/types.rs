use serde::Serialize;

use super::InferenceError;
use crate::pipeline::agents::AgentRole;

/// Decoding parameters. Defaults are deterministic: greedy decoding with a
/// fixed seed so identical prompts give identical text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationParams {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub repeat_penalty: f32,
    pub seed: u64,
}

impl GenerationParams {
    pub fn with_max_tokens(max_new_tokens: u32) -> Self {
        Self {
            max_new_tokens,
            ..Self::default()
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 1024,
            temperature: 0.0,
            repeat_penalty: 1.15,
            seed: 0,
        }
    }
}

/// One generation call. `role` is carried for logging and for scripted
/// engines; real engines ignore it.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub role: AgentRole,
    pub system: &'a str,
    pub prompt: &'a str,
    pub params: GenerationParams,
}

/// Text in, text out. Implementations must be deterministic for a given
/// request when `temperature` is 0.
pub trait LlmGenerate {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, InferenceError>;

    /// Identifier recorded in results and audit records.
    fn model_id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_deterministic() {
        let params = GenerationParams::default();
        assert_eq!(params.temperature, 0.0);
        assert_eq!(params.seed, 0);
        assert!((params.repeat_penalty - 1.15).abs() < f32::EPSILON);
    }

    #[test]
    fn with_max_tokens_keeps_other_defaults() {
        let params = GenerationParams::with_max_tokens(2048);
        assert_eq!(params.max_new_tokens, 2048);
        assert_eq!(params.temperature, 0.0);
    }
}
