//! In-process engines for tests and fault injection.

use std::collections::HashMap;
use std::sync::Mutex;

use super::types::{GenerationRequest, LlmGenerate};
use super::InferenceError;
use crate::pipeline::agents::AgentRole;

/// One call observed by [`ScriptedGenerator`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub role: AgentRole,
    pub system: String,
    pub prompt: String,
    pub max_new_tokens: u32,
}

#[derive(Debug, Clone)]
enum Script {
    Respond(String),
    Fail(InferenceError),
}

/// Engine that answers each agent role with a fixed script.
/// Roles without a script get an empty response.
pub struct ScriptedGenerator {
    model_id: String,
    scripts: HashMap<AgentRole, Script>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGenerator {
    pub fn new(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            scripts: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(mut self, role: AgentRole, response: &str) -> Self {
        self.scripts.insert(role, Script::Respond(response.to_string()));
        self
    }

    /// Make `role` fail with an engine error.
    pub fn failing_on(mut self, role: AgentRole) -> Self {
        self.scripts.insert(
            role,
            Script::Fail(InferenceError::EngineError {
                status: 500,
                body: "scripted failure".into(),
            }),
        );
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl LlmGenerate for ScriptedGenerator {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, InferenceError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                role: request.role,
                system: request.system.to_string(),
                prompt: request.prompt.to_string(),
                max_new_tokens: request.params.max_new_tokens,
            });
        }
        match self.scripts.get(&request.role) {
            Some(Script::Respond(text)) => Ok(text.clone()),
            Some(Script::Fail(err)) => Err(err.clone()),
            None => Ok(String::new()),
        }
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Engine that is never reachable.
pub struct FailingGenerator;

impl LlmGenerate for FailingGenerator {
    fn generate(&self, _request: &GenerationRequest<'_>) -> Result<String, InferenceError> {
        Err(InferenceError::Connection("unreachable".into()))
    }

    fn model_id(&self) -> &str {
        "unavailable"
    }
}
