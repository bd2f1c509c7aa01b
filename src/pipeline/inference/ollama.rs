use serde::{Deserialize, Serialize};

use super::types::{GenerationRequest, LlmGenerate};
use super::InferenceError;

/// Ollama HTTP client for local inference. Blocking: callers run it on a
/// blocking thread.
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    /// Create a client pointing at a local Ollama instance.
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, InferenceError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| InferenceError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    /// Default Ollama instance at 127.0.0.1:11434 with 5-minute timeout.
    pub fn default_local(model: &str) -> Result<Self, InferenceError> {
        Self::new(
            crate::config::DEFAULT_OLLAMA_URL,
            model,
            crate::config::INFERENCE_TIMEOUT_SECS,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Names of locally installed models (`/api/tags`).
    pub fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(InferenceError::EngineError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaTagsResponse = response
            .json()
            .map_err(|e| InferenceError::ResponseParsing(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    /// `medgemma` matches `medgemma:latest` and `medgemma:4b`.
    pub fn is_model_available(&self, model: &str) -> Result<bool, InferenceError> {
        let models = self.list_models()?;
        Ok(models.iter().any(|m| model_matches(m, model)))
    }

    /// Fail unless the configured model is installed.
    pub fn verify_model(&self) -> Result<(), InferenceError> {
        if self.is_model_available(&self.model)? {
            Ok(())
        } else {
            Err(InferenceError::ModelUnavailable(self.model.clone()))
        }
    }

    /// Embed one text with a local embedding model (`/api/embed`).
    pub fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, InferenceError> {
        let url = format!("{}/api/embed", self.base_url);
        let body = OllamaEmbedRequest { model, input: text };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(InferenceError::EngineError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaEmbedResponse = response
            .json()
            .map_err(|e| InferenceError::ResponseParsing(e.to_string()))?;

        parsed
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| InferenceError::ResponseParsing("empty embeddings array".into()))
    }

    fn map_send_error(&self, e: reqwest::Error) -> InferenceError {
        if e.is_connect() {
            InferenceError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            InferenceError::HttpClient(format!("Request timed out after {}s", self.timeout_secs))
        } else {
            InferenceError::HttpClient(e.to_string())
        }
    }
}

fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted
        || installed
            .strip_prefix(wanted)
            .is_some_and(|rest| rest.starts_with(':'))
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    repeat_penalty: f32,
    seed: u64,
    num_predict: u32,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl LlmGenerate for OllamaClient {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, InferenceError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt: request.prompt,
            system: request.system,
            stream: false,
            options: OllamaOptions {
                temperature: request.params.temperature,
                repeat_penalty: request.params.repeat_penalty,
                seed: request.params.seed,
                num_predict: request.params.max_new_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(InferenceError::EngineError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .map_err(|e| InferenceError::ResponseParsing(e.to_string()))?;

        Ok(parsed.response)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
