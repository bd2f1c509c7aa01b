//! Inference engine boundary: the generation contract, the local Ollama
//! client and in-process generators for fault injection.

pub mod mock;
pub mod ollama;
pub mod types;

pub use mock::*;
pub use ollama::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("Inference engine is not reachable at {0}")]
    Connection(String),

    #[error("Inference engine returned error (status {status}): {body}")]
    EngineError { status: u16, body: String },

    #[error("Model {0} is not available in the local engine")]
    ModelUnavailable(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}
