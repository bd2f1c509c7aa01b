pub mod extract;
pub mod outcome;
pub mod policy;
pub mod schemas;

pub use extract::*;
pub use outcome::*;
pub use schemas::*;

use thiserror::Error;

/// Why a model response could not be turned into a structured artifact.
/// Never surfaces to callers: it ends up as the `reason` of a degraded section.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaViolation {
    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("No JSON object found in model response")]
    NoJsonObject,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field {field} has the wrong type (expected {expected})")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Model refused the input: {0}")]
    Refusal(String),
}
