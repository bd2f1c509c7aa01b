//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::models::InputError;
use crate::pipeline::orchestrator::AnalysisError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
    pub safe_to_retry: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Inference engine unavailable during {stage}: {detail}")]
    InferenceUnavailable { stage: &'static str, detail: String },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, safe_to_retry) = match &self {
            ApiError::InvalidInput(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_INPUT",
                detail.clone(),
                false,
            ),
            ApiError::InferenceUnavailable { stage, detail } => {
                tracing::error!(stage, detail, "Analysis aborted by inference failure");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "INFERENCE_UNAVAILABLE",
                    format!("The local model failed during the {stage} stage. Check that the engine is running."),
                    true,
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                    false,
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
            safe_to_retry,
        };
        (status, Json(body)).into_response()
    }
}

impl From<InputError> for ApiError {
    fn from(err: InputError) -> Self {
        ApiError::InvalidInput(err.to_string())
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::Inference { stage, source } => ApiError::InferenceUnavailable {
                stage: stage.as_str(),
                detail: source.to_string(),
            },
            AnalysisError::Engine(e) => ApiError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::agents::AgentRole;
    use crate::pipeline::inference::InferenceError;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn invalid_input_returns_422() {
        let err: ApiError = InputError::NotesTooShort { min: 20, actual: 3 }.into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "INVALID_INPUT");
        assert_eq!(json["safe_to_retry"], false);
        assert!(json["error"]["message"].as_str().unwrap().contains("20"));
    }

    #[tokio::test]
    async fn inference_failure_returns_503_retryable() {
        let err: ApiError = AnalysisError::Inference {
            stage: AgentRole::Differential,
            source: InferenceError::Connection("refused".into()),
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "INFERENCE_UNAVAILABLE");
        assert_eq!(json["safe_to_retry"], true);
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("differential"));
    }

    #[tokio::test]
    async fn internal_returns_500() {
        let response = ApiError::Internal("something broke".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        // Internal errors hide details from client
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn engine_error_maps_to_internal() {
        let err: ApiError =
            AnalysisError::Engine(crate::engine_service::EngineServiceError::LockPoisoned).into();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
