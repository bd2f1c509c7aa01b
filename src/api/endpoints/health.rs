//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;
use crate::engine_service::ActiveOperation;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model: String,
    pub engine_busy: bool,
    pub retrieval_enabled: bool,
    pub current_operation: Option<ActiveOperation>,
}

/// `GET /health`. Never touches the engine lock.
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    let engine = ctx.pipeline.engine();

    Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        model: ctx.pipeline.model_id().to_string(),
        engine_busy: engine.is_busy(),
        retrieval_enabled: ctx.pipeline.retrieval_enabled(),
        current_operation: engine.current_operation(),
    })
}
