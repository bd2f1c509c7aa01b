//! Analysis endpoints.
//!
//! - `POST /analyze`: all four agents
//! - `POST /analyze/soap`: SOAP structuring only
//!
//! The pipeline is blocking; it runs on the blocking pool.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::{AnalysisResult, ClinicalInput, ClinicalInputDraft, RunStatus, SoapAnalysis};

#[derive(Serialize)]
pub struct AnalyzeResponse {
    #[serde(flatten)]
    pub run_status: RunStatus,
    #[serde(flatten)]
    pub result: AnalysisResult,
}

/// `POST /analyze`
pub async fn full(
    State(ctx): State<ApiContext>,
    payload: Result<Json<ClinicalInputDraft>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let input = accept(payload)?;
    let pipeline = Arc::clone(&ctx.pipeline);

    let result = tokio::task::spawn_blocking(move || pipeline.analyze(&input))
        .await
        .map_err(|e| ApiError::Internal(format!("Analysis task failed: {e}")))??;

    Ok(Json(AnalyzeResponse {
        run_status: result.status(),
        result,
    }))
}

/// `POST /analyze/soap`
pub async fn soap(
    State(ctx): State<ApiContext>,
    payload: Result<Json<ClinicalInputDraft>, JsonRejection>,
) -> Result<Json<SoapAnalysis>, ApiError> {
    let input = accept(payload)?;
    let pipeline = Arc::clone(&ctx.pipeline);

    let result = tokio::task::spawn_blocking(move || pipeline.analyze_soap(&input))
        .await
        .map_err(|e| ApiError::Internal(format!("SOAP task failed: {e}")))??;

    Ok(Json(result))
}

fn accept(
    payload: Result<Json<ClinicalInputDraft>, JsonRejection>,
) -> Result<ClinicalInput, ApiError> {
    let Json(draft) = payload.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    Ok(ClinicalInput::validate(draft)?)
}
