//! Analysis orchestrator.
//!
//! Drives one run through `Idle → SOAP → Differential → Guideline → Patient
//! → Done`. Forward only, no retries. A stage starts once the previous agent
//! has returned, parsed or degraded. The only terminal error is an inference
//! failure; every run, failed or not, leaves one audit record behind before
//! this module returns.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::config::DISCLAIMER;
use crate::engine_service::{EngineGuard, EngineService, EngineServiceError, OperationKind};
use crate::models::{AnalysisResult, ClinicalInput, RunStatus, SoapAnalysis};
use crate::pipeline::agents::{
    run_agent, AgentRole, AgentRun, AgentSpec, DifferentialAgent, DifferentialContext,
    GuidelineAgent, GuidelineContext, PatientAgent, PatientContext, SoapAgent,
};
use crate::pipeline::audit::{
    record_best_effort, AgentEvent, AuditOutcome, AuditRecord, AuditSink,
};
use crate::pipeline::diagnostic::{self, DiagnosticDump};
use crate::pipeline::inference::{InferenceError, LlmGenerate};
use crate::pipeline::retrieval::{build_query, RetrievalStage, RetrievalSummary};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Inference failed during {stage} stage: {source}")]
    Inference {
        stage: AgentRole,
        source: InferenceError,
    },

    #[error("Engine unavailable: {0}")]
    Engine(#[from] EngineServiceError),
}

// ---------------------------------------------------------------------------
// Stage machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Soap,
    Differential,
    Guideline,
    Patient,
    Done,
}

impl PipelineStage {
    /// The single successor. `Done` is terminal.
    pub fn next(self) -> Self {
        match self {
            Self::Idle => Self::Soap,
            Self::Soap => Self::Differential,
            Self::Differential => Self::Guideline,
            Self::Guideline => Self::Patient,
            Self::Patient | Self::Done => Self::Done,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Soap => "soap",
            Self::Differential => "differential",
            Self::Guideline => "guideline",
            Self::Patient => "patient",
            Self::Done => "done",
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The four-agent analysis pipeline over one shared engine.
pub struct Pipeline {
    engine: Arc<EngineService>,
    retrieval: RetrievalStage,
    audit: Box<dyn AuditSink + Send + Sync>,
    dump: Option<DiagnosticDump>,
}

impl Pipeline {
    pub fn new(
        engine: Arc<EngineService>,
        retrieval: RetrievalStage,
        audit: Box<dyn AuditSink + Send + Sync>,
    ) -> Self {
        Self {
            engine,
            retrieval,
            audit,
            dump: None,
        }
    }

    pub fn with_dump(mut self, dump: Option<DiagnosticDump>) -> Self {
        self.dump = dump;
        self
    }

    pub fn engine(&self) -> &Arc<EngineService> {
        &self.engine
    }

    pub fn model_id(&self) -> &str {
        self.engine.model_id()
    }

    pub fn retrieval_enabled(&self) -> bool {
        self.retrieval.is_enabled()
    }

    /// Full analysis. Blocks while another run holds the engine.
    pub fn analyze(&self, input: &ClinicalInput) -> Result<AnalysisResult, AnalysisError> {
        let run_id = Uuid::new_v4();
        let _span = tracing::info_span!("analysis_run", run_id = %run_id).entered();

        let guard = self.engine.acquire(OperationKind::Analysis)?;
        let mut run = RunState::begin(self, run_id, OperationKind::Analysis, input);
        let (has_labs, has_imaging) = (input.has_labs(), input.has_imaging());
        tracing::info!(
            model = self.model_id(),
            has_labs,
            has_imaging,
            "Analysis started"
        );

        run.advance(PipelineStage::Soap);
        let soap = run.step(&SoapAgent, &guard, &input, 1)?.output;

        run.advance(PipelineStage::Differential);
        let differential = run
            .step(
                &DifferentialAgent,
                &guard,
                &DifferentialContext {
                    soap: soap.value(),
                    input,
                },
                2,
            )?
            .output;

        run.advance(PipelineStage::Guideline);
        guard.enter_stage("retrieval");
        let query = build_query(soap.value(), differential.value());
        let (chunks, retrieval_error) =
            match self.retrieval.try_retrieve(&query, self.retrieval.top_k()) {
                Ok(chunks) => (chunks, None),
                Err(e) => {
                    tracing::warn!(error = %e, "Guideline retrieval failed, continuing without excerpts");
                    (Vec::new(), Some(e.to_string()))
                }
            };
        let summary = RetrievalSummary::new(&query, &chunks, retrieval_error);
        tracing::info!(
            chunks = chunks.len(),
            sources = summary.sources.len(),
            top_score = summary.top_score.unwrap_or(0.0),
            "Retrieval finished"
        );
        run.dump_json("03-retrieval.json", &summary);
        run.record.retrieval = Some(summary);

        let guidelines = run
            .step(
                &GuidelineAgent,
                &guard,
                &GuidelineContext {
                    soap: soap.value(),
                    ddx: differential.value(),
                    chunks: &chunks,
                },
                4,
            )?
            .output;

        run.advance(PipelineStage::Patient);
        let patient = run
            .step(
                &PatientAgent,
                &guard,
                &PatientContext {
                    soap: soap.value(),
                    ddx: differential.value(),
                },
                5,
            )?
            .output;

        run.advance(PipelineStage::Done);
        let completed_at = Utc::now();
        let result = AnalysisResult {
            run_id,
            soap,
            differential,
            guidelines,
            patient,
            model_id: guard.model_id().to_string(),
            processing_time_seconds: run.elapsed_seconds(),
            completed_at,
            disclaimer: DISCLAIMER.to_string(),
        };

        let outcome = match result.status() {
            RunStatus::Complete => AuditOutcome::Complete,
            RunStatus::Degraded { sections } => AuditOutcome::Degraded { sections },
        };
        tracing::info!(
            elapsed_ms = (result.processing_time_seconds * 1000.0) as u64,
            outcome = outcome.as_str(),
            "Analysis complete"
        );
        run.finish(completed_at, result.processing_time_seconds, outcome);
        run.dump_json("06-result.json", &result);

        Ok(result)
    }

    /// SOAP structuring only, audited as its own run.
    pub fn analyze_soap(&self, input: &ClinicalInput) -> Result<SoapAnalysis, AnalysisError> {
        let run_id = Uuid::new_v4();
        let _span = tracing::info_span!("analysis_run", run_id = %run_id).entered();

        let guard = self.engine.acquire(OperationKind::SoapOnly)?;
        let mut run = RunState::begin(self, run_id, OperationKind::SoapOnly, input);

        run.advance(PipelineStage::Soap);
        let soap = run.step(&SoapAgent, &guard, &input, 1)?.output;
        run.advance(PipelineStage::Done);

        let completed_at = Utc::now();
        let result = SoapAnalysis {
            run_id,
            model_id: guard.model_id().to_string(),
            processing_time_seconds: run.elapsed_seconds(),
            completed_at,
            disclaimer: DISCLAIMER.to_string(),
            soap,
        };

        let outcome = if result.soap.is_degraded() {
            AuditOutcome::Degraded {
                sections: vec!["soap"],
            }
        } else {
            AuditOutcome::Complete
        };
        run.finish(completed_at, result.processing_time_seconds, outcome);
        run.dump_json("06-result.json", &result);

        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Per-run state
// ---------------------------------------------------------------------------

struct RunState<'p> {
    pipeline: &'p Pipeline,
    record: AuditRecord,
    dump_dir: Option<PathBuf>,
    started: Instant,
    stage: PipelineStage,
}

impl<'p> RunState<'p> {
    fn begin(
        pipeline: &'p Pipeline,
        run_id: Uuid,
        kind: OperationKind,
        input: &ClinicalInput,
    ) -> Self {
        Self {
            pipeline,
            record: AuditRecord::begin(run_id, kind, pipeline.model_id(), input),
            dump_dir: pipeline.dump.as_ref().and_then(|d| d.run_dir(&run_id)),
            started: Instant::now(),
            stage: PipelineStage::Idle,
        }
    }

    fn advance(&mut self, to: PipelineStage) {
        debug_assert!(to > self.stage, "pipeline stages only move forward");
        tracing::debug!(from = self.stage.as_str(), to = to.as_str(), "Stage transition");
        self.stage = to;
    }

    fn elapsed_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Run one agent and record it. An inference failure writes the
    /// failure audit record before it is returned.
    fn step<A>(
        &mut self,
        agent: &A,
        engine: &EngineGuard<'_>,
        ctx: &A::Context<'_>,
        step: u8,
    ) -> Result<AgentRun<A::Output>, AnalysisError>
    where
        A: AgentSpec,
        A::Output: Serialize,
    {
        let role = agent.role();
        match run_agent(agent, engine, ctx) {
            Ok(run) => {
                self.record.push(role, &run);
                if let Some(dir) = self.dump_dir.as_deref() {
                    diagnostic::dump_exchange(dir, step, role.as_str(), &run.prompt, &run.raw);
                }
                Ok(run)
            }
            Err(source) => {
                let error = source.to_string();
                self.record.events.push(AgentEvent::failed(role, &error));
                let elapsed = self.elapsed_seconds();
                self.finish(
                    Utc::now(),
                    elapsed,
                    AuditOutcome::Failed { stage: role, error },
                );
                Err(AnalysisError::Inference {
                    stage: role,
                    source,
                })
            }
        }
    }

    fn finish(
        &mut self,
        completed_at: chrono::DateTime<Utc>,
        processing_time_seconds: f64,
        outcome: AuditOutcome,
    ) {
        self.record
            .finish(completed_at, processing_time_seconds, outcome);
        record_best_effort(self.pipeline.audit.as_ref(), &self.record);
    }

    fn dump_json<T: Serialize>(&self, filename: &str, value: &T) {
        if let Some(dir) = self.dump_dir.as_deref() {
            diagnostic::dump_json(dir, filename, value);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
