//! Single point of access to the inference engine.
//!
//! The local engine serves one model and one request at a time. This service
//! owns the engine handle, enforces exclusive access and tracks what's running.
//!
//! - `acquire()` blocks until the engine is free
//! - the returned `EngineGuard` implements `LlmGenerate` and is the only way to reach the engine
//! - `current_operation()` provides observability (what kind, which stage, when started)

use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::pipeline::inference::{GenerationRequest, InferenceError, LlmGenerate};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// What kind of engine operation is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Full four-agent analysis
    Analysis,
    /// SOAP structuring only
    SoapOnly,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::SoapOnly => "soap_only",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Analysis => write!(f, "Analysis"),
            Self::SoapOnly => write!(f, "SOAP structuring"),
        }
    }
}

/// Snapshot of the currently running engine operation.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveOperation {
    pub kind: OperationKind,
    pub model: String,
    /// Pipeline stage currently using the engine, if any.
    pub stage: Option<String>,
    /// When the operation started (ISO 8601).
    pub started_at: String,
}

/// Errors from EngineService operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineServiceError {
    #[error("Internal lock error")]
    LockPoisoned,
}

// ═══════════════════════════════════════════════════════════
// EngineService
// ═══════════════════════════════════════════════════════════

/// Exclusive access controller around the one engine handle.
pub struct EngineService {
    engine: Box<dyn LlmGenerate + Send + Sync>,
    /// Exclusive access lock: one operation at a time.
    lock: Mutex<()>,
    /// What's currently running (observable state).
    current_op: Mutex<Option<ActiveOperation>>,
}

impl EngineService {
    pub fn new(engine: Box<dyn LlmGenerate + Send + Sync>) -> Self {
        Self {
            engine,
            lock: Mutex::new(()),
            current_op: Mutex::new(None),
        }
    }

    pub fn model_id(&self) -> &str {
        self.engine.model_id()
    }

    /// Acquire exclusive access to the engine. Blocks until available.
    ///
    /// The guard must be held for the entire operation; dropping it releases
    /// the lock and clears the current operation state.
    pub fn acquire(&self, kind: OperationKind) -> Result<EngineGuard<'_>, EngineServiceError> {
        let guard = self.lock.lock().map_err(|_| EngineServiceError::LockPoisoned)?;
        self.set_current_op(kind);
        Ok(EngineGuard {
            _guard: guard,
            service: self,
        })
    }

    /// What operation is currently running?
    ///
    /// Returns `None` if the engine is idle.
    pub fn current_operation(&self) -> Option<ActiveOperation> {
        self.current_op.lock().ok()?.clone()
    }

    /// Is the engine currently busy with an operation?
    pub fn is_busy(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    // ── Internal ────────────────────────────────────────────

    fn set_current_op(&self, kind: OperationKind) {
        if let Ok(mut current) = self.current_op.lock() {
            *current = Some(ActiveOperation {
                kind,
                model: self.engine.model_id().to_string(),
                stage: None,
                started_at: chrono::Utc::now().to_rfc3339(),
            });
        }
    }

    fn set_stage(&self, stage: &str) {
        if let Ok(mut current) = self.current_op.lock() {
            if let Some(op) = current.as_mut() {
                op.stage = Some(stage.to_string());
            }
        }
    }

    fn clear_current_op(&self) {
        if let Ok(mut current) = self.current_op.lock() {
            *current = None;
        }
    }
}

// ═══════════════════════════════════════════════════════════
// EngineGuard: RAII exclusive access token
// ═══════════════════════════════════════════════════════════

/// RAII guard for exclusive engine access.
///
/// Dropping the guard releases the lock and clears the current operation.
pub struct EngineGuard<'a> {
    _guard: MutexGuard<'a, ()>,
    service: &'a EngineService,
}

impl EngineGuard<'_> {
    /// Record a non-generation stage (e.g. retrieval) in the operation snapshot.
    pub fn enter_stage(&self, stage: &str) {
        self.service.set_stage(stage);
    }
}

impl LlmGenerate for EngineGuard<'_> {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, InferenceError> {
        self.service.set_stage(request.role.as_str());
        self.service.engine.generate(request)
    }

    fn model_id(&self) -> &str {
        self.service.model_id()
    }
}

impl Drop for EngineGuard<'_> {
    fn drop(&mut self) {
        self.service.clear_current_op();
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
