//! Pipeline diagnostic dump: writes every prompt and raw model output to disk.
//!
//! **Activation**: disabled unless `MEDASSIST_DUMP_DIR` is set.
//!
//! **Output structure**:
//! ```text
//! {dump_dir}/{run_id}/
//!   01-soap-prompt.txt
//!   01-soap-raw.txt
//!   02-differential-prompt.txt
//!   02-differential-raw.txt
//!   03-retrieval.json
//!   04-guideline-prompt.txt
//!   04-guideline-raw.txt
//!   05-patient-prompt.txt
//!   05-patient-raw.txt
//!   06-result.json
//! ```
//!
//! Dumps contain clinical text. They are a local debugging aid and every
//! failure here is logged and ignored.

use std::path::{Path, PathBuf};

use uuid::Uuid;

pub const DUMP_DIR_ENV: &str = "MEDASSIST_DUMP_DIR";

/// Base directory for per-run dumps.
#[derive(Debug, Clone)]
pub struct DiagnosticDump {
    base: PathBuf,
}

impl DiagnosticDump {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// `None` unless `MEDASSIST_DUMP_DIR` is set.
    pub fn from_env() -> Option<Self> {
        std::env::var_os(DUMP_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(Self::new)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// The dump directory for a run, created on first call. `None` (with a
    /// warning) if it can't be created.
    pub fn run_dir(&self, run_id: &Uuid) -> Option<PathBuf> {
        let dir = self.base.join(run_id.to_string());

        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(
                path = %dir.display(),
                error = %e,
                "Diagnostic dump: failed to create directory"
            );
            return None;
        }

        Some(dir)
    }
}

/// `NN-<stage>-prompt.txt` and `NN-<stage>-raw.txt`.
pub fn dump_exchange(dir: &Path, step: u8, stage: &str, prompt: &str, raw: &str) {
    dump_text(dir, &format!("{step:02}-{stage}-prompt.txt"), prompt);
    dump_text(dir, &format!("{step:02}-{stage}-raw.txt"), raw);
}

/// Write a JSON artifact (any serde-serializable value), pretty-printed.
pub fn dump_json<T: serde::Serialize>(dir: &Path, filename: &str, value: &T) {
    let path = dir.join(filename);
    match serde_json::to_string_pretty(value) {
        Ok(json) => match std::fs::write(&path, json.as_bytes()) {
            Ok(()) => tracing::debug!(
                path = %path.display(),
                size = json.len(),
                "Diagnostic dump: JSON written"
            ),
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "Diagnostic dump: failed to write JSON"
            ),
        },
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Diagnostic dump: failed to serialize JSON"
        ),
    }
}

pub fn dump_text(dir: &Path, filename: &str, text: &str) {
    let path = dir.join(filename);
    match std::fs::write(&path, text.as_bytes()) {
        Ok(()) => tracing::debug!(
            path = %path.display(),
            size = text.len(),
            "Diagnostic dump: text written"
        ),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Diagnostic dump: failed to write text"
        ),
    }
}
