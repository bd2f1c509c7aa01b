use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{AuditError, AuditRecord, AuditSink};

/// One JSON object per line, appended to a single file.
pub struct JsonlAuditSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().map_err(|_| AuditError::LockPoisoned)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        // Single write so a line is never interleaved with another record.
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_service::OperationKind;
    use crate::models::ClinicalInput;
    use uuid::Uuid;

    fn record() -> AuditRecord {
        let input = ClinicalInput::from_notes("Cough and fever for three days, crackles.").unwrap();
        AuditRecord::begin(Uuid::new_v4(), OperationKind::Analysis, "medgemma", &input)
    }

    #[test]
    fn appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlAuditSink::new(dir.path().join("logs").join("audit.jsonl"));

        let first = record();
        let second = record();
        sink.record(&first).unwrap();
        sink.record(&second).unwrap();

        let content = fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["run_id"], first.run_id.to_string());
        assert_eq!(parsed["model_id"], "medgemma");
        assert_eq!(parsed["kind"], "analysis");
        let parsed: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed["run_id"], second.run_id.to_string());
    }

    #[test]
    fn never_stores_input_text() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlAuditSink::new(dir.path().join("audit.jsonl"));
        sink.record(&record()).unwrap();
        let content = fs::read_to_string(sink.path()).unwrap();
        assert!(!content.contains("crackles"));
        assert!(content.contains("sha256:"));
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be.
        let sink = JsonlAuditSink::new(dir.path());
        assert!(sink.record(&record()).is_err());
    }
}
