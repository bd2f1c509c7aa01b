use std::sync::Mutex;

use super::{AuditError, AuditRecord, AuditSink};

/// Keeps records in memory. Used by tests and embedders that ship records
/// elsewhere themselves.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        self.records
            .lock()
            .map_err(|_| AuditError::LockPoisoned)?
            .push(record.clone());
        Ok(())
    }
}

/// Sink that rejects every write.
pub struct FailingAuditSink;

impl AuditSink for FailingAuditSink {
    fn record(&self, _record: &AuditRecord) -> Result<(), AuditError> {
        Err(AuditError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "audit store is read-only",
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_service::OperationKind;
    use crate::models::ClinicalInput;
    use std::sync::Arc;
    use uuid::Uuid;

    #[test]
    fn shared_sink_sees_records() {
        let sink = Arc::new(MemoryAuditSink::new());
        let input = ClinicalInput::from_notes("Cough and fever for three days, crackles.").unwrap();
        let record = AuditRecord::begin(Uuid::new_v4(), OperationKind::SoapOnly, "mock", &input);

        let handle: Arc<MemoryAuditSink> = Arc::clone(&sink);
        handle.record(&record).unwrap();
        assert_eq!(sink.records().len(), 1);
        assert_eq!(sink.records()[0].run_id, record.run_id);
    }

    #[test]
    fn failing_sink_errors() {
        let input = ClinicalInput::from_notes("Cough and fever for three days, crackles.").unwrap();
        let record = AuditRecord::begin(Uuid::new_v4(), OperationKind::Analysis, "mock", &input);
        assert!(matches!(FailingAuditSink.record(&record), Err(AuditError::Io(_))));
    }
}
