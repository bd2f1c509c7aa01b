use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use super::{AuditError, AuditRecord, AuditSink};

/// Summary row of one audited run.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRow {
    pub run_id: String,
    pub recorded_at: String,
    pub model_id: String,
    pub outcome: String,
}

/// Append-only `analysis_audit` table in a local SQLite file.
pub struct SqliteAuditSink {
    conn: Mutex<Connection>,
}

impl SqliteAuditSink {
    pub fn open(path: &Path) -> Result<Self, AuditError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    /// In-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, AuditError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, AuditError> {
        conn.execute_batch("PRAGMA journal_mode=DELETE;")?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Most recent runs first.
    pub fn recent(&self, limit: usize) -> Result<Vec<AuditRow>, AuditError> {
        let conn = self.conn.lock().map_err(|_| AuditError::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT run_id, recorded_at, model_id, outcome FROM analysis_audit
             ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(AuditRow {
                    run_id: row.get(0)?,
                    recorded_at: row.get(1)?,
                    model_id: row.get(2)?,
                    outcome: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Full JSON record of a run, if audited.
    pub fn record_json(&self, run_id: &str) -> Result<Option<String>, AuditError> {
        let conn = self.conn.lock().map_err(|_| AuditError::LockPoisoned)?;
        let mut stmt =
            conn.prepare("SELECT record_json FROM analysis_audit WHERE run_id = ?1 ORDER BY id LIMIT 1")?;
        let mut rows = stmt.query(params![run_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }
}

impl AuditSink for SqliteAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let json = serde_json::to_string(record)?;
        let conn = self.conn.lock().map_err(|_| AuditError::LockPoisoned)?;
        conn.execute(
            "INSERT INTO analysis_audit
                (run_id, recorded_at, started_at, kind, model_id, input_fingerprint,
                 outcome, processing_time_seconds, record_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.run_id.to_string(),
                record.timestamp.to_rfc3339(),
                record.started_at.to_rfc3339(),
                record.kind.as_str(),
                record.model_id,
                record.input_fingerprint,
                record.outcome.as_str(),
                record.processing_time_seconds,
                json,
            ],
        )?;
        Ok(())
    }
}

fn run_migrations(conn: &Connection) -> Result<(), AuditError> {
    let current_version = get_current_version(conn);

    let migrations: Vec<(i64, &str)> = vec![(
        1,
        include_str!("../../../resources/migrations/001_analysis_audit.sql"),
    )];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running audit migration v{version}");
            conn.execute_batch(sql)?;
        }
    }
    Ok(())
}

/// 0 if no schema exists yet
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_service::OperationKind;
    use crate::models::ClinicalInput;
    use crate::pipeline::agents::AgentRole;
    use crate::pipeline::audit::AuditOutcome;
    use uuid::Uuid;

    fn record(outcome: AuditOutcome) -> AuditRecord {
        let input = ClinicalInput::from_notes("Cough and fever for three days, crackles.").unwrap();
        let mut record =
            AuditRecord::begin(Uuid::new_v4(), OperationKind::Analysis, "medgemma", &input);
        record.finish(chrono::Utc::now(), 2.5, outcome);
        record
    }

    #[test]
    fn insert_and_list_recent() {
        let sink = SqliteAuditSink::open_in_memory().unwrap();
        let a = record(AuditOutcome::Complete);
        let b = record(AuditOutcome::Failed {
            stage: AgentRole::Soap,
            error: "engine down".into(),
        });
        sink.record(&a).unwrap();
        sink.record(&b).unwrap();

        let rows = sink.recent(10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].run_id, b.run_id.to_string());
        assert_eq!(rows[0].outcome, "failed");
        assert_eq!(rows[1].outcome, "complete");
        assert_eq!(rows[1].model_id, "medgemma");
    }

    #[test]
    fn record_json_round_trips_run_id() {
        let sink = SqliteAuditSink::open_in_memory().unwrap();
        let a = record(AuditOutcome::Complete);
        sink.record(&a).unwrap();

        let json = sink.record_json(&a.run_id.to_string()).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["run_id"], a.run_id.to_string());
        assert!(sink.record_json("missing").unwrap().is_none());
    }

    #[test]
    fn table_rejects_update_and_delete() {
        let sink = SqliteAuditSink::open_in_memory().unwrap();
        sink.record(&record(AuditOutcome::Complete)).unwrap();

        let conn = sink.conn.lock().unwrap();
        assert!(conn
            .execute("UPDATE analysis_audit SET outcome = 'complete'", [])
            .is_err());
        assert!(conn.execute("DELETE FROM analysis_audit", []).is_err());
    }

    #[test]
    fn reopening_file_keeps_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join("audit.db");
        {
            let sink = SqliteAuditSink::open(&path).unwrap();
            sink.record(&record(AuditOutcome::Complete)).unwrap();
        }
        let sink = SqliteAuditSink::open(&path).unwrap();
        sink.record(&record(AuditOutcome::Complete)).unwrap();
        assert_eq!(sink.recent(10).unwrap().len(), 2);
    }
}
