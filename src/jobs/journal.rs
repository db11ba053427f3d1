use anyhow::Result;
use rusqlite::{Connection, params};
use serde_json::Value;
use std::path::Path;
use tokio::sync::Mutex;

/// Durable record of completed job steps. A step recorded here is never
/// re-executed on retry, which is what makes the final delivery step safe
/// against double-sends.
pub struct StepJournal {
    db: Mutex<Connection>,
}

impl StepJournal {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Connection::open(path)?;
        Self::init(db)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(db: Connection) -> Result<Self> {
        db.execute(
            "CREATE TABLE IF NOT EXISTS job_steps (
                job_id       TEXT NOT NULL,
                step         TEXT NOT NULL,
                output       TEXT NOT NULL,
                completed_at TEXT NOT NULL,
                PRIMARY KEY (job_id, step)
            )",
            [],
        )?;
        Ok(Self { db: Mutex::new(db) })
    }

    /// Returns the memoized output if this step already succeeded for the job.
    pub async fn recorded(&self, job_id: &str, step: &str) -> Result<Option<Value>> {
        let db = self.db.lock().await;
        let mut stmt =
            db.prepare("SELECT output FROM job_steps WHERE job_id = ?1 AND step = ?2")?;
        let mut rows = stmt.query(params![job_id, step])?;
        match rows.next()? {
            Some(row) => {
                let raw: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    pub async fn record(&self, job_id: &str, step: &str, output: &Value) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT OR REPLACE INTO job_steps (job_id, step, output, completed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                job_id,
                step,
                serde_json::to_string(output)?,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }
}
