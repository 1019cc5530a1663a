use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use rusqlite::{Connection, params};

use super::models::{EvaluationRecord, StoredEvaluation};

/// Async-safe handle to the evaluation store.
///
/// All access runs on tokio's blocking pool so SQLite I/O never stalls
/// the request workers.
#[derive(Clone)]
pub struct ResultStore {
    inner: Arc<std::sync::Mutex<EvaluationDb>>,
}

impl ResultStore {
    pub fn new(db: EvaluationDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(EvaluationDb::new(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(EvaluationDb::new_in_memory()?))
    }

    /// Run a closure with access to the database on a blocking thread.
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&EvaluationDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    pub async fn insert(&self, record: EvaluationRecord) -> Result<i64> {
        self.call(move |db| db.insert(&record)).await
    }

    pub async fn list(&self) -> Result<Vec<StoredEvaluation>> {
        self.call(|db| db.list()).await
    }
}

pub struct EvaluationDb {
    conn: Connection,
}

impl EvaluationDb {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.run_migrations().context("Failed to run migrations")?;
        Ok(db)
    }

    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.run_migrations().context("Failed to run migrations")?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS evaluations (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT,
                    repo_url TEXT NOT NULL,
                    pages_url TEXT,
                    brief TEXT,
                    results_json TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                ",
            )
            .context("Failed to create evaluations table")?;
        Ok(())
    }

    pub fn insert(&self, record: &EvaluationRecord) -> Result<i64> {
        let results_json =
            serde_json::to_string(&record.results).context("Failed to encode results")?;
        // Fixed-width UTC timestamps sort lexically in time order.
        let created_at = record
            .created_at
            .to_rfc3339_opts(SecondsFormat::Micros, true);
        self.conn
            .execute(
                "INSERT INTO evaluations (email, repo_url, pages_url, brief, results_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.email,
                    record.repo_url,
                    record.pages_url,
                    record.brief,
                    results_json,
                    created_at
                ],
            )
            .context("Failed to insert evaluation")?;
        Ok(self.conn.last_insert_rowid())
    }

    /// All evaluations, newest first.
    pub fn list(&self) -> Result<Vec<StoredEvaluation>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, email, repo_url, pages_url, results_json, created_at
                 FROM evaluations ORDER BY created_at DESC, id DESC",
            )
            .context("Failed to prepare list")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StoredEvaluation {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    repo_url: row.get(2)?,
                    pages_url: row.get(3)?,
                    results_json: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })
            .context("Failed to query evaluations")?;
        let mut evaluations = Vec::new();
        for row in rows {
            evaluations.push(row.context("Failed to read evaluation row")?);
        }
        Ok(evaluations)
    }

    pub fn count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM evaluations", [], |row| row.get(0))
            .context("Failed to count evaluations")
    }
}
