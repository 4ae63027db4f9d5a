//! SQLite database for documents, summary jobs and summaries

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{Document, DocumentStatus, JobStage, JobStatus, Summary, SummaryJob};

const DOCUMENT_COLUMNS: &str = "id, user_id, filename, content_type, file_key, file_url, \
     size_bytes, status, page_count, error, created_at, updated_at";

const JOB_COLUMNS: &str = "id, document_id, file_url, user_id, status, stage, attempts, \
     error, created_at, updated_at, started_at, completed_at";

const SUMMARY_COLUMNS: &str =
    "id, document_id, content, model, provider, input_chars, chunk_count, created_at";

/// SQLite-backed store for the service's relational state
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::Database(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Create tables if they do not exist
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
            PRAGMA temp_store=MEMORY;
        "#).map_err(|e| Error::Database(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                content_type TEXT NOT NULL,
                file_key TEXT NOT NULL,
                file_url TEXT NOT NULL,
                size_bytes INTEGER,
                status TEXT NOT NULL,
                page_count INTEGER,
                error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_user ON documents(user_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_documents_file_key ON documents(file_key);

            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                file_url TEXT NOT NULL,
                user_id TEXT NOT NULL,
                status TEXT NOT NULL,
                stage TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            CREATE INDEX IF NOT EXISTS idx_jobs_document ON jobs(document_id, created_at);

            CREATE TABLE IF NOT EXISTS summaries (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL UNIQUE,
                content TEXT NOT NULL,
                model TEXT NOT NULL,
                provider TEXT NOT NULL,
                input_chars INTEGER NOT NULL,
                chunk_count INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
            );
        "#)
        .map_err(|e| Error::Database(format!("Failed to run migrations: {}", e)))?;

        tracing::debug!("Database schema ready");
        Ok(())
    }

    /// Cheap connectivity check
    pub fn health_check(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|e| Error::Database(format!("Health check failed: {}", e)))
    }

    // ==================== Documents ====================

    /// Insert a new document
    pub fn create_document(&self, doc: &Document) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            &format!(
                "INSERT INTO documents ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                DOCUMENT_COLUMNS
            ),
            params![
                doc.id.to_string(),
                doc.user_id,
                doc.filename,
                doc.content_type,
                doc.file_key,
                doc.file_url,
                doc.size_bytes.map(|s| s as i64),
                doc.status.as_str(),
                doc.page_count.map(|p| p as i64),
                doc.error,
                doc.created_at.to_rfc3339(),
                doc.updated_at.to_rfc3339(),
            ],
        ).map_err(|e| Error::Database(format!("Failed to create document: {}", e)))?;

        Ok(())
    }

    /// Get a document by ID
    pub fn get_document(&self, id: &Uuid) -> Result<Option<Document>> {
        let conn = self.conn.lock();

        conn.query_row(
            &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
            params![id.to_string()],
            row_to_document,
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get document: {}", e)))
    }

    /// Get the document that owns an object key
    pub fn get_document_by_file_key(&self, file_key: &str) -> Result<Option<Document>> {
        let conn = self.conn.lock();

        conn.query_row(
            &format!("SELECT {} FROM documents WHERE file_key = ?1", DOCUMENT_COLUMNS),
            params![file_key],
            row_to_document,
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get document: {}", e)))
    }

    /// Get a document only if it belongs to `user_id`
    pub fn get_document_for_user(&self, id: &Uuid, user_id: &str) -> Result<Option<Document>> {
        let conn = self.conn.lock();

        conn.query_row(
            &format!(
                "SELECT {} FROM documents WHERE id = ?1 AND user_id = ?2",
                DOCUMENT_COLUMNS
            ),
            params![id.to_string(), user_id],
            row_to_document,
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get document: {}", e)))
    }

    /// List a user's documents, newest first
    pub fn list_documents_for_user(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Document>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM documents WHERE user_id = ?1 \
             ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
            DOCUMENT_COLUMNS
        )).map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;

        let documents = stmt
            .query_map(params![user_id, limit as i64, offset as i64], row_to_document)
            .map_err(|e| Error::Database(format!("Failed to list documents: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(documents)
    }

    /// Count a user's documents
    pub fn count_documents_for_user(&self, user_id: &str) -> Result<usize> {
        let conn = self.conn.lock();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("Failed to count documents: {}", e)))?;

        Ok(count as usize)
    }

    /// Update a document's status and error message
    pub fn update_document_status(
        &self,
        id: &Uuid,
        status: DocumentStatus,
        error: Option<&str>,
    ) -> Result<bool> {
        let conn = self.conn.lock();

        let count = conn.execute(
            "UPDATE documents SET status = ?2, error = ?3, updated_at = ?4 WHERE id = ?1",
            params![id.to_string(), status.as_str(), error, Utc::now().to_rfc3339()],
        ).map_err(|e| Error::Database(format!("Failed to update document status: {}", e)))?;

        Ok(count > 0)
    }

    /// Move a document to `queued` if it is awaiting upload or failed
    ///
    /// Returns `false` when the document is missing or in any other state, so
    /// only one caller can win the transition.
    pub fn claim_for_queue(&self, id: &Uuid) -> Result<bool> {
        let conn = self.conn.lock();

        let count = conn.execute(
            "UPDATE documents SET status = 'queued', error = NULL, updated_at = ?2
             WHERE id = ?1 AND status IN ('awaiting_upload', 'failed')",
            params![id.to_string(), Utc::now().to_rfc3339()],
        ).map_err(|e| Error::Database(format!("Failed to queue document: {}", e)))?;

        Ok(count > 0)
    }

    /// Record the confirmed upload size
    pub fn set_document_upload(&self, id: &Uuid, size_bytes: u64) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "UPDATE documents SET size_bytes = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), size_bytes as i64, Utc::now().to_rfc3339()],
        ).map_err(|e| Error::Database(format!("Failed to record upload: {}", e)))?;

        Ok(())
    }

    /// Record the extracted page count
    pub fn set_page_count(&self, id: &Uuid, page_count: u32) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "UPDATE documents SET page_count = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), page_count as i64, Utc::now().to_rfc3339()],
        ).map_err(|e| Error::Database(format!("Failed to record page count: {}", e)))?;

        Ok(())
    }

    /// Delete a document together with its jobs and summary
    pub fn delete_document(&self, id: &Uuid) -> Result<bool> {
        let conn = self.conn.lock();

        let count = conn.execute(
            "DELETE FROM documents WHERE id = ?1",
            params![id.to_string()],
        ).map_err(|e| Error::Database(format!("Failed to delete document: {}", e)))?;

        Ok(count > 0)
    }

    // ==================== Jobs ====================

    /// Insert a new job
    pub fn create_job(&self, job: &SummaryJob) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            &format!(
                "INSERT INTO jobs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                JOB_COLUMNS
            ),
            params![
                job.id.to_string(),
                job.document_id.to_string(),
                job.file_url,
                job.user_id,
                job.status.as_str(),
                job.stage.as_str(),
                job.attempts as i64,
                job.error,
                job.created_at.to_rfc3339(),
                job.updated_at.to_rfc3339(),
                job.started_at.map(|t| t.to_rfc3339()),
                job.completed_at.map(|t| t.to_rfc3339()),
            ],
        ).map_err(|e| Error::Database(format!("Failed to create job: {}", e)))?;

        Ok(())
    }

    /// Persist a job's mutable fields
    pub fn update_job(&self, job: &SummaryJob) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            UPDATE jobs SET
                status = ?2,
                stage = ?3,
                attempts = ?4,
                error = ?5,
                updated_at = ?6,
                started_at = ?7,
                completed_at = ?8
            WHERE id = ?1
            "#,
            params![
                job.id.to_string(),
                job.status.as_str(),
                job.stage.as_str(),
                job.attempts as i64,
                job.error,
                job.updated_at.to_rfc3339(),
                job.started_at.map(|t| t.to_rfc3339()),
                job.completed_at.map(|t| t.to_rfc3339()),
            ],
        ).map_err(|e| Error::Database(format!("Failed to update job: {}", e)))?;

        Ok(())
    }

    /// Get a job by ID
    pub fn get_job(&self, id: &Uuid) -> Result<Option<SummaryJob>> {
        let conn = self.conn.lock();

        conn.query_row(
            &format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS),
            params![id.to_string()],
            row_to_job,
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get job: {}", e)))
    }

    /// Most recent job for a document
    pub fn latest_job_for_document(&self, document_id: &Uuid) -> Result<Option<SummaryJob>> {
        let conn = self.conn.lock();

        conn.query_row(
            &format!(
                "SELECT {} FROM jobs WHERE document_id = ?1 \
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                JOB_COLUMNS
            ),
            params![document_id.to_string()],
            row_to_job,
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get latest job: {}", e)))
    }

    /// Jobs left queued or processing (for resuming on startup), oldest first
    pub fn incomplete_jobs(&self) -> Result<Vec<SummaryJob>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM jobs WHERE status IN ('queued', 'processing') ORDER BY created_at ASC",
            JOB_COLUMNS
        )).map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;

        let jobs = stmt
            .query_map([], row_to_job)
            .map_err(|e| Error::Database(format!("Failed to list incomplete jobs: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(jobs)
    }

    /// Job counts per status
    pub fn job_counts(&self) -> Result<JobCounts> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")
            .map_err(|e| Error::Database(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| Error::Database(format!("Failed to count jobs: {}", e)))?;

        let mut counts = JobCounts::default();
        for (status, count) in rows.filter_map(|r| r.ok()) {
            let count = count as usize;
            match JobStatus::parse(&status) {
                JobStatus::Queued => counts.queued += count,
                JobStatus::Processing => counts.processing += count,
                JobStatus::Complete => counts.complete += count,
                JobStatus::Failed => counts.failed += count,
            }
        }

        Ok(counts)
    }

    /// Delete finished jobs older than `days_to_keep`
    pub fn cleanup_old_jobs(&self, days_to_keep: i64) -> Result<usize> {
        let conn = self.conn.lock();

        let cutoff = (Utc::now() - chrono::Duration::days(days_to_keep)).to_rfc3339();

        let count = conn.execute(
            "DELETE FROM jobs WHERE status IN ('complete', 'failed') AND created_at < ?1",
            params![cutoff],
        ).map_err(|e| Error::Database(format!("Failed to cleanup jobs: {}", e)))?;

        Ok(count)
    }

    // ==================== Summaries ====================

    /// Insert or replace the summary for a document
    pub fn upsert_summary(&self, summary: &Summary) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            &format!(
                "INSERT INTO summaries ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(document_id) DO UPDATE SET
                    id = excluded.id,
                    content = excluded.content,
                    model = excluded.model,
                    provider = excluded.provider,
                    input_chars = excluded.input_chars,
                    chunk_count = excluded.chunk_count,
                    created_at = excluded.created_at",
                SUMMARY_COLUMNS
            ),
            params![
                summary.id.to_string(),
                summary.document_id.to_string(),
                summary.content,
                summary.model,
                summary.provider,
                summary.input_chars as i64,
                summary.chunk_count as i64,
                summary.created_at.to_rfc3339(),
            ],
        ).map_err(|e| Error::Database(format!("Failed to store summary: {}", e)))?;

        Ok(())
    }

    /// Get the summary for a document
    pub fn get_summary(&self, document_id: &Uuid) -> Result<Option<Summary>> {
        let conn = self.conn.lock();

        conn.query_row(
            &format!("SELECT {} FROM summaries WHERE document_id = ?1", SUMMARY_COLUMNS),
            params![document_id.to_string()],
            row_to_summary,
        )
        .optional()
        .map_err(|e| Error::Database(format!("Failed to get summary: {}", e)))
    }
}

/// Job counts per status
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct JobCounts {
    pub queued: usize,
    pub processing: usize,
    pub complete: usize,
    pub failed: usize,
}

impl JobCounts {
    pub fn total(&self) -> usize {
        self.queued + self.processing + self.complete + self.failed
    }
}

fn parse_uuid(s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_optional_timestamp(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|d| d.with_timezone(&Utc))
            .ok()
    })
}

fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
    let id: String = row.get(0)?;
    let size_bytes: Option<i64> = row.get(6)?;
    let status: String = row.get(7)?;
    let page_count: Option<i64> = row.get(8)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(Document {
        id: parse_uuid(&id)?,
        user_id: row.get(1)?,
        filename: row.get(2)?,
        content_type: row.get(3)?,
        file_key: row.get(4)?,
        file_url: row.get(5)?,
        size_bytes: size_bytes.map(|s| s as u64),
        status: DocumentStatus::parse(&status),
        page_count: page_count.map(|p| p as u32),
        error: row.get(9)?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<SummaryJob> {
    let id: String = row.get(0)?;
    let document_id: String = row.get(1)?;
    let status: String = row.get(4)?;
    let stage: String = row.get(5)?;
    let attempts: i64 = row.get(6)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    Ok(SummaryJob {
        id: parse_uuid(&id)?,
        document_id: parse_uuid(&document_id)?,
        file_url: row.get(2)?,
        user_id: row.get(3)?,
        status: JobStatus::parse(&status),
        stage: JobStage::parse(&stage),
        attempts: attempts as u32,
        error: row.get(7)?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
        started_at: parse_optional_timestamp(row.get(10)?),
        completed_at: parse_optional_timestamp(row.get(11)?),
    })
}

fn row_to_summary(row: &rusqlite::Row) -> rusqlite::Result<Summary> {
    let id: String = row.get(0)?;
    let document_id: String = row.get(1)?;
    let input_chars: i64 = row.get(5)?;
    let chunk_count: i64 = row.get(6)?;
    let created_at: String = row.get(7)?;

    Ok(Summary {
        id: parse_uuid(&id)?,
        document_id: parse_uuid(&document_id)?,
        content: row.get(2)?,
        model: row.get(3)?,
        provider: row.get(4)?,
        input_chars: input_chars as usize,
        chunk_count: chunk_count as usize,
        created_at: parse_timestamp(&created_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(user: &str) -> Document {
        let id = Uuid::new_v4();
        Document::new(
            id,
            user,
            "report.pdf",
            "application/pdf",
            format!("uploads/{}/{}/report.pdf", user, id),
            format!("local://uploads/{}/{}/report.pdf", user, id),
        )
    }

    #[test]
    fn test_document_crud() {
        let db = Database::in_memory().unwrap();
        let doc = document("alice");
        db.create_document(&doc).unwrap();

        let fetched = db.get_document(&doc.id).unwrap().unwrap();
        assert_eq!(fetched.filename, "report.pdf");
        assert_eq!(fetched.status, DocumentStatus::AwaitingUpload);

        assert!(db.get_document_for_user(&doc.id, "alice").unwrap().is_some());
        assert_eq!(
            db.get_document_by_file_key(&doc.file_key).unwrap().unwrap().id,
            doc.id
        );
        assert!(db.get_document_for_user(&doc.id, "mallory").unwrap().is_none());

        db.set_document_upload(&doc.id, 1234).unwrap();
        db.set_page_count(&doc.id, 7).unwrap();
        db.update_document_status(&doc.id, DocumentStatus::Failed, Some("boom")).unwrap();

        let fetched = db.get_document(&doc.id).unwrap().unwrap();
        assert_eq!(fetched.size_bytes, Some(1234));
        assert_eq!(fetched.page_count, Some(7));
        assert_eq!(fetched.status, DocumentStatus::Failed);
        assert_eq!(fetched.error.as_deref(), Some("boom"));

        assert!(db.delete_document(&doc.id).unwrap());
        assert!(db.get_document(&doc.id).unwrap().is_none());
    }

    #[test]
    fn test_claim_for_queue_wins_once() {
        let db = Database::in_memory().unwrap();
        let doc = document("alice");
        db.create_document(&doc).unwrap();

        assert!(db.claim_for_queue(&doc.id).unwrap());
        assert!(!db.claim_for_queue(&doc.id).unwrap());

        db.update_document_status(&doc.id, DocumentStatus::Failed, Some("boom")).unwrap();
        assert!(db.claim_for_queue(&doc.id).unwrap());
        let fetched = db.get_document(&doc.id).unwrap().unwrap();
        assert_eq!(fetched.status, DocumentStatus::Queued);
        assert!(fetched.error.is_none());

        assert!(!db.claim_for_queue(&Uuid::new_v4()).unwrap());
    }

    #[test]
    fn test_list_documents_is_scoped_to_user() {
        let db = Database::in_memory().unwrap();
        for _ in 0..3 {
            db.create_document(&document("alice")).unwrap();
        }
        db.create_document(&document("bob")).unwrap();

        assert_eq!(db.list_documents_for_user("alice", 10, 0).unwrap().len(), 3);
        assert_eq!(db.list_documents_for_user("alice", 2, 0).unwrap().len(), 2);
        assert_eq!(db.list_documents_for_user("alice", 10, 2).unwrap().len(), 1);
        assert_eq!(db.count_documents_for_user("bob").unwrap(), 1);
    }

    #[test]
    fn test_job_lifecycle() {
        let db = Database::in_memory().unwrap();
        let doc = document("alice");
        db.create_document(&doc).unwrap();

        let mut job = SummaryJob::new(doc.id, &doc.file_url, "alice");
        db.create_job(&job).unwrap();
        assert_eq!(db.incomplete_jobs().unwrap().len(), 1);

        job.status = JobStatus::Processing;
        job.stage = JobStage::Summarizing;
        job.attempts = 1;
        job.started_at = Some(Utc::now());
        db.update_job(&job).unwrap();

        let fetched = db.get_job(&job.id).unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Processing);
        assert_eq!(fetched.stage, JobStage::Summarizing);
        assert_eq!(fetched.attempts, 1);
        assert!(fetched.started_at.is_some());

        job.status = JobStatus::Complete;
        job.stage = JobStage::Complete;
        job.completed_at = Some(Utc::now());
        db.update_job(&job).unwrap();

        assert!(db.incomplete_jobs().unwrap().is_empty());
        let counts = db.job_counts().unwrap();
        assert_eq!(counts.complete, 1);
        assert_eq!(counts.total(), 1);
        assert_eq!(db.latest_job_for_document(&doc.id).unwrap().unwrap().id, job.id);
    }

    #[test]
    fn test_summary_upsert_replaces() {
        let db = Database::in_memory().unwrap();
        let doc = document("alice");
        db.create_document(&doc).unwrap();

        db.upsert_summary(&Summary::new(doc.id, "first".into(), "m", "ollama", 10, 1)).unwrap();
        db.upsert_summary(&Summary::new(doc.id, "second".into(), "m", "ollama", 20, 2)).unwrap();

        let summary = db.get_summary(&doc.id).unwrap().unwrap();
        assert_eq!(summary.content, "second");
        assert_eq!(summary.chunk_count, 2);
    }

    #[test]
    fn test_delete_cascades() {
        let db = Database::in_memory().unwrap();
        let doc = document("alice");
        db.create_document(&doc).unwrap();
        let job = SummaryJob::new(doc.id, &doc.file_url, "alice");
        db.create_job(&job).unwrap();
        db.upsert_summary(&Summary::new(doc.id, "text".into(), "m", "ollama", 4, 1)).unwrap();

        db.delete_document(&doc.id).unwrap();

        assert!(db.get_job(&job.id).unwrap().is_none());
        assert!(db.get_summary(&doc.id).unwrap().is_none());
    }

    #[test]
    fn test_cleanup_keeps_recent_jobs() {
        let db = Database::in_memory().unwrap();
        let doc = document("alice");
        db.create_document(&doc).unwrap();

        let mut job = SummaryJob::new(doc.id, &doc.file_url, "alice");
        job.status = JobStatus::Complete;
        db.create_job(&job).unwrap();

        assert_eq!(db.cleanup_old_jobs(30).unwrap(), 0);
        assert_eq!(db.cleanup_old_jobs(-1).unwrap(), 1);
    }
}
