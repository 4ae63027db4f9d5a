//! Job queue for background summarization with persistence
//!
//! Job rows live in SQLite; the broker only carries `JobMessage`s. Every
//! status or stage change is written through to the database and mirrored
//! in an in-memory progress map for live statistics.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::broker::JobBroker;
use crate::error::{Error, Result};
use crate::storage::{Database, JobCounts};
use crate::types::{Document, DocumentStatus, JobStage, JobStatus, SummaryJob};

/// Live progress of a job that has not finished yet
#[derive(Debug, Clone, Serialize)]
pub struct JobProgress {
    pub job_id: Uuid,
    pub document_id: Uuid,
    pub status: JobStatus,
    pub stage: JobStage,
    pub attempts: u32,
    pub updated_at: DateTime<Utc>,
}

impl JobProgress {
    fn from_job(job: &SummaryJob) -> Self {
        Self {
            job_id: job.id,
            document_id: job.document_id,
            status: job.status,
            stage: job.stage,
            attempts: job.attempts,
            updated_at: job.updated_at,
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    /// Broker backend name
    pub broker: String,
    /// Messages waiting in the broker
    pub pending_messages: usize,
    /// Persisted job counts per status
    pub jobs: JobCounts,
    /// Jobs tracked by this process that have not finished
    pub active: Vec<JobProgress>,
}

/// Job queue manager
pub struct JobQueue {
    /// In-flight progress, keyed by job ID
    jobs: Arc<DashMap<Uuid, JobProgress>>,
    broker: Arc<dyn JobBroker>,
    database: Arc<Database>,
}

impl JobQueue {
    /// Create a queue over a broker and the job database
    pub fn new(broker: Arc<dyn JobBroker>, database: Arc<Database>) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            broker,
            database,
        }
    }

    /// The broker messages flow through
    pub fn broker(&self) -> &Arc<dyn JobBroker> {
        &self.broker
    }

    /// Create a job for an uploaded document and push it to the broker
    pub async fn enqueue(&self, document: &Document) -> Result<SummaryJob> {
        if !document.status.can_enqueue() {
            return Err(Error::Conflict(format!(
                "Document {} is {} and cannot be queued",
                document.id,
                document.status.as_str()
            )));
        }

        // The snapshot may be stale; the database decides who queues it
        if !self.database.claim_for_queue(&document.id)? {
            return Err(Error::Conflict(format!(
                "Document {} is already queued or finished",
                document.id
            )));
        }

        let job = SummaryJob::new(document.id, &document.file_url, &document.user_id);
        if let Err(e) = self.database.create_job(&job) {
            self.database.update_document_status(
                &document.id,
                DocumentStatus::Failed,
                Some("Failed to create job"),
            )?;
            return Err(e);
        }
        self.jobs.insert(job.id, JobProgress::from_job(&job));

        if let Err(e) = self.broker.push(&job.message()).await {
            let mut job = job;
            let message = format!("Failed to queue job: {}", e);
            if let Err(mark_err) = self.mark_failed(&mut job, &message) {
                tracing::error!("Failed to record queue failure for job {}: {}", job.id, mark_err);
            }
            return Err(e);
        }

        tracing::info!(
            "Queued job {} for document {} ({}) via {}",
            job.id,
            document.id,
            document.filename,
            self.broker.name()
        );

        Ok(job)
    }

    /// Re-enqueue a document whose last job failed
    pub async fn retry(&self, document: &Document) -> Result<SummaryJob> {
        if document.status != DocumentStatus::Failed {
            return Err(Error::Conflict(format!(
                "Only failed documents can be retried (document {} is {})",
                document.id,
                document.status.as_str()
            )));
        }
        self.enqueue(document).await
    }

    /// Re-push jobs left unfinished by a previous process
    ///
    /// Jobs that were mid-processing are reset to queued. With a durable
    /// broker, still-queued jobs already have their message waiting and are
    /// left alone. Call this only before the worker starts popping, and only
    /// from the process that runs it: any `processing` row is assumed dead.
    pub async fn resume_incomplete(&self) -> Result<usize> {
        let incomplete = self.database.incomplete_jobs()?;
        let durable = self.broker.is_durable();
        let mut resumed = 0;

        for mut job in incomplete {
            let interrupted = job.status == JobStatus::Processing;
            if durable && !interrupted {
                self.jobs.insert(job.id, JobProgress::from_job(&job));
                continue;
            }

            if interrupted {
                tracing::warn!(
                    "Job {} was interrupted during {}, re-queueing",
                    job.id,
                    job.stage.as_str()
                );
                job.status = JobStatus::Queued;
                job.stage = JobStage::Queued;
                job.updated_at = Utc::now();
                self.database.update_job(&job)?;
                self.database
                    .update_document_status(&job.document_id, DocumentStatus::Queued, None)?;
            }

            self.broker.push(&job.message()).await?;
            self.jobs.insert(job.id, JobProgress::from_job(&job));
            resumed += 1;
        }

        if resumed > 0 {
            tracing::info!("Resumed {} incomplete jobs", resumed);
        }

        Ok(resumed)
    }

    /// Worker picked up the job
    pub fn mark_processing(&self, job: &mut SummaryJob) -> Result<()> {
        let now = Utc::now();
        job.status = JobStatus::Processing;
        job.stage = JobStage::Downloading;
        job.attempts += 1;
        job.error = None;
        job.started_at = Some(now);
        job.completed_at = None;
        job.updated_at = now;

        self.database.update_job(job)?;
        self.database
            .update_document_status(&job.document_id, DocumentStatus::Processing, None)?;
        self.jobs.insert(job.id, JobProgress::from_job(job));
        Ok(())
    }

    /// Move a processing job to the next stage
    pub fn update_stage(&self, job: &mut SummaryJob, stage: JobStage) -> Result<()> {
        job.stage = stage;
        job.updated_at = Utc::now();

        self.database.update_job(job)?;
        if let Some(mut progress) = self.jobs.get_mut(&job.id) {
            progress.stage = stage;
            progress.updated_at = job.updated_at;
        }
        Ok(())
    }

    /// Summary stored; job and document are done
    pub fn mark_complete(&self, job: &mut SummaryJob) -> Result<()> {
        let now = Utc::now();
        job.status = JobStatus::Complete;
        job.stage = JobStage::Complete;
        job.error = None;
        job.completed_at = Some(now);
        job.updated_at = now;

        self.jobs.remove(&job.id);
        self.database.update_job(job)?;
        self.database
            .update_document_status(&job.document_id, DocumentStatus::Completed, None)?;
        Ok(())
    }

    /// Record a failure on both the job and its document
    pub fn mark_failed(&self, job: &mut SummaryJob, error: &str) -> Result<()> {
        let now = Utc::now();
        job.status = JobStatus::Failed;
        job.stage = JobStage::Failed;
        job.error = Some(error.to_string());
        job.completed_at = Some(now);
        job.updated_at = now;

        self.jobs.remove(&job.id);
        self.database.update_job(job)?;
        self.database
            .update_document_status(&job.document_id, DocumentStatus::Failed, Some(error))?;
        Ok(())
    }

    /// Live progress for a job tracked by this process
    pub fn progress(&self, job_id: &Uuid) -> Option<JobProgress> {
        self.jobs.get(job_id).map(|p| p.clone())
    }

    /// Drop progress entries for a deleted document
    pub fn forget_document(&self, document_id: &Uuid) {
        self.jobs.retain(|_, p| p.document_id != *document_id);
    }

    /// Get queue statistics
    pub async fn stats(&self) -> Result<QueueStats> {
        let jobs = self.database.job_counts()?;
        let pending_messages = self.broker.len().await?;

        let mut active: Vec<JobProgress> = self.jobs.iter().map(|p| p.clone()).collect();
        active.sort_by_key(|p| p.updated_at);

        Ok(QueueStats {
            broker: self.broker.name().to_string(),
            pending_messages,
            jobs,
            active,
        })
    }
}
