//! Background worker that turns queued jobs into stored summaries

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

use crate::config::{ProcessingConfig, QueueConfig};
use crate::error::{Error, Result};
use crate::extraction::TextExtractor;
use crate::storage::Database;
use crate::summarization::Summarizer;
use crate::types::{Document, JobMessage, JobStage, Summary, SummaryJob};

use super::fetch::FileFetcher;
use super::job_queue::JobQueue;

/// Single-concurrency summary worker
///
/// Pops one message at a time; the next job is not started until the
/// current one has completed, failed or timed out.
pub struct SummaryWorker {
    queue: Arc<JobQueue>,
    database: Arc<Database>,
    fetcher: Arc<FileFetcher>,
    extractor: Arc<dyn TextExtractor>,
    summarizer: Arc<Summarizer>,
    job_timeout: Duration,
    poll_interval: Duration,
}

impl SummaryWorker {
    /// Create a new summary worker
    pub fn new(
        queue: Arc<JobQueue>,
        database: Arc<Database>,
        fetcher: Arc<FileFetcher>,
        extractor: Arc<dyn TextExtractor>,
        summarizer: Arc<Summarizer>,
        processing: &ProcessingConfig,
        queue_config: &QueueConfig,
    ) -> Self {
        Self {
            queue,
            database,
            fetcher,
            extractor,
            summarizer,
            job_timeout: Duration::from_secs(processing.job_timeout_secs),
            poll_interval: Duration::from_secs(queue_config.poll_interval_secs.max(1)),
        }
    }

    /// Override how long a pop blocks before shutdown is re-checked
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Override the per-job time limit
    pub fn with_job_timeout(mut self, job_timeout: Duration) -> Self {
        self.job_timeout = job_timeout;
        self
    }

    /// Process jobs until `shutdown` flips to `true`
    ///
    /// A job in progress is allowed to finish (bounded by the job timeout).
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Summary worker started: broker={}, extractor={}, provider={}, {}s job timeout",
            self.queue.broker().name(),
            self.extractor.name(),
            self.summarizer.provider().name(),
            self.job_timeout.as_secs()
        );

        while !*shutdown.borrow() {
            if let Err(e) = self.run_once(self.poll_interval).await {
                tracing::error!("Failed to receive job: {}", e);
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        tracing::info!("Summary worker stopped");
    }

    /// Pop and process at most one message; `Ok(false)` when none arrived
    pub async fn run_once(&self, wait: Duration) -> Result<bool> {
        match self.queue.broker().pop(wait).await? {
            Some(message) => {
                self.handle_message(message).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn handle_message(&self, message: JobMessage) {
        let mut job = match self.database.get_job(&message.job_id) {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::warn!("Skipping message for unknown job {}", message.job_id);
                return;
            }
            Err(e) => {
                tracing::error!("Failed to load job {}: {}", message.job_id, e);
                return;
            }
        };

        if job.status.is_terminal() {
            tracing::info!(
                "Skipping job {}: already {}",
                job.id,
                job.status.as_str()
            );
            return;
        }

        let document = match self.database.get_document(&job.document_id) {
            Ok(Some(document)) => document,
            Ok(None) => {
                tracing::warn!("Skipping job {}: document {} was deleted", job.id, job.document_id);
                return;
            }
            Err(e) => {
                tracing::error!("Failed to load document {}: {}", job.document_id, e);
                return;
            }
        };

        tracing::info!(
            "Processing job {} for document {} ({})",
            job.id,
            document.id,
            document.filename
        );

        if let Err(e) = self.queue.mark_processing(&mut job) {
            tracing::error!("Failed to mark job {} as processing: {}", job.id, e);
            return;
        }

        let outcome = timeout(self.job_timeout, self.process(&mut job, &document)).await;

        let failure = match outcome {
            Ok(Ok(summary)) => {
                match self.queue.mark_complete(&mut job) {
                    Ok(()) => tracing::info!(
                        "Job {} complete: {} chars summarized in {} section(s), {}ms",
                        job.id,
                        summary.input_chars,
                        summary.chunk_count,
                        job.duration_ms().unwrap_or_default()
                    ),
                    Err(e) => tracing::error!("Failed to mark job {} complete: {}", job.id, e),
                }
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => {
                tracing::error!(
                    "TIMEOUT: job {} ({}) exceeded {}s during {}",
                    job.id,
                    document.filename,
                    self.job_timeout.as_secs(),
                    job.stage.as_str()
                );
                format!(
                    "Timed out after {}s while {}",
                    self.job_timeout.as_secs(),
                    job.stage.as_str()
                )
            }
        };

        tracing::error!("Job {} failed: {}", job.id, failure);
        if let Err(e) = self.queue.mark_failed(&mut job, &failure) {
            tracing::error!("Failed to mark job {} as failed: {}", job.id, e);
        }
    }

    async fn process(&self, job: &mut SummaryJob, document: &Document) -> Result<Summary> {
        self.queue.update_stage(job, JobStage::Downloading)?;
        let data = self.fetcher.fetch(&job.file_url).await?;

        self.queue.update_stage(job, JobStage::Extracting)?;
        let extractor = self.extractor.clone();
        let filename = document.filename.clone();
        let extracted = tokio::task::spawn_blocking(move || extractor.extract(&filename, &data))
            .await
            .map_err(|e| Error::internal(format!("Extraction task failed: {}", e)))??;

        if let Some(pages) = extracted.page_count {
            self.database.set_page_count(&document.id, pages)?;
        }
        tracing::debug!(
            "Extracted {} chars from {} ({:?} pages)",
            extracted.text.len(),
            document.filename,
            extracted.page_count
        );

        self.queue.update_stage(job, JobStage::Summarizing)?;
        let output = self
            .summarizer
            .summarize(&document.filename, &extracted.text)
            .await?;

        self.queue.update_stage(job, JobStage::Storing)?;
        let summary = Summary::new(
            document.id,
            output.content,
            output.model,
            output.provider,
            output.input_chars,
            output.chunk_count,
        );
        self.database.upsert_summary(&summary)?;

        Ok(summary)
    }
}
