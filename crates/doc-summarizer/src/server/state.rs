//! Application state for the summarization server

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{BrokerBackend, LlmBackend, StorageBackend, SummarizerConfig};
use crate::error::{Error, Result};
use crate::extraction::{PdfTextExtractor, TextExtractor};
use crate::processing::{ChannelBroker, FileFetcher, JobBroker, JobQueue, SummaryWorker};
use crate::providers::{LocalObjectStore, ObjectStore, OllamaSummarizer, SummaryProvider};
use crate::storage::Database;
use crate::summarization::Summarizer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: SummarizerConfig,
    /// Documents, jobs and summaries
    database: Arc<Database>,
    /// Where uploaded files live
    object_store: Arc<dyn ObjectStore>,
    /// Set when uploads are served by this process (`PUT /api/uploads/*key`)
    local_store: Option<Arc<LocalObjectStore>>,
    /// Job queue over the configured broker
    job_queue: Arc<JobQueue>,
    /// Summarization pipeline
    summarizer: Arc<Summarizer>,
    /// Text extractor
    extractor: Arc<dyn TextExtractor>,
    /// Downloads job files for the worker
    fetcher: Arc<FileFetcher>,
}

/// Pre-built backends for `AppState::from_parts`
pub struct Backends {
    pub database: Arc<Database>,
    pub object_store: Arc<dyn ObjectStore>,
    pub local_store: Option<Arc<LocalObjectStore>>,
    pub broker: Arc<dyn JobBroker>,
    pub provider: Arc<dyn SummaryProvider>,
    pub extractor: Arc<dyn TextExtractor>,
}

impl AppState {
    /// Create application state, connecting every configured backend
    pub async fn new(config: SummarizerConfig) -> Result<Self> {
        tracing::info!(
            "Initializing application state (storage: {:?}, broker: {:?}, llm: {:?})...",
            config.storage.backend,
            config.queue.broker,
            config.llm.backend
        );

        let database = Arc::new(Database::new(&config.database.path)?);
        tracing::info!("Database opened at {}", config.database.path.display());

        let (object_store, local_store) = Self::build_object_store(&config).await?;
        tracing::info!("Object store initialized ({})", object_store.name());

        let broker = Self::build_broker(&config)?;
        tracing::info!("Job broker initialized ({})", broker.name());

        let provider = Self::build_provider(&config)?;
        tracing::info!(
            "Summary provider initialized ({}, model {})",
            provider.name(),
            provider.model()
        );

        let extractor: Arc<dyn TextExtractor> = Arc::new(PdfTextExtractor::new(
            Duration::from_secs(config.processing.extraction_timeout_secs),
        ));

        Self::from_parts(
            config,
            Backends {
                database,
                object_store,
                local_store,
                broker,
                provider,
                extractor,
            },
        )
    }

    /// Create application state from already constructed backends
    pub fn from_parts(config: SummarizerConfig, backends: Backends) -> Result<Self> {
        let job_queue = Arc::new(JobQueue::new(backends.broker, backends.database.clone()));
        let summarizer = Arc::new(Summarizer::new(backends.provider, &config.processing));
        let fetcher = Arc::new(FileFetcher::new(
            backends.object_store.clone(),
            Duration::from_secs(config.processing.download_timeout_secs),
            config.server.max_upload_size,
        )?);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                database: backends.database,
                object_store: backends.object_store,
                local_store: backends.local_store,
                job_queue,
                summarizer,
                extractor: backends.extractor,
                fetcher,
            }),
        })
    }

    async fn build_object_store(
        config: &SummarizerConfig,
    ) -> Result<(Arc<dyn ObjectStore>, Option<Arc<LocalObjectStore>>)> {
        match config.storage.backend {
            StorageBackend::Local => {
                let store = Arc::new(LocalObjectStore::new(
                    config.storage.local_root.clone(),
                    config.public_url(),
                    &config.storage.signing_secret,
                )?);
                let object_store: Arc<dyn ObjectStore> = store.clone();
                Ok((object_store, Some(store)))
            }
            StorageBackend::Gcs => {
                #[cfg(feature = "gcp")]
                {
                    use crate::providers::gcp::GcsObjectStore;

                    let gcp = config.gcp.as_ref().ok_or_else(|| {
                        Error::Config("GCS storage selected but gcp config is missing".to_string())
                    })?;
                    let store = GcsObjectStore::new(
                        &gcp.service_account_key_path,
                        gcp.gcs_bucket.clone(),
                        gcp.gcs_prefix.clone(),
                    )
                    .await?;
                    let object_store: Arc<dyn ObjectStore> = Arc::new(store);
                    Ok((object_store, None))
                }
                #[cfg(not(feature = "gcp"))]
                {
                    Err(Error::Config(
                        "GCS storage selected but gcp feature is not enabled. \
                         Rebuild with --features gcp"
                            .to_string(),
                    ))
                }
            }
        }
    }

    fn build_broker(config: &SummarizerConfig) -> Result<Arc<dyn JobBroker>> {
        match config.queue.broker {
            BrokerBackend::Channel => Ok(Arc::new(ChannelBroker::new(config.queue.capacity))),
            BrokerBackend::Redis => {
                #[cfg(feature = "redis")]
                {
                    let url = config.queue.redis_url.as_deref().ok_or_else(|| {
                        Error::Config("Redis broker selected but queue.redis_url is missing".to_string())
                    })?;
                    Ok(Arc::new(crate::processing::RedisBroker::new(
                        url,
                        config.queue.queue_name.clone(),
                    )?))
                }
                #[cfg(not(feature = "redis"))]
                {
                    Err(Error::Config(
                        "Redis broker selected but redis feature is not enabled. \
                         Rebuild with --features redis"
                            .to_string(),
                    ))
                }
            }
        }
    }

    fn build_provider(config: &SummarizerConfig) -> Result<Arc<dyn SummaryProvider>> {
        match config.llm.backend {
            LlmBackend::Ollama => Ok(Arc::new(OllamaSummarizer::new(&config.llm)?)),
            LlmBackend::Gemini => {
                #[cfg(feature = "gcp")]
                {
                    use crate::providers::gcp::{GcpAuth, GeminiSummarizer};

                    let gcp = config.gcp.as_ref().ok_or_else(|| {
                        Error::Config("Gemini selected but gcp config is missing".to_string())
                    })?;
                    let auth = Arc::new(GcpAuth::from_service_account(
                        &gcp.service_account_key_path,
                        gcp.project_id.clone(),
                    )?);
                    Ok(Arc::new(GeminiSummarizer::new(
                        auth,
                        gcp.location.clone(),
                        gcp.generation_model.clone(),
                        &config.llm,
                    )?))
                }
                #[cfg(not(feature = "gcp"))]
                {
                    Err(Error::Config(
                        "Gemini selected but gcp feature is not enabled. \
                         Rebuild with --features gcp"
                            .to_string(),
                    ))
                }
            }
        }
    }

    /// Start the background summary worker
    ///
    /// Jobs left unfinished by a previous worker are re-queued first, before
    /// the new worker can pop anything. Only the process that owns the worker
    /// may do this; an API-only process must never call it.
    pub async fn start_worker(&self, shutdown: watch::Receiver<bool>) -> Result<JoinHandle<()>> {
        self.inner.job_queue.resume_incomplete().await?;

        let config = &self.inner.config;
        let worker = SummaryWorker::new(
            self.inner.job_queue.clone(),
            self.inner.database.clone(),
            self.inner.fetcher.clone(),
            self.inner.extractor.clone(),
            self.inner.summarizer.clone(),
            &config.processing,
            &config.queue,
        );
        Ok(tokio::spawn(worker.run(shutdown)))
    }

    /// Get configuration
    pub fn config(&self) -> &SummarizerConfig {
        &self.inner.config
    }

    /// Get database
    pub fn database(&self) -> &Arc<Database> {
        &self.inner.database
    }

    /// Get object store
    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.inner.object_store
    }

    /// Local store accepting signed uploads, if uploads go through this process
    pub fn local_store(&self) -> Option<&Arc<LocalObjectStore>> {
        self.inner.local_store.as_ref()
    }

    /// Get job queue
    pub fn job_queue(&self) -> &Arc<JobQueue> {
        &self.inner.job_queue
    }

    /// Get summarizer
    pub fn summarizer(&self) -> &Arc<Summarizer> {
        &self.inner.summarizer
    }

    /// Pre-signed upload URL lifetime
    pub fn upload_ttl(&self) -> Duration {
        Duration::from_secs(self.inner.config.storage.upload_url_ttl_secs)
    }
}
