//! Configuration for the summarization service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Relational database configuration
    pub database: DatabaseConfig,
    /// Object storage configuration
    pub storage: StorageConfig,
    /// Job queue / broker configuration
    pub queue: QueueConfig,
    /// Summarization LLM configuration
    pub llm: LlmConfig,
    /// Worker processing limits
    pub processing: ProcessingConfig,
    /// GCP configuration (required when storage or llm backend is GCP)
    pub gcp: Option<GcpConfig>,
}

impl SummarizerConfig {
    /// Load configuration from an optional TOML file, then apply
    /// `DOCSUM_*` environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());

        if config.storage.backend == StorageBackend::Local && config.storage.signing_secret.is_empty() {
            tracing::warn!(
                "No signing secret configured, generating an ephemeral one. \
                 Upload URLs will not survive a restart."
            );
            config.storage.signing_secret = crate::providers::local::generate_secret()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Apply overrides from a key lookup (normally the process environment)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("DOCSUM_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("DOCSUM_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid DOCSUM_PORT: {}", port),
            }
        }
        if let Some(url) = lookup("DOCSUM_PUBLIC_URL") {
            self.server.public_url = Some(url);
        }
        if let Some(path) = lookup("DOCSUM_DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("DOCSUM_STORAGE_DIR") {
            self.storage.local_root = PathBuf::from(dir);
        }
        if let Some(secret) = lookup("DOCSUM_SIGNING_SECRET") {
            self.storage.signing_secret = secret;
        }
        if let Some(url) = lookup("DOCSUM_LLM_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = lookup("DOCSUM_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = lookup("DOCSUM_REDIS_URL") {
            self.queue.redis_url = Some(url);
        }
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.server.max_upload_size == 0 {
            return Err(Error::Config("server.max_upload_size must be greater than 0".to_string()));
        }
        if self.storage.upload_url_ttl_secs == 0 {
            return Err(Error::Config("storage.upload_url_ttl_secs must be greater than 0".to_string()));
        }
        if self.storage.backend == StorageBackend::Local && self.storage.signing_secret.is_empty() {
            return Err(Error::Config("storage.signing_secret is required for local storage".to_string()));
        }
        let needs_gcp = self.storage.backend == StorageBackend::Gcs || self.llm.backend == LlmBackend::Gemini;
        if needs_gcp && self.gcp.is_none() {
            return Err(Error::Config("GCP backend selected but [gcp] section is missing".to_string()));
        }
        if self.queue.broker == BrokerBackend::Redis && self.queue.redis_url.is_none() {
            return Err(Error::Config("Redis broker selected but queue.redis_url is missing".to_string()));
        }
        if self.queue.capacity == 0 {
            return Err(Error::Config("queue.capacity must be greater than 0".to_string()));
        }
        if self.processing.max_input_chars < self.processing.chunk_size {
            return Err(Error::Config(
                "processing.max_input_chars must be at least processing.chunk_size".to_string(),
            ));
        }
        if self.processing.chunk_overlap >= self.processing.chunk_size {
            return Err(Error::Config(
                "processing.chunk_overlap must be smaller than processing.chunk_size".to_string(),
            ));
        }
        Ok(())
    }

    /// Base URL clients use to reach this service
    pub fn public_url(&self) -> String {
        self.server
            .public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.server.host, self.server.port))
            .trim_end_matches('/')
            .to_string()
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Externally visible base URL (used in pre-signed local upload URLs)
    pub public_url: Option<String>,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_url: None,
            enable_cors: true,
            max_upload_size: 50 * 1024 * 1024, // 50MB
        }
    }
}

/// Relational database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("doc-summarizer.db"),
        }
    }
}

/// Object storage backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Local filesystem with HMAC-signed upload URLs served by this process
    #[default]
    Local,
    /// Google Cloud Storage with V4 signed URLs
    Gcs,
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend to use
    pub backend: StorageBackend,
    /// Root directory for the local backend
    pub local_root: PathBuf,
    /// HMAC secret for local pre-signed URLs
    pub signing_secret: String,
    /// Lifetime of pre-signed upload URLs in seconds
    pub upload_url_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_root: data_dir().join("objects"),
            signing_secret: String::new(),
            upload_url_ttl_secs: 15 * 60,
        }
    }
}

/// Queue broker selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BrokerBackend {
    /// In-process bounded channel (jobs are recovered from the database on restart)
    #[default]
    Channel,
    /// Redis list (requires the `redis` feature)
    Redis,
}

/// Job queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Broker backend
    pub broker: BrokerBackend,
    /// Channel capacity for the in-process broker
    pub capacity: usize,
    /// Redis connection URL
    pub redis_url: Option<String>,
    /// Redis list name
    pub queue_name: String,
    /// How long a worker blocks waiting for a message before re-checking shutdown
    pub poll_interval_secs: u64,
    /// Completed/failed jobs older than this are deleted at startup
    pub job_retention_days: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            broker: BrokerBackend::Channel,
            capacity: 1000,
            redis_url: None,
            queue_name: "doc-summarizer:jobs".to_string(),
            poll_interval_secs: 5,
            job_retention_days: 30,
        }
    }
}

/// Summarization backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// Ollama HTTP API
    #[default]
    Ollama,
    /// Gemini via Vertex AI (requires the `gcp` feature)
    Gemini,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend to use
    pub backend: LlmBackend,
    /// Ollama base URL
    pub base_url: String,
    /// Generation model name
    pub model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Upper bound on generated tokens
    pub max_output_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for a failed request
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::Ollama,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            temperature: 0.2,
            max_output_tokens: 1024,
            timeout_secs: 180,
            max_retries: 2,
        }
    }
}

/// Worker processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Upper bound for a whole job (download + extract + summarize + store)
    pub job_timeout_secs: u64,
    /// Upper bound for PDF text extraction
    pub extraction_timeout_secs: u64,
    /// Upper bound for downloading a file over HTTP
    pub download_timeout_secs: u64,
    /// Texts longer than this are summarized section by section
    pub max_input_chars: usize,
    /// Target section size for long documents
    pub chunk_size: usize,
    /// Overlap between sections
    pub chunk_overlap: usize,
    /// Sections beyond this count are dropped
    pub max_sections: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            job_timeout_secs: 600,
            extraction_timeout_secs: 60,
            download_timeout_secs: 120,
            max_input_chars: 24_000,
            chunk_size: 12_000,
            chunk_overlap: 400,
            max_sections: 24,
        }
    }
}

/// Google Cloud Platform configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcpConfig {
    /// Path to service account JSON key file
    pub service_account_key_path: PathBuf,
    /// GCP project ID
    pub project_id: String,
    /// GCP region (e.g., "us-central1")
    #[serde(default = "default_location")]
    pub location: String,
    /// GCS bucket for uploaded PDFs
    #[serde(default)]
    pub gcs_bucket: String,
    /// Optional object name prefix inside the bucket
    #[serde(default = "default_gcs_prefix")]
    pub gcs_prefix: String,
    /// Generation model (default: "gemini-2.5-flash")
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
}

fn default_location() -> String {
    "us-central1".to_string()
}

fn default_gcs_prefix() -> String {
    String::new()
}

fn default_generation_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("doc-summarizer")
}
