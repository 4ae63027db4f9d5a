//! Google Cloud Platform provider implementations
//!
//! - Google Cloud Storage for uploaded PDFs (V4 signed upload URLs)
//! - Gemini via Vertex AI for summarization

mod auth;
mod gcs_store;
mod gemini_client;

pub use auth::GcpAuth;
pub use gcs_store::GcsObjectStore;
pub use gemini_client::GeminiSummarizer;
