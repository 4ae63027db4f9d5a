//! doc-summarizer: PDF upload service with background LLM summaries
//!
//! Clients register an upload and receive a pre-signed URL, upload the PDF
//! straight to object storage, then confirm completion. Confirmation queues a
//! summary job on a broker; a single-concurrency worker downloads the file,
//! extracts its text, asks an LLM for a summary and stores it. Clients poll
//! the document status until the summary is ready.

pub mod config;
pub mod error;
pub mod extraction;
pub mod processing;
pub mod providers;
pub mod server;
pub mod storage;
pub mod summarization;
pub mod types;

pub use config::SummarizerConfig;
pub use error::{Error, Result};
pub use types::{
    document::{Document, DocumentStatus},
    job::{JobMessage, JobStage, JobStatus, SummaryJob},
    summary::Summary,
};
