//! Core types for documents, jobs and summaries

pub mod document;
pub mod job;
pub mod summary;

pub use document::{Document, DocumentStatus};
pub use job::{JobMessage, JobStage, JobStatus, SummaryJob};
pub use summary::Summary;
