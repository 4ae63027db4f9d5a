//! Provider abstractions for object storage and summarization
//!
//! This module provides trait-based abstractions that allow switching between
//! local (filesystem, Ollama) and cloud (GCP) backends.

pub mod llm;
pub mod local;
pub mod object_store;
pub mod ollama;

#[cfg(feature = "gcp")]
pub mod gcp;

pub use llm::SummaryProvider;
pub use local::LocalObjectStore;
pub use object_store::{ObjectStore, PresignedUpload};
pub use ollama::OllamaSummarizer;
