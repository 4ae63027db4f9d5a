//! Storage module for persistent data storage
//!
//! Provides SQLite-based persistence for documents, summary jobs and summaries.

mod database;

pub use database::{Database, JobCounts};
