//! Generated summaries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The stored summary of a document (one per document)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: Uuid,
    pub document_id: Uuid,
    /// Summary text
    pub content: String,
    /// Model that produced it
    pub model: String,
    /// Provider name ("ollama", "gemini")
    pub provider: String,
    /// Characters of extracted text fed to the summarizer
    pub input_chars: usize,
    /// Number of sections summarized (1 for short documents)
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

impl Summary {
    pub fn new(
        document_id: Uuid,
        content: String,
        model: impl Into<String>,
        provider: impl Into<String>,
        input_chars: usize,
        chunk_count: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            content,
            model: model.into(),
            provider: provider.into(),
            input_chars,
            chunk_count,
            created_at: Utc::now(),
        }
    }
}
