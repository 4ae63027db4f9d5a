//! LLM provider trait for generating summaries

use async_trait::async_trait;
use crate::error::Result;

/// Trait for LLM-based text generation
///
/// Implementations:
/// - `OllamaSummarizer`: Local Ollama server (llama3.2, phi3, etc.)
/// - `GeminiSummarizer`: Google Vertex AI (gemini-2.5-flash)
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    /// Run a single completion for a fully built prompt
    async fn summarize(&self, prompt: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
