//! Summarization pipeline: one call for short documents, map-reduce over
//! sentence-bounded sections for long ones

use std::sync::Arc;

use crate::config::ProcessingConfig;
use crate::error::{Error, Result};
use crate::extraction::TextChunker;
use crate::providers::SummaryProvider;

use super::prompt::PromptBuilder;

/// Result of summarizing one document
#[derive(Debug, Clone)]
pub struct SummaryOutput {
    /// Final summary text
    pub content: String,
    /// Provider name
    pub provider: String,
    /// Model name
    pub model: String,
    /// Characters (not bytes) in the text that was summarized
    pub input_chars: usize,
    /// Number of sections summarized (1 when no split was needed)
    pub chunk_count: usize,
}

/// Document summarizer
pub struct Summarizer {
    provider: Arc<dyn SummaryProvider>,
    chunker: TextChunker,
    max_input_chars: usize,
    max_sections: usize,
}

impl Summarizer {
    /// Create a summarizer from processing limits
    pub fn new(provider: Arc<dyn SummaryProvider>, config: &ProcessingConfig) -> Self {
        Self {
            provider,
            chunker: TextChunker::new(config.chunk_size, config.chunk_overlap),
            max_input_chars: config.max_input_chars,
            max_sections: config.max_sections.max(1),
        }
    }

    /// The underlying provider
    pub fn provider(&self) -> &Arc<dyn SummaryProvider> {
        &self.provider
    }

    /// Summarize extracted document text
    pub async fn summarize(&self, filename: &str, text: &str) -> Result<SummaryOutput> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidRequest("Nothing to summarize".to_string()));
        }

        let input_chars = text.chars().count();
        let (content, chunk_count) = if input_chars <= self.max_input_chars {
            let prompt = PromptBuilder::build_summary_prompt(filename, text);
            (self.provider.summarize(&prompt).await?, 1)
        } else {
            self.summarize_sections(filename, text).await?
        };

        Ok(SummaryOutput {
            content: content.trim().to_string(),
            provider: self.provider.name().to_string(),
            model: self.provider.model().to_string(),
            input_chars,
            chunk_count,
        })
    }

    async fn summarize_sections(&self, filename: &str, text: &str) -> Result<(String, usize)> {
        let mut sections = self.chunker.chunk(text);
        if sections.len() > self.max_sections {
            tracing::warn!(
                "{} has {} sections, summarizing only the first {}",
                filename,
                sections.len(),
                self.max_sections
            );
            sections.truncate(self.max_sections);
        }

        let total = sections.len();
        let mut section_summaries = Vec::with_capacity(total);

        for (i, section) in sections.iter().enumerate() {
            tracing::debug!("Summarizing section {}/{} of {}", i + 1, total, filename);
            let prompt = PromptBuilder::build_section_prompt(filename, i + 1, total, section);
            section_summaries.push(self.provider.summarize(&prompt).await?);
        }

        let prompt = PromptBuilder::build_combine_prompt(filename, &section_summaries);
        let combined = self.provider.summarize(&prompt).await?;

        Ok((combined, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Records prompts and answers with a numbered reply
    struct RecordingProvider {
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SummaryProvider for RecordingProvider {
        async fn summarize(&self, prompt: &str) -> Result<String> {
            let mut prompts = self.prompts.lock();
            prompts.push(prompt.to_string());
            Ok(format!("  reply {}  ", prompts.len()))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "recording"
        }

        fn model(&self) -> &str {
            "test-model"
        }
    }

    fn config(max_input_chars: usize, chunk_size: usize, max_sections: usize) -> ProcessingConfig {
        ProcessingConfig {
            max_input_chars,
            chunk_size,
            chunk_overlap: 0,
            max_sections,
            ..Default::default()
        }
    }

    fn long_text() -> String {
        (0..40).map(|i| format!("Fact number {} about the topic. ", i)).collect()
    }

    #[tokio::test]
    async fn test_short_text_single_call() {
        let provider = RecordingProvider::new();
        let summarizer = Summarizer::new(provider.clone(), &config(10_000, 5_000, 10));

        let output = summarizer.summarize("a.pdf", "A short text.").await.unwrap();

        assert_eq!(output.content, "reply 1");
        assert_eq!(output.chunk_count, 1);
        assert_eq!(output.provider, "recording");
        assert_eq!(output.model, "test-model");
        assert_eq!(provider.prompts.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_long_text_map_reduce() {
        let provider = RecordingProvider::new();
        let summarizer = Summarizer::new(provider.clone(), &config(400, 400, 50));
        let text = long_text();

        let output = summarizer.summarize("a.pdf", &text).await.unwrap();
        let prompts = provider.prompts.lock();

        assert!(output.chunk_count > 1);
        assert_eq!(prompts.len(), output.chunk_count + 1);
        assert!(prompts[0].contains("part 1 of"));
        assert!(prompts.last().unwrap().contains("[Part 1]\nreply 1"));
        assert_eq!(output.content, format!("reply {}", prompts.len()));
        assert_eq!(output.input_chars, text.trim().chars().count());
    }

    #[tokio::test]
    async fn test_limit_counts_characters_not_bytes() {
        let provider = RecordingProvider::new();
        let summarizer = Summarizer::new(provider.clone(), &config(400, 400, 50));
        let text = "é".repeat(300);

        let output = summarizer.summarize("a.pdf", &text).await.unwrap();

        assert_eq!(output.chunk_count, 1);
        assert_eq!(output.input_chars, 300);
        assert_eq!(provider.prompts.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_section_limit() {
        let provider = RecordingProvider::new();
        let summarizer = Summarizer::new(provider.clone(), &config(100, 100, 3));

        let output = summarizer.summarize("a.pdf", &long_text()).await.unwrap();

        assert_eq!(output.chunk_count, 3);
        assert_eq!(provider.prompts.lock().len(), 4);
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected() {
        let provider = RecordingProvider::new();
        let summarizer = Summarizer::new(provider.clone(), &config(100, 100, 3));

        assert!(summarizer.summarize("a.pdf", "  \n ").await.is_err());
        assert!(provider.prompts.lock().is_empty());
    }
}
