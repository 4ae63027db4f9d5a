//! Text extraction from uploaded files

mod chunker;
mod pdf;

pub use chunker::TextChunker;
pub use pdf::{cleanup_pdf_text, PdfTextExtractor};

use crate::error::Result;

/// Text pulled out of a document
#[derive(Debug, Clone)]
pub struct ExtractedText {
    /// Cleaned plain text
    pub text: String,
    /// Page count, when the format has pages and it could be determined
    pub page_count: Option<u32>,
}

/// Trait for turning file bytes into plain text
///
/// Extraction is CPU-bound and synchronous; async callers should run it
/// through `tokio::task::spawn_blocking`.
pub trait TextExtractor: Send + Sync {
    /// Extract text, failing with `Error::Extraction` when nothing usable is found
    fn extract(&self, filename: &str, data: &[u8]) -> Result<ExtractedText>;

    /// Get extractor name for logging
    fn name(&self) -> &str;
}
