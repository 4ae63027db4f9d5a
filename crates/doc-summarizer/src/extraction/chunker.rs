//! Sentence-bounded text chunking for long documents

use unicode_segmentation::UnicodeSegmentation;

/// Text chunker with configurable size and overlap
///
/// Chunks never exceed `chunk_size` bytes. Sentences longer than that are
/// split at the last space that fits, or at a character boundary.
pub struct TextChunker {
    /// Target chunk size in bytes
    chunk_size: usize,
    /// Overlap carried from the end of one chunk into the next
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size / 2),
        }
    }

    /// Split text into chunks
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for piece in self.pieces(text) {
            if !current.is_empty() && current.len() + piece.len() > self.chunk_size {
                push_chunk(&mut chunks, &current);

                current = self.get_overlap_text(&current);
                if current.len() + piece.len() > self.chunk_size {
                    current.clear();
                }
            }
            current.push_str(piece);
        }

        push_chunk(&mut chunks, &current);
        chunks
    }

    /// Sentences, with any sentence longer than `chunk_size` split further
    fn pieces<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut pieces = Vec::new();

        for sentence in text.split_sentence_bounds() {
            let mut rest = sentence;
            while rest.len() > self.chunk_size {
                let mut end = self.chunk_size;
                while !rest.is_char_boundary(end) {
                    end -= 1;
                }
                if end == 0 {
                    // chunk_size is smaller than this character
                    end = rest.chars().next().map_or(rest.len(), char::len_utf8);
                } else if let Some(space) = rest[..end].rfind(' ') {
                    if space > 0 {
                        end = space + 1;
                    }
                }
                pieces.push(&rest[..end]);
                rest = &rest[end..];
            }
            if !rest.is_empty() {
                pieces.push(rest);
            }
        }

        pieces
    }

    /// Get overlap text from the end of a chunk
    fn get_overlap_text(&self, text: &str) -> String {
        if self.overlap == 0 {
            return String::new();
        }
        if text.len() <= self.overlap {
            return text.to_string();
        }

        let mut start = text.len() - self.overlap;
        while start > 0 && !text.is_char_boundary(start) {
            start -= 1;
        }

        let overlap_text = &text[start..];

        // Prefer starting at a sentence boundary
        if let Some(pos) = overlap_text.find(". ") {
            return overlap_text[pos + 2..].to_string();
        }

        // Fall back to word boundary
        if let Some(pos) = overlap_text.find(' ') {
            return overlap_text[pos + 1..].to_string();
        }

        overlap_text.to_string()
    }
}

fn push_chunk(chunks: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_sentences(count: usize) -> String {
        (0..count)
            .map(|i| format!("Sentence number {} is here. ", i))
            .collect()
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunker = TextChunker::new(1000, 100);
        assert_eq!(chunker.chunk("  A short document.  "), vec!["A short document."]);
        assert!(chunker.chunk("   ").is_empty());
    }

    #[test]
    fn test_chunks_respect_size_and_cover_text() {
        let text = numbered_sentences(100);
        let chunker = TextChunker::new(200, 40);
        let chunks = chunker.chunk(&text);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 200));
        assert!(chunks[0].starts_with("Sentence number 0 "));
        assert!(chunks.last().unwrap().ends_with("Sentence number 99 is here."));
    }

    #[test]
    fn test_chunks_overlap() {
        let text = numbered_sentences(50);
        let chunks = TextChunker::new(200, 60).chunk(&text);

        let first_sentence_of_second = chunks[1].split(". ").next().unwrap();
        assert!(chunks[0].contains(first_sentence_of_second));
    }

    #[test]
    fn test_oversized_sentence_is_split() {
        let word = "x".repeat(500);
        let chunks = TextChunker::new(200, 0).chunk(&word);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() <= 200));

        let words = "lorem ipsum ".repeat(50);
        let chunks = TextChunker::new(100, 0).chunk(&words);
        assert!(chunks.iter().all(|c| c.len() <= 100));
        assert!(chunks.iter().all(|c| c.starts_with("lorem")));
    }

    #[test]
    fn test_multibyte_text() {
        let text = "é".repeat(300);
        let chunks = TextChunker::new(101, 10).chunk(&text);
        assert!(chunks.iter().all(|c| c.len() <= 101));
        assert_eq!(chunks.concat().chars().count(), 300);
    }
}
