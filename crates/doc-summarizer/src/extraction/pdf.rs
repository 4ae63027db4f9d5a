//! PDF text extraction
//!
//! `pdf-extract` does the heavy lifting; it runs on a helper thread with a
//! timeout because some fonts make it spin. When it fails, times out or
//! yields nothing, text operators are read straight from the page content
//! streams with `lopdf`.

use lopdf::content::Content;
use lopdf::Object;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};

use super::{ExtractedText, TextExtractor};

/// Glyph names such as `uni2019` leaked by some font encodings
static GLYPH_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\buni([0-9A-F]{4})").expect("valid glyph name regex"));

/// Words broken across lines with a hyphen
static LINE_BREAK_HYPHEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{L})-\n(\p{Ll})").expect("valid hyphenation regex"));

static INLINE_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t\u{00A0}]+").expect("valid whitespace regex"));

/// Clean up extracted PDF text: resolve glyph names, flatten typographic
/// characters to ASCII, drop control characters, rejoin hyphenated words and
/// normalize whitespace.
pub fn cleanup_pdf_text(text: &str) -> String {
    let text = GLYPH_NAME.replace_all(text, |caps: &regex::Captures| {
        u32::from_str_radix(&caps[1], 16)
            .ok()
            .and_then(char::from_u32)
            .map(|c| c.to_string())
            .unwrap_or_default()
    });

    let mut flattened = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2212}' => flattened.push('-'),
            '\u{2014}' | '\u{2015}' => flattened.push_str("--"),
            '\u{2018}' | '\u{2019}' | '\u{201A}' => flattened.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' => flattened.push('"'),
            '\u{2022}' => flattened.push_str("* "),
            '\u{2026}' => flattened.push_str("..."),
            '\u{2002}' | '\u{2003}' | '\u{2009}' => flattened.push(' '),
            '\u{FB00}' => flattened.push_str("ff"),
            '\u{FB01}' => flattened.push_str("fi"),
            '\u{FB02}' => flattened.push_str("fl"),
            '\u{FB03}' => flattened.push_str("ffi"),
            '\u{FB04}' => flattened.push_str("ffl"),
            '\r' | '\u{000C}' => flattened.push('\n'),
            c if c.is_control() && c != '\n' && c != '\t' => {}
            c => flattened.push(c),
        }
    }

    let lines = flattened
        .lines()
        .map(|line| INLINE_WHITESPACE.replace_all(line.trim(), " ").into_owned())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    LINE_BREAK_HYPHEN.replace_all(&lines, "$1$2").into_owned()
}

/// Whether the bytes look like a PDF (`%PDF-` near the start)
fn is_pdf_data(data: &[u8]) -> bool {
    let head = &data[..data.len().min(1024)];
    head.windows(5).any(|w| w == b"%PDF-")
}

/// PDF text extractor
pub struct PdfTextExtractor {
    /// Upper bound for the `pdf-extract` pass
    timeout: Duration,
}

impl PdfTextExtractor {
    /// Create an extractor with the given `pdf-extract` timeout
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run `pdf-extract` on a helper thread; `None` on error, panic or timeout
    fn extract_with_timeout(&self, data: &[u8]) -> Option<String> {
        let data = data.to_vec();
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let result = pdf_extract::extract_text_from_mem(&data);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(text)) => {
                let _ = handle.join();
                Some(text)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                tracing::warn!("pdf-extract failed: {}, trying fallback", e);
                None
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // The thread cannot be cancelled; it is left to finish on its own
                tracing::error!(
                    "pdf-extract timed out after {:?}, trying fallback",
                    self.timeout
                );
                None
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                tracing::error!("pdf-extract thread crashed, trying fallback");
                None
            }
        }
    }
}

impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, filename: &str, data: &[u8]) -> Result<ExtractedText> {
        if !is_pdf_data(data) {
            return Err(Error::extraction(filename, "File is not a PDF"));
        }

        let document = lopdf::Document::load_mem(data);
        let page_count = match &document {
            Ok(doc) => Some(doc.get_pages().len() as u32),
            Err(e) => {
                tracing::debug!("lopdf could not load {}: {}", filename, e);
                None
            }
        };

        let primary = self
            .extract_with_timeout(data)
            .map(|text| cleanup_pdf_text(&text))
            .filter(|text| !text.is_empty());

        let text = match primary {
            Some(text) => text,
            None => {
                let doc = document
                    .map_err(|e| Error::extraction(filename, format!("Failed to load PDF: {}", e)))?;
                cleanup_pdf_text(&extract_with_lopdf(&doc))
            }
        };

        if text.is_empty() {
            return Err(Error::extraction(
                filename,
                "PDF has no extractable text (it may be scanned or encrypted)",
            ));
        }

        tracing::debug!(
            "Extracted {} chars from {} ({:?} pages)",
            text.len(),
            filename,
            page_count
        );

        Ok(ExtractedText { text, page_count })
    }

    fn name(&self) -> &str {
        "pdf"
    }
}

/// Read text-showing operators from every page's content stream
fn extract_with_lopdf(doc: &lopdf::Document) -> String {
    let mut text = String::new();

    for (page_num, page_id) in doc.get_pages() {
        let content = match doc
            .get_page_content(page_id)
            .and_then(|bytes| Content::decode(&bytes))
        {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("Could not decode content for page {}: {}", page_num, e);
                continue;
            }
        };

        for operation in &content.operations {
            match operation.operator.as_str() {
                "Tj" | "'" | "\"" => {
                    if let Some(Object::String(bytes, _)) = operation.operands.last() {
                        push_pdf_string(&mut text, bytes);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operation.operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => push_pdf_string(&mut text, bytes),
                                // Large negative kerning is a word gap
                                Object::Integer(n) if *n < -200 => text.push(' '),
                                Object::Real(n) if *n < -200.0 => text.push(' '),
                                _ => {}
                            }
                        }
                    }
                }
                "Td" | "TD" | "T*" | "ET" => {
                    if !text.is_empty() && !text.ends_with('\n') {
                        text.push('\n');
                    }
                }
                _ => {}
            }
        }

        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
    }

    text
}

/// Decode a PDF string operand (treated as Latin-1)
fn push_pdf_string(text: &mut String, bytes: &[u8]) {
    text.extend(bytes.iter().map(|&b| b as char));
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{dictionary, Stream};

    fn pdf_with_operations(operations: Vec<Operation>) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn hello_pdf() -> Vec<u8> {
        pdf_with_operations(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![100.into(), 600.into()]),
            Operation::new("Tj", vec![Object::string_literal("Hello World")]),
            Operation::new("ET", vec![]),
        ])
    }

    #[test]
    fn test_extracts_text_and_page_count() {
        let extracted = PdfTextExtractor::default()
            .extract("hello.pdf", &hello_pdf())
            .unwrap();

        assert!(extracted.text.contains("Hello"));
        assert_eq!(extracted.page_count, Some(1));
    }

    #[test]
    fn test_lopdf_fallback_reads_text_operators() {
        let data = pdf_with_operations(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Tj", vec![Object::string_literal("First line")]),
            Operation::new("Td", vec![0.into(), (-14).into()]),
            Operation::new(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("Second"),
                    Object::Integer(-500),
                    Object::string_literal("line"),
                ])],
            ),
            Operation::new("ET", vec![]),
        ]);
        let doc = lopdf::Document::load_mem(&data).unwrap();

        assert_eq!(cleanup_pdf_text(&extract_with_lopdf(&doc)), "First line\nSecond line");
    }

    #[test]
    fn test_rejects_non_pdf() {
        let result = PdfTextExtractor::default().extract("notes.pdf", b"just some text");
        assert!(matches!(result, Err(Error::Extraction { .. })));
    }

    #[test]
    fn test_pdf_without_text_is_an_error() {
        let data = pdf_with_operations(vec![]);
        let result = PdfTextExtractor::default().extract("blank.pdf", &data);
        assert!(matches!(result, Err(Error::Extraction { .. })));
    }

    #[test]
    fn test_cleanup_pdf_text() {
        let raw = "  The \u{FB01}rst  uni2019quoted\u{2019} word\u{2014}here \n\n\u{0}exam-\nple\r\u{2022}item ";
        assert_eq!(
            cleanup_pdf_text(raw),
            "The first 'quoted' word--here\nexample\n* item"
        );
    }

    #[test]
    fn test_is_pdf_data() {
        assert!(is_pdf_data(b"%PDF-1.7\n..."));
        assert!(is_pdf_data(b"\xef\xbb\xbf%PDF-1.4"));
        assert!(!is_pdf_data(b"PK\x03\x04"));
        assert!(!is_pdf_data(b""));
    }
}
