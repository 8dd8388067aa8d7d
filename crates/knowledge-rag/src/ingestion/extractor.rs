//! Text extraction keyed by file kind

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{Document, FileKind};

/// Converts the raw bytes of one file kind into plain text
pub trait Extract: Send + Sync {
    /// Extract text; `filename` is only used in error messages
    fn extract(&self, filename: &str, data: &[u8]) -> Result<String>;
}

/// Extraction table mapping each supported kind to its extractor
#[derive(Clone)]
pub struct TextExtractor {
    table: HashMap<FileKind, Arc<dyn Extract>>,
}

impl TextExtractor {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// Table with the PDF, Word and plain text extractors registered
    pub fn with_defaults() -> Self {
        let mut extractor = Self::new();
        extractor.register(FileKind::Pdf, PdfExtractor);
        extractor.register(FileKind::WordDoc, WordExtractor);
        extractor.register(FileKind::PlainText, PlainTextExtractor);
        extractor
    }

    /// Register (or replace) the extractor for a kind
    pub fn register<E: Extract + 'static>(&mut self, kind: FileKind, extractor: E) {
        self.table.insert(kind, Arc::new(extractor));
    }

    /// Whether a kind has an extractor
    pub fn supports(&self, kind: FileKind) -> bool {
        self.table.contains_key(&kind)
    }

    /// Extract the text of a document
    pub fn extract(&self, document: &Document) -> Result<String> {
        let extractor = self
            .table
            .get(&document.kind)
            .ok_or_else(|| Error::UnsupportedFormat(document.kind.display_name().to_string()))?;

        let text = extractor.extract(&document.filename, &document.data)?;
        tracing::debug!(
            "Extracted {} chars from '{}' ({})",
            text.chars().count(),
            document.filename,
            document.kind
        );
        Ok(text)
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Join text units with single newlines and trim the result
fn join_units<'a>(units: impl IntoIterator<Item = &'a str>) -> String {
    units
        .into_iter()
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// PDF extractor: pdf-extract first, per-page lopdf as fallback
pub struct PdfExtractor;

impl PdfExtractor {
    fn extract_with_lopdf(filename: &str, data: &[u8]) -> Result<Vec<String>> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::extraction(filename, format!("Failed to load PDF: {}", e)))?;

        let mut pages = Vec::new();
        for page_number in doc.get_pages().keys() {
            match doc.extract_text(&[*page_number]) {
                Ok(text) => pages.push(text),
                Err(e) => {
                    tracing::debug!("Could not extract page {} of '{}': {}", page_number, filename, e);
                }
            }
        }
        Ok(pages)
    }
}

impl Extract for PdfExtractor {
    fn extract(&self, filename: &str, data: &[u8]) -> Result<String> {
        let raw = match pdf_extract::extract_text_from_mem(data) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("pdf-extract failed for '{}': {}, trying lopdf", filename, e);
                Self::extract_with_lopdf(filename, data)?.join("\n")
            }
        };

        let cleaned = cleanup_pdf_text(&raw);
        let text = join_units(
            cleaned
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty()),
        );

        if text.is_empty() {
            return Err(Error::extraction(
                filename,
                "PDF has no extractable text (it may be scanned or encrypted)",
            ));
        }
        Ok(text)
    }
}

/// Replace ligatures, null bytes and non-breaking spaces left by PDF fonts
fn cleanup_pdf_text(text: &str) -> String {
    text.replace('\0', "")
        .replace('\u{00A0}', " ")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
}

/// Word extractor for .docx content
pub struct WordExtractor;

impl Extract for WordExtractor {
    fn extract(&self, filename: &str, data: &[u8]) -> Result<String> {
        let doc = docx_rs::read_docx(data)
            .map_err(|e| Error::extraction(filename, format!("Not a readable Word document: {}", e)))?;

        let mut paragraphs = Vec::new();
        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                let mut paragraph = String::new();
                for child in p.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                paragraph.push_str(&t.text);
                            }
                        }
                    }
                }
                paragraphs.push(paragraph);
            }
        }

        Ok(join_units(paragraphs.iter().map(String::as_str)))
    }
}

/// Plain text and markdown extractor
pub struct PlainTextExtractor;

impl Extract for PlainTextExtractor {
    fn extract(&self, filename: &str, data: &[u8]) -> Result<String> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::extraction(filename, format!("File is not valid UTF-8: {}", e)))?;
        Ok(text.trim().to_string())
    }
}
