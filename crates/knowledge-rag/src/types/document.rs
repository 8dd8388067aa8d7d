//! Document, chunk and record types with source tracking

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Metadata key holding the document a chunk came from
pub const SOURCE_ID_KEY: &str = "source_id";
/// Metadata key holding the chunk's character offset
pub const START_OFFSET_KEY: &str = "start_offset";

/// Supported file kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// PDF document
    Pdf,
    /// Word processor document (.docx, legacy .doc)
    WordDoc,
    /// Plain text or markdown
    PlainText,
}

impl FileKind {
    /// Detect file kind from extension, `None` when unsupported
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" | "doc" => Some(Self::WordDoc),
            "txt" | "text" | "md" | "markdown" => Some(Self::PlainText),
            _ => None,
        }
    }

    /// Detect file kind from a filename's last extension
    pub fn from_filename(filename: &str) -> Result<Self> {
        let extension = extension_of(filename);
        Self::from_extension(&extension).ok_or_else(|| {
            if extension.is_empty() {
                Error::UnsupportedFormat(format!("'{}' has no file extension", filename))
            } else {
                Error::UnsupportedFormat(format!(".{}", extension))
            }
        })
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::WordDoc => "Word Document",
            Self::PlainText => "Plain Text",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Lowercased extension after the last dot, empty when there is none
fn extension_of(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// An uploaded document, alive only for the duration of one ingestion
#[derive(Debug, Clone)]
pub struct Document {
    /// Original filename
    pub filename: String,
    /// Declared kind, derived from the extension
    pub kind: FileKind,
    /// Raw file content
    pub data: Bytes,
}

impl Document {
    /// Create a document, rejecting unsupported extensions up front
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Result<Self> {
        let filename = filename.into();
        let kind = FileKind::from_filename(&filename)?;
        Ok(Self {
            filename,
            kind,
            data: data.into(),
        })
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// A contiguous window of a source document's text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Window text
    pub text: String,
    /// Character offset of `text` within the extracted document text
    pub start_offset: usize,
    /// Document identifier supplied by the caller
    pub source_id: String,
    /// Caller metadata merged with the reserved keys
    pub extra_metadata: BTreeMap<String, String>,
}

impl Chunk {
    /// Create a chunk whose metadata holds only the reserved keys
    pub fn new(text: impl Into<String>, start_offset: usize, source_id: impl Into<String>) -> Self {
        let mut chunk = Self {
            text: text.into(),
            start_offset,
            source_id: source_id.into(),
            extra_metadata: BTreeMap::new(),
        };
        chunk.stamp_reserved_keys();
        chunk
    }

    /// Merge caller metadata; reserved keys keep the chunk's own values
    pub fn merge_metadata(&mut self, caller: &BTreeMap<String, String>) {
        for (key, value) in caller {
            self.extra_metadata.insert(key.clone(), value.clone());
        }
        self.stamp_reserved_keys();
    }

    fn stamp_reserved_keys(&mut self) {
        self.extra_metadata
            .insert(SOURCE_ID_KEY.to_string(), self.source_id.clone());
        self.extra_metadata
            .insert(START_OFFSET_KEY.to_string(), self.start_offset.to_string());
    }

    /// Character length of the chunk text
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A chunk together with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

impl EmbeddedChunk {
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self { chunk, vector }
    }
}

/// An embedded chunk persisted by a vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Store-assigned identifier
    pub id: Uuid,
    /// Stored chunk
    pub chunk: Chunk,
    /// Stored embedding (not serialized in API responses)
    #[serde(skip)]
    pub vector: Vec<f32>,
}

impl StoredRecord {
    /// Assign a fresh identifier to an embedded chunk
    pub fn assign(embedded: EmbeddedChunk) -> Self {
        Self {
            id: Uuid::new_v4(),
            chunk: embedded.chunk,
            vector: embedded.vector,
        }
    }
}

/// A stored record with its relevance to a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: StoredRecord,
    /// Normalized similarity in [0, 1], higher is more relevant
    pub score: f32,
}
