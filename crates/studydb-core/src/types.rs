//! Domain types shared by the ingestor, the index and the answer engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub type DocumentId = String;

/// Subject tag used when neither front matter nor the path names one.
pub const DEFAULT_SUBJECT: &str = "General";

/// Source formats the ingestor understands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    PlainText,
    Markdown,
    Html,
    Pdf,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" | "text" => Some(Self::PlainText),
            "md" | "markdown" => Some(Self::Markdown),
            "html" | "htm" => Some(Self::Html),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlainText => "text",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Pdf => "pdf",
        }
    }
}

/// An ingested source file. Never mutated; a re-ingest replaces it.
///
/// - `id`: stable identity derived from the source path
/// - `subject`: tag from front matter, directory convention or the default
/// - `text`: normalized text (no BOM, LF line endings, no NULs)
/// - `content_hash`: blake3 of `text`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub path: PathBuf,
    pub title: Option<String>,
    pub subject: String,
    pub format: DocumentFormat,
    pub text: String,
    pub content_hash: String,
    pub ingested_at: DateTime<Utc>,
}

impl Document {
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            subject: self.subject.clone(),
            format: self.format,
            content_hash: self.content_hash.clone(),
        }
    }
}

/// The part of a [`Document`] that is persisted with the index. Leaves out
/// the ingestion timestamp so identical input produces identical artifacts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub title: Option<String>,
    pub subject: String,
    pub format: DocumentFormat,
    pub content_hash: String,
}

/// A contiguous slice of a document's text.
///
/// `offset` is the byte offset of `text` inside the document. The first
/// `overlap` bytes of `text` repeat the tail of the previous chunk, so
/// `&text[overlap..]` across all chunks of a document, in order, spells out
/// the document exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub document_id: DocumentId,
    pub subject: String,
    pub index: usize,
    pub offset: usize,
    pub overlap: usize,
    pub text: String,
}

impl Chunk {
    /// The part of this chunk not shared with its predecessor.
    pub fn fresh_text(&self) -> &str {
        &self.text[self.overlap..]
    }

    pub fn matches_subject(&self, subject: &str) -> bool {
        self.subject.eq_ignore_ascii_case(subject.trim())
    }
}
