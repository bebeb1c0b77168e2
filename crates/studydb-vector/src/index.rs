//! Exact cosine nearest-neighbour index over chunk embeddings.
//!
//! Built once from a full set of chunks and never mutated afterwards; a
//! reload builds a fresh index and swaps it in through [`crate::IndexHandle`].

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::info;

use studydb_core::error::{Error, Result};
use studydb_core::traits::Embedder;
use studydb_core::types::{Chunk, DocumentSummary};

/// How many times a document title is repeated ahead of each chunk's text
/// when embedding, so a short chunk still leans towards its title.
const TITLE_WEIGHT: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// One nearest-neighbour hit: position in the index plus cosine similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    pub(crate) model_version: String,
    pub(crate) dimension: usize,
    pub(crate) documents: Vec<DocumentSummary>,
    pub(crate) entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn empty(model_version: impl Into<String>, dimension: usize) -> Self {
        Self { model_version: model_version.into(), dimension, documents: Vec::new(), entries: Vec::new() }
    }

    /// Embed every chunk in batches of `batch_size` and assemble the index.
    /// Each chunk is embedded together with its document title, see
    /// [`passage_text`].
    ///
    /// Chunks and documents are put in a canonical order first, so the same
    /// input under the same model always yields the same index.
    pub fn build(
        mut chunks: Vec<Chunk>,
        mut documents: Vec<DocumentSummary>,
        embedder: &dyn Embedder,
        batch_size: usize,
        progress: &ProgressBar,
    ) -> Result<Self> {
        chunks.sort_by(|a, b| a.document_id.cmp(&b.document_id).then(a.index.cmp(&b.index)));
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        documents.dedup_by(|a, b| a.id == b.id);

        let dimension = embedder.dim();
        let mut index = Self { model_version: embedder.model_id().to_string(), dimension, documents, entries: Vec::new() };
        progress.set_length(chunks.len() as u64);
        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(batch_size.max(1)) {
            let texts: Vec<String> =
                batch.iter().map(|c| passage_text(index.title_of(&c.document_id), &c.text)).collect();
            let vectors = embedder.embed_batch(&texts).map_err(|e| Error::Embedding(e.to_string()))?;
            if vectors.len() != batch.len() {
                return Err(Error::Embedding(format!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }
            for (chunk, vector) in batch.iter().zip(vectors) {
                if vector.len() != dimension {
                    return Err(Error::Embedding(format!(
                        "vector for {}#{} has dimension {}, expected {}",
                        chunk.document_id,
                        chunk.index,
                        vector.len(),
                        dimension
                    )));
                }
                entries.push(IndexEntry { chunk: chunk.clone(), vector });
            }
            progress.inc(batch.len() as u64);
        }
        progress.finish_with_message("index built");
        info!("built index: {} documents, {} chunks, model {}", index.documents.len(), entries.len(), embedder.model_id());

        index.entries = entries;
        Ok(index)
    }

    /// The `k` entries nearest to `query` by cosine similarity, best first.
    /// With `subject` set, only entries tagged with that subject are
    /// considered. Returns fewer than `k` when fewer match.
    pub fn query(&self, query: &[f32], k: usize, subject: Option<&str>) -> Vec<Neighbor> {
        if k == 0 || query.len() != self.dimension {
            return Vec::new();
        }
        let mut hits: Vec<Neighbor> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| subject.map_or(true, |s| e.chunk.matches_subject(s)))
            .map(|(position, e)| Neighbor { position, similarity: cosine(query, &e.vector) })
            .collect();
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then(a.position.cmp(&b.position))
        });
        hits.truncate(k);
        hits
    }

    pub fn entry(&self, position: usize) -> Option<&IndexEntry> {
        self.entries.get(position)
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn documents(&self) -> &[DocumentSummary] {
        &self.documents
    }

    /// Title of the document `document_id`, if it has one.
    pub fn title_of(&self, document_id: &str) -> Option<&str> {
        let i = self.documents.binary_search_by(|d| d.id.as_str().cmp(document_id)).ok()?;
        self.documents[i].title.as_deref()
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Progress bar for index builds, styled for terminals.
pub fn build_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// The text embedded for a chunk: the title (when there is one) repeated
/// `TITLE_WEIGHT` times on its own lines, then the chunk text.
pub fn passage_text(title: Option<&str>, text: &str) -> String {
    match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => {
            let mut out = String::with_capacity(text.len() + TITLE_WEIGHT * (title.len() + 1));
            for _ in 0..TITLE_WEIGHT {
                out.push_str(title);
                out.push('\n');
            }
            out.push_str(text);
            out
        }
        None => text.to_string(),
    }
}

/// Cosine similarity; zero when either side has no magnitude.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0f32;
    let mut na = 0f32;
    let mut nb = 0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())).clamp(-1.0, 1.0)
}
