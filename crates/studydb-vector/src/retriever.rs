use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

use studydb_core::config::RetrievalSettings;
use studydb_core::error::{Error, Result};
use studydb_core::traits::Embedder;
use studydb_core::types::Chunk;

use crate::handle::IndexSnapshot;
use crate::index::passage_text;

/// A chunk returned by the retriever with its scores.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieved {
    pub chunk: Chunk,
    /// Cosine similarity between query and chunk.
    pub similarity: f32,
    /// Fraction of query terms present in the chunk or its document title.
    pub lexical: f32,
    /// Blend of the two used for the final order.
    pub rerank_score: f32,
}

/// Vector search over a snapshot followed by a lexical rerank.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    settings: RetrievalSettings,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, settings: RetrievalSettings) -> Self {
        Self { embedder, settings }
    }

    pub fn default_k(&self) -> usize {
        self.settings.top_k
    }

    /// Top `k` chunks for `query`, optionally restricted to `subject`.
    ///
    /// Over-fetches `k * candidate_multiplier` neighbours, rescores them as
    /// `vector_weight * similarity + lexical_weight * overlap`, and orders by
    /// that score, then similarity, then chunk offset. An empty index or an
    /// empty filtered set gives an empty result.
    pub fn retrieve(&self, snapshot: &IndexSnapshot, query: &str, k: usize, subject: Option<&str>) -> Result<Vec<Retrieved>> {
        let index = &snapshot.index;
        if index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed_one(query).map_err(|e| Error::Embedding(e.to_string()))?;
        let candidates = index.query(&query_vec, k.saturating_mul(self.settings.candidate_multiplier), subject);
        let query_terms = studydb_text::tokenize(query);

        let mut results: Vec<Retrieved> = candidates
            .into_iter()
            .filter_map(|n| index.entry(n.position).map(|e| (e, n.similarity)))
            .map(|(entry, similarity)| {
                let text = passage_text(index.title_of(&entry.chunk.document_id), &entry.chunk.text);
                let lexical = studydb_text::term_overlap(&query_terms, &studydb_text::tokenize(&text));
                let rerank_score = self.settings.vector_weight * similarity + self.settings.lexical_weight * lexical;
                Retrieved { chunk: entry.chunk.clone(), similarity, lexical, rerank_score }
            })
            .collect();
        results.sort_by(compare);
        results.truncate(k);
        debug!("retrieved {} chunks (subject {:?}, index v{})", results.len(), subject, snapshot.version);
        Ok(results)
    }
}

fn compare(a: &Retrieved, b: &Retrieved) -> Ordering {
    b.rerank_score
        .partial_cmp(&a.rerank_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.similarity.partial_cmp(&a.similarity).unwrap_or(Ordering::Equal))
        .then_with(|| a.chunk.offset.cmp(&b.chunk.offset))
        .then_with(|| a.chunk.document_id.cmp(&b.chunk.document_id))
}
