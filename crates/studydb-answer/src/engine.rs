//! The `ask` / `reload` / `stats` surface.

use indicatif::ProgressBar;
use moka::sync::Cache;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use studydb_core::error::{Error, Result};
use studydb_core::ingest::Ingestor;
use studydb_core::traits::Embedder;
use studydb_core::types::Document;
use studydb_core::Settings;
use studydb_vector::{artifact, IndexHandle, Retriever, VectorIndex};

use crate::answer::{Answer, AnswerKind};
use crate::confidence::ConfidenceScorer;
use crate::fallback::KnowledgeBase;
use crate::generate::{build_generator, Generator};
use crate::synth::Synthesizer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadReport {
    pub documents_indexed: usize,
    pub chunks_indexed: usize,
    /// Files left out of the new index, with the reason.
    pub skipped: Vec<String>,
    pub index_version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub documents: usize,
    pub chunks: usize,
    pub index_ready: bool,
    pub model_version: String,
    pub index_version: u64,
    pub cached_answers: u64,
    pub generator: String,
    /// Last recoverable index problem (missing or unusable artifact).
    pub warning: Option<String>,
}

pub struct Engine {
    settings: Settings,
    embedder: Arc<dyn Embedder>,
    index: IndexHandle,
    retriever: Arc<Retriever>,
    knowledge: KnowledgeBase,
    synthesizer: Synthesizer,
    cache: Cache<String, Answer>,
    reload_lock: tokio::sync::Mutex<()>,
}

impl Engine {
    /// Build the engine from validated settings: embedder, generative
    /// backend, knowledge base and the persisted index, if any.
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let embedder = studydb_embed::get_embedder(&settings.embedding).map_err(|e| Error::Embedding(e.to_string()))?;
        let generator = build_generator(&settings.generator).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        Self::with_parts(settings, embedder, generator)
    }

    /// Assemble the engine around an explicit embedder and generator.
    ///
    /// Fails with `EmbeddingModelMismatch` when the embedder does not report
    /// the model version pinned in the settings.
    pub fn with_parts(settings: Settings, embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>) -> Result<Self> {
        if settings.embedding.model_version != embedder.model_id() {
            return Err(Error::EmbeddingModelMismatch {
                configured: settings.embedding.model_version.clone(),
                actual: embedder.model_id().to_string(),
            });
        }

        let index = match settings.index.resolved_artifact_path() {
            Some(path) => {
                let loaded = artifact::load(&path, embedder.model_id(), embedder.dim());
                IndexHandle::new(loaded.index, loaded.warning)
            }
            None => IndexHandle::new(VectorIndex::empty(embedder.model_id(), embedder.dim()), None),
        };

        let knowledge = KnowledgeBase::from_settings(&settings.fallback)?;
        let retriever = Arc::new(Retriever::new(embedder.clone(), settings.retrieval.clone()));
        let synthesizer = Synthesizer::new(
            generator,
            settings.answer.clone(),
            settings.generator.timeout(),
            ConfidenceScorer::new(settings.confidence.clone()),
        );

        let mut cache = Cache::builder().max_capacity(settings.cache.max_entries);
        if let Some(ttl) = settings.cache.ttl_secs {
            cache = cache.time_to_live(Duration::from_secs(ttl));
        }

        info!(
            "engine ready: model {}, {} fallback entries, generator {}",
            embedder.model_id(),
            knowledge.len(),
            synthesizer.generator_name()
        );
        Ok(Self {
            settings,
            embedder,
            index,
            retriever,
            knowledge,
            synthesizer,
            cache: cache.build(),
            reload_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Answer `question`, optionally restricted to `subject`. Never fails:
    /// every problem is reported inside the returned answer.
    pub async fn ask(&self, question: &str, subject: Option<&str>) -> Answer {
        let start = Instant::now();
        let subject = subject.map(str::trim).filter(|s| !s.is_empty());
        let snapshot = self.index.snapshot();
        let key = fingerprint(question, subject, snapshot.version);

        if let Some(hit) = self.cache.get(&key) {
            debug!("answer cache hit (index v{})", snapshot.version);
            return hit;
        }
        debug!("answer cache miss (index v{})", snapshot.version);

        let retriever = self.retriever.clone();
        let snap = snapshot.clone();
        let query = question.to_string();
        let filter = subject.map(str::to_string);
        let k = self.retriever.default_k();
        let retrieval = tokio::task::spawn_blocking(move || retriever.retrieve(&snap, &query, k, filter.as_deref()))
            .await
            .map_err(|e| Error::Operation(format!("retrieval task failed: {e}")))
            .and_then(|r| r);

        let fallback = self.knowledge.lookup(question, subject);
        let mut answer = match retrieval {
            Ok(retrieved) => self.synthesizer.synthesize(question, subject, &retrieved, fallback).await,
            Err(e) => {
                warn!("retrieval failed: {e}");
                let degraded = self.synthesizer.synthesize(question, subject, &[], fallback).await;
                if degraded.used_fallback() {
                    Answer { kind: AnswerKind::Degraded { reason: e.to_string() }, ..degraded }
                } else {
                    Answer::failed(e.to_string())
                }
            }
        };
        answer.processing_time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        // Transient failures are not cached so the next ask can recover.
        if !matches!(answer.kind, AnswerKind::Degraded { .. } | AnswerKind::Failed { .. }) {
            self.cache.insert(key, answer.clone());
        }
        answer
    }

    /// Re-ingest `source_paths`, build a new index and swap it in.
    pub async fn reload(&self, source_paths: &[PathBuf]) -> Result<ReloadReport> {
        self.reload_with_progress(source_paths, ProgressBar::hidden()).await
    }

    /// Like [`Engine::reload`], reporting embedding progress on `progress`.
    ///
    /// Ingest, chunking, embedding and persisting run off the async workers;
    /// queries keep using the current index until the swap. If persisting
    /// fails nothing is swapped.
    pub async fn reload_with_progress(&self, source_paths: &[PathBuf], progress: ProgressBar) -> Result<ReloadReport> {
        let _guard = self.reload_lock.lock().await;
        let started = Instant::now();
        let ingestor = Ingestor::new(self.settings.ingest.clone());
        let embedder = self.embedder.clone();
        let batch_size = self.settings.embedding.batch_size;
        let artifact_path = self.settings.index.resolved_artifact_path();
        let paths = source_paths.to_vec();

        let (index, skipped) = tokio::task::spawn_blocking(move || -> Result<(VectorIndex, Vec<String>)> {
            let report = ingestor.ingest(&paths);
            let chunks = ingestor.chunk_all(&report.documents)?;
            let summaries = report.documents.iter().map(Document::summary).collect();
            let index = VectorIndex::build(chunks, summaries, embedder.as_ref(), batch_size, &progress)?;
            if let Some(path) = artifact_path {
                artifact::persist(&index, &path)?;
            }
            Ok((index, report.skipped.iter().map(ToString::to_string).collect()))
        })
        .await
        .map_err(|e| Error::Operation(format!("reload task failed: {e}")))??;

        let documents_indexed = index.documents().len();
        let chunks_indexed = index.len();
        let index_version = self.index.swap(index);
        self.cache.invalidate_all();
        info!(
            "reload done in {:?}: {} documents, {} chunks, {} skipped, index v{}",
            started.elapsed(),
            documents_indexed,
            chunks_indexed,
            skipped.len(),
            index_version
        );
        Ok(ReloadReport { documents_indexed, chunks_indexed, skipped, index_version })
    }

    pub fn stats(&self) -> Stats {
        let snapshot = self.index.snapshot();
        self.cache.run_pending_tasks();
        Stats {
            documents: snapshot.index.documents().len(),
            chunks: snapshot.index.len(),
            index_ready: !snapshot.index.is_empty(),
            model_version: self.embedder.model_id().to_string(),
            index_version: snapshot.version,
            cached_answers: self.cache.entry_count(),
            generator: self.synthesizer.generator_name().to_string(),
            warning: snapshot.warning.clone(),
        }
    }

    pub fn suggested_questions(&self, subject: Option<&str>) -> Vec<String> {
        self.knowledge.suggested_questions(subject)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// Cache key over the question, the (case-folded) subject filter and the
/// index version, so a swap makes every older entry unreachable.
fn fingerprint(question: &str, subject: Option<&str>, index_version: u64) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&index_version.to_le_bytes());
    hasher.update(subject.map(str::to_lowercase).unwrap_or_default().as_bytes());
    hasher.update(&[0]);
    hasher.update(question.trim().as_bytes());
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_depends_on_every_part() {
        let base = fingerprint("What is Ohm's law?", Some("Electricity"), 1);
        assert_eq!(base, fingerprint("  What is Ohm's law?", Some("electricity"), 1));
        assert_ne!(base, fingerprint("What is Ohm's law?", Some("Electricity"), 2));
        assert_ne!(base, fingerprint("What is Ohm's law?", None, 1));
        assert_ne!(base, fingerprint("What is power?", Some("Electricity"), 1));
    }
}
