use std::sync::Arc;
use std::time::Duration;

use studydb_core::config::AnswerSettings;
use studydb_vector::Retrieved;

use crate::answer::{excerpt, Answer, AnswerKind, Source, SourceOrigin};
use crate::confidence::ConfidenceScorer;
use crate::fallback::FallbackEntry;
use crate::generate::{generate_bounded, Generation, Generator, Passage};

/// Chooses between a generated corpus answer, the curated fallback and an
/// explicit "insufficient information" answer.
pub struct Synthesizer {
    generator: Arc<dyn Generator>,
    settings: AnswerSettings,
    timeout: Duration,
    scorer: ConfidenceScorer,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn Generator>, settings: AnswerSettings, timeout: Duration, scorer: ConfidenceScorer) -> Self {
        Self { generator, settings, timeout, scorer }
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// Build the answer for `question`.
    ///
    /// - top similarity at or above the generative threshold: generate from
    ///   the passages at or above the similarity floor and cite those only
    /// - otherwise, with a fallback entry: the curated text verbatim
    /// - otherwise: an "insufficient information" answer with no sources
    ///
    /// A failed generation falls back to the curated entry when there is
    /// one, else to the extractive answer marked degraded.
    pub async fn synthesize(
        &self,
        question: &str,
        subject: Option<&str>,
        retrieved: &[Retrieved],
        fallback: Option<&FallbackEntry>,
    ) -> Answer {
        let similarities: Vec<f32> = retrieved.iter().map(|r| r.similarity).collect();
        let top = similarities.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        let floor = self.scorer.similarity_floor();
        let evidence: Vec<&Retrieved> = retrieved.iter().filter(|r| r.similarity >= floor).collect();

        if !evidence.is_empty() && top >= self.settings.generative_threshold {
            let context = self.passages(&evidence);
            let sources = self.document_sources(&evidence);
            let confidence = self.scorer.score(&similarities, false);
            return match generate_bounded(self.generator.as_ref(), question, &context, self.timeout).await {
                Generation::Success(text) => {
                    Answer { answer: text, confidence, sources, processing_time_ms: 0, kind: AnswerKind::Generated }
                }
                Generation::Degraded(text, reason) => match fallback {
                    Some(entry) => Answer { kind: AnswerKind::Degraded { reason }, ..self.from_fallback(entry) },
                    None => Answer {
                        answer: text,
                        confidence: confidence.min(self.scorer.fallback_confidence()),
                        sources,
                        processing_time_ms: 0,
                        kind: AnswerKind::Degraded { reason },
                    },
                },
            };
        }

        match fallback {
            Some(entry) => self.from_fallback(entry),
            None => Answer::insufficient(question, subject),
        }
    }

    fn from_fallback(&self, entry: &FallbackEntry) -> Answer {
        let confidence = self.scorer.score(&[], true);
        Answer {
            answer: entry.answer.clone(),
            confidence,
            sources: vec![Source {
                excerpt: excerpt(&entry.answer, self.settings.excerpt_chars),
                subject: entry.subject.clone(),
                score: confidence,
                origin: SourceOrigin::Fallback { entry_id: entry.id.clone() },
            }],
            processing_time_ms: 0,
            kind: AnswerKind::Fallback,
        }
    }

    fn passages(&self, retrieved: &[&Retrieved]) -> Vec<Passage> {
        retrieved
            .iter()
            .take(self.settings.max_context_passages.max(1))
            .map(|r| Passage {
                source: r.chunk.document_id.clone(),
                subject: r.chunk.subject.clone(),
                text: truncate(&r.chunk.text, self.settings.max_passage_chars),
            })
            .collect()
    }

    fn document_sources(&self, retrieved: &[&Retrieved]) -> Vec<Source> {
        retrieved
            .iter()
            .map(|r| Source {
                excerpt: excerpt(&r.chunk.text, self.settings.excerpt_chars),
                subject: r.chunk.subject.clone(),
                score: r.similarity,
                origin: SourceOrigin::Document {
                    document_id: r.chunk.document_id.clone(),
                    chunk_index: r.chunk.index,
                    offset: r.chunk.offset,
                },
            })
            .collect()
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
