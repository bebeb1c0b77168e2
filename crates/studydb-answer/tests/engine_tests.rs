use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use studydb_answer::{AnswerKind, Engine, GenerateError, Generator, Passage, SourceOrigin};
use studydb_core::error::Error;
use studydb_core::Settings;
use studydb_embed::HashingEmbedder;

fn settings(tmp: &Path) -> Settings {
    let mut s = Settings::default();
    s.index.artifact_path = Some(tmp.join("index/studydb-index.json").to_string_lossy().to_string());
    s
}

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn corpus(tmp: &Path) -> PathBuf {
    let root = tmp.join("corpus");
    write(&root, "Electricity/ohm.txt", "U = R × I");
    write(&root, "Electricity/power.md", "---\ntitle: Power\n---\nElectrical power is P = U × I, measured in watts.\n");
    write(&root, "Mathematics/derivative.txt", "The derivative of a function measures its instantaneous rate of change.");
    root
}

struct Slow;

#[async_trait]
impl Generator for Slow {
    fn name(&self) -> &str {
        "slow"
    }

    async fn generate(&self, _prompt: &str, _context: &[Passage]) -> Result<String, GenerateError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("never".into())
    }
}

#[tokio::test]
async fn empty_corpus_falls_back_to_curated_ohm_answer() {
    let tmp = TempDir::new().unwrap();
    let engine = Engine::new(settings(tmp.path())).unwrap();

    let stats = engine.stats();
    assert!(!stats.index_ready);
    assert!(stats.warning.is_some(), "missing artifact is reported");

    let a = engine.ask("Explain Ohm's law", None).await;
    assert_eq!(a.kind, AnswerKind::Fallback);
    assert!((a.confidence - 0.5).abs() < 1e-6);
    assert_eq!(a.sources.len(), 1);
    assert_eq!(a.sources[0].origin, SourceOrigin::Fallback { entry_id: "ohm".into() });
    assert!(a.answer.starts_with("**Ohm's law**"));
    assert!(a.answer.contains("U = R × I"));
}

#[tokio::test]
async fn indexed_chunk_is_cited_above_threshold() {
    let tmp = TempDir::new().unwrap();
    let engine = Engine::new(settings(tmp.path())).unwrap();
    let report = engine.reload(&[corpus(tmp.path())]).await.unwrap();
    assert_eq!(report.documents_indexed, 3);
    assert_eq!(report.chunks_indexed, 3);

    // ohm.txt holds only the formula; the file name carries the topic.
    let a = engine.ask("What is Ohm's law?", Some("Electricity")).await;
    assert_eq!(a.kind, AnswerKind::Generated);
    assert!(a.confidence > engine.settings().answer.generative_threshold);
    match &a.sources[0].origin {
        SourceOrigin::Document { document_id, offset, .. } => {
            assert!(document_id.ends_with("Electricity/ohm.txt"));
            assert_eq!(*offset, 0);
        }
        other => panic!("expected a document source, got {other:?}"),
    }
    assert!(a.sources.iter().all(|s| s.subject == "Electricity"));
    let floor = engine.settings().confidence.similarity_floor;
    assert!(a.sources.iter().all(|s| s.score >= floor), "only supporting chunks are cited: {:?}", a.sources);
    assert!(a.answer.contains("U = R × I"));
}

#[tokio::test]
async fn unmatched_subject_is_insufficient() {
    let tmp = TempDir::new().unwrap();
    let engine = Engine::new(settings(tmp.path())).unwrap();
    engine.reload(&[corpus(tmp.path())]).await.unwrap();

    let a = engine.ask("Who won the battle of Waterloo?", Some("History")).await;
    assert_eq!(a.kind, AnswerKind::Insufficient);
    assert_eq!(a.confidence, 0.0);
    assert!(a.sources.is_empty());
    assert!(a.answer.starts_with("Insufficient information"));
}

#[tokio::test]
async fn reload_grows_stats_and_bypasses_stale_cache() {
    let tmp = TempDir::new().unwrap();
    let root = corpus(tmp.path());
    let engine = Engine::new(settings(tmp.path())).unwrap();
    engine.reload(&[root.clone()]).await.unwrap();
    let before = engine.stats();

    let question = "How does photosynthesis work?";
    let stale = engine.ask(question, None).await;
    assert_eq!(stale.kind, AnswerKind::Insufficient);
    assert_eq!(engine.stats().cached_answers, 1);

    write(&root, "Biology/photosynthesis.txt", "Photosynthesis: how photosynthesis does its work. Plants turn light into sugar.");
    engine.reload(&[root]).await.unwrap();
    let after = engine.stats();
    assert!(after.documents > before.documents);
    assert!(after.chunks > before.chunks);
    assert_eq!(after.index_version, before.index_version + 1);
    assert_eq!(after.cached_answers, 0);

    let fresh = engine.ask(question, None).await;
    assert_eq!(fresh.kind, AnswerKind::Generated);
    assert!(fresh.confidence > 0.0);
    assert!(fresh.answer.contains("Plants turn light into sugar"));
}

#[tokio::test]
async fn cached_answer_matches_fresh_computation() {
    let tmp = TempDir::new().unwrap();
    let engine = Engine::new(settings(tmp.path())).unwrap();
    engine.reload(&[corpus(tmp.path())]).await.unwrap();

    let first = engine.ask("What is electrical power?", Some("Electricity")).await;
    let second = engine.ask("What is electrical power?", Some("Electricity")).await;
    assert_eq!(first, second, "second call is served from cache");

    // A new engine over the same persisted artifact has an empty cache.
    let other = Engine::new(settings(tmp.path())).unwrap();
    assert!(other.stats().index_ready);
    let mut fresh = other.ask("What is electrical power?", Some("Electricity")).await;
    fresh.processing_time_ms = first.processing_time_ms;
    assert_eq!(fresh, first);
}

#[tokio::test]
async fn slow_generator_times_out_and_degrades() {
    let tmp = TempDir::new().unwrap();
    let mut s = settings(tmp.path());
    s.generator.timeout_ms = 50;
    let engine = Engine::with_parts(s, Arc::new(HashingEmbedder::new(384)), Arc::new(Slow)).unwrap();
    engine.reload(&[corpus(tmp.path())]).await.unwrap();

    // Retrieval clears the threshold, generation times out, the curated entry is used.
    let a = engine.ask("What is Ohm's law?", Some("Electricity")).await;
    match &a.kind {
        AnswerKind::Degraded { reason } => assert!(reason.contains("timed out")),
        other => panic!("expected degraded, got {other:?}"),
    }
    assert!(a.answer.starts_with("**Ohm's law**"));
    assert!(a.confidence <= 0.5);
    assert_eq!(engine.stats().cached_answers, 0, "degraded answers are not cached");

    // No curated entry covers this one, so the extractive answer is returned instead.
    let b = engine.ask("instantaneous rate of change of a function", Some("Mathematics")).await;
    assert!(matches!(b.kind, AnswerKind::Degraded { .. }));
    assert!(b.confidence <= 0.5);
    assert!(matches!(b.sources[0].origin, SourceOrigin::Document { .. }));
    assert!(b.answer.contains("instantaneous rate of change"));
}

#[tokio::test]
async fn abandoned_ask_leaves_cache_and_index_untouched() {
    let tmp = TempDir::new().unwrap();
    let engine = Engine::with_parts(settings(tmp.path()), Arc::new(HashingEmbedder::new(384)), Arc::new(Slow)).unwrap();
    engine.reload(&[corpus(tmp.path())]).await.unwrap();
    let before = engine.stats();

    let abandoned =
        tokio::time::timeout(Duration::from_millis(10), engine.ask("What is Ohm's law?", Some("Electricity"))).await;
    assert!(abandoned.is_err(), "generation is still pending when the caller gives up");

    let after = engine.stats();
    assert_eq!(after.cached_answers, 0);
    assert_eq!(after.index_version, before.index_version);
    assert_eq!(after.chunks, before.chunks);
    assert!(after.index_ready);

    let a = engine.ask("Qu'est-ce que le pH ?", Some("Chemistry")).await;
    assert_eq!(a.kind, AnswerKind::Fallback);
    assert_eq!(a.sources[0].origin, SourceOrigin::Fallback { entry_id: "ph".into() });
    assert_eq!(engine.stats().cached_answers, 1);
}

#[test]
fn model_pin_mismatch_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let mut s = settings(tmp.path());
    s.embedding.model_version = "bge-m3".into();
    let err = Engine::with_parts(s, Arc::new(HashingEmbedder::new(384)), Arc::new(Slow)).err().unwrap();
    assert!(matches!(err, Error::EmbeddingModelMismatch { .. }));
    assert!(!err.is_recoverable());
}

#[tokio::test]
async fn corrupt_artifact_starts_empty_with_warning() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "index/studydb-index.json", "not json at all");
    let engine = Engine::new(settings(tmp.path())).unwrap();

    let stats = engine.stats();
    assert!(!stats.index_ready);
    assert!(stats.warning.unwrap().contains("corrupt"));
    assert_eq!(engine.ask("Explain Ohm's law", None).await.kind, AnswerKind::Fallback);
}

#[tokio::test]
async fn failed_persist_keeps_the_old_index() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "blocker", "a file where a directory should be");
    let mut s = Settings::default();
    s.index.artifact_path = Some(tmp.path().join("blocker/index.json").to_string_lossy().to_string());
    let engine = Engine::new(s).unwrap();

    assert!(engine.reload(&[corpus(tmp.path())]).await.is_err());
    let stats = engine.stats();
    assert_eq!(stats.index_version, 0);
    assert!(!stats.index_ready);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn queries_during_reload_see_a_whole_index() {
    let tmp = TempDir::new().unwrap();
    let root = corpus(tmp.path());
    let engine = Arc::new(Engine::new(settings(tmp.path())).unwrap());
    engine.reload(&[root.clone()]).await.unwrap();

    let reloader = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.reload(&[root]).await })
    };
    let mut askers = Vec::new();
    for i in 0..16 {
        let engine = engine.clone();
        askers.push(tokio::spawn(async move {
            // Distinct cache keys, identical terms.
            engine.ask(&format!("What is Ohm's law{}", "?".repeat(i + 1)), Some("Electricity")).await
        }));
    }
    for a in askers {
        let answer = a.await.unwrap();
        assert_eq!(answer.kind, AnswerKind::Generated);
        assert!((0.0..=1.0).contains(&answer.confidence));
    }
    reloader.await.unwrap().unwrap();
    assert_eq!(engine.stats().index_version, 2);
}

#[test]
fn suggested_questions_are_scoped() {
    let tmp = TempDir::new().unwrap();
    let engine = Engine::new(settings(tmp.path())).unwrap();
    let maths = engine.suggested_questions(Some("Mathematics"));
    assert!(!maths.is_empty());
    assert!(maths.iter().all(|q| !q.contains("Ohm")));
}
