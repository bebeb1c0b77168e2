//! studydb-answer
//!
//! Curated fallback knowledge, generative backends, answer synthesis,
//! confidence scoring and the [`Engine`] that ties them to the index.

pub mod answer;
pub mod confidence;
pub mod engine;
pub mod fallback;
pub mod generate;
pub mod synth;

pub use answer::{Answer, AnswerKind, Source, SourceOrigin};
pub use engine::{Engine, ReloadReport, Stats};
pub use fallback::{FallbackEntry, KnowledgeBase};
pub use generate::{GenerateError, Generation, Generator, Passage};
