//! studydb-text
//!
//! Shared text analysis: one tantivy analyzer chain used for lexical
//! reranking, fallback trigger matching and the hashing embedder, so every
//! component agrees on what a term is.

pub mod analyzer;

pub use analyzer::{contains_phrase, term_overlap, tokenize, Analyzer};
