//! studydb-core
//!
//! Configuration, error taxonomy, domain types and the ingestor (format
//! extraction, subject inference, chunking).

pub mod chunker;
pub mod config;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod traits;
pub mod types;

pub use config::{Config, Settings};
pub use error::{Error, Result};
pub use ingest::{IngestReport, Ingestor};
