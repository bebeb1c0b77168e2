use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A source file could not be turned into text. Ingestion skips the file
    /// and carries on with the rest.
    #[error("Unsupported or unreadable document {path}: {reason}")]
    IngestFormat { path: PathBuf, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The persisted index artifact exists but cannot be used.
    #[error("Index artifact is corrupt or incompatible: {0}")]
    IndexCorrupt(String),

    /// The configured embedding model pin does not match the model that was
    /// actually loaded. Fatal at startup.
    #[error("Embedding model mismatch: configured '{configured}', loaded '{actual}'")]
    EmbeddingModelMismatch { configured: String, actual: String },

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Whether the system can keep serving after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidConfig(_) | Self::EmbeddingModelMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
