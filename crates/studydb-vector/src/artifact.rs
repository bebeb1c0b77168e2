//! Single-file, versioned index artifact.
//!
//! Layout (JSON): `format_version`, `model_version`, `dimension`, `metric`,
//! `documents`, `entries[{chunk, vector}]`. Writes go to a temp file in the
//! target directory and are renamed into place, so a crash never leaves a
//! half-written artifact behind.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use studydb_core::error::{Error, Result};
use studydb_core::types::DocumentSummary;

use crate::index::{IndexEntry, VectorIndex};

pub const FORMAT_VERSION: u32 = 1;
pub const METRIC: &str = "cosine";

#[derive(Serialize, Deserialize)]
struct Artifact {
    format_version: u32,
    model_version: String,
    dimension: usize,
    metric: String,
    documents: Vec<DocumentSummary>,
    entries: Vec<IndexEntry>,
}

/// Result of [`load`]: always an index, plus a warning when the artifact
/// could not be used and an empty index was substituted.
#[derive(Debug)]
pub struct Loaded {
    pub index: VectorIndex,
    pub warning: Option<String>,
}

pub fn to_bytes(index: &VectorIndex) -> Result<Vec<u8>> {
    let artifact = Artifact {
        format_version: FORMAT_VERSION,
        model_version: index.model_version.clone(),
        dimension: index.dimension,
        metric: METRIC.to_string(),
        documents: index.documents.clone(),
        entries: index.entries.clone(),
    };
    serde_json::to_vec(&artifact).map_err(|e| Error::Operation(format!("serialize index: {e}")))
}

pub fn persist(index: &VectorIndex, path: &Path) -> Result<()> {
    let bytes = to_bytes(index)?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    tmp.write_all(&bytes).map_err(|e| Error::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| Error::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    info!("persisted index artifact {} ({} entries, {} bytes)", path.display(), index.len(), bytes.len());
    Ok(())
}

/// Parse artifact bytes, checking them against the expected model pin.
pub fn from_bytes(bytes: &[u8], expected_model: &str, expected_dimension: usize) -> Result<VectorIndex> {
    let artifact: Artifact =
        serde_json::from_slice(bytes).map_err(|e| Error::IndexCorrupt(format!("unreadable artifact: {e}")))?;
    if artifact.format_version != FORMAT_VERSION {
        return Err(Error::IndexCorrupt(format!("unsupported format version {}", artifact.format_version)));
    }
    if artifact.metric != METRIC {
        return Err(Error::IndexCorrupt(format!("artifact uses metric '{}'", artifact.metric)));
    }
    if artifact.model_version != expected_model || artifact.dimension != expected_dimension {
        return Err(Error::IndexCorrupt(format!(
            "artifact built with model '{}' (dim {}), configured '{}' (dim {})",
            artifact.model_version, artifact.dimension, expected_model, expected_dimension
        )));
    }
    if let Some(bad) = artifact.entries.iter().find(|e| e.vector.len() != artifact.dimension) {
        return Err(Error::IndexCorrupt(format!(
            "entry {}#{} has {} components",
            bad.chunk.document_id,
            bad.chunk.index,
            bad.vector.len()
        )));
    }
    Ok(VectorIndex {
        model_version: artifact.model_version,
        dimension: artifact.dimension,
        documents: artifact.documents,
        entries: artifact.entries,
    })
}

/// Load the artifact at `path`. Never fails: a missing, corrupt or
/// incompatible artifact yields an empty index and a warning.
pub fn load(path: &Path, expected_model: &str, expected_dimension: usize) -> Loaded {
    let empty = || VectorIndex::empty(expected_model, expected_dimension);
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("no index artifact at {}, starting empty", path.display());
            return Loaded { index: empty(), warning: Some(format!("no index artifact at {}", path.display())) };
        }
        Err(e) => {
            let err = Error::io(path, e);
            warn!("{err}");
            return Loaded { index: empty(), warning: Some(err.to_string()) };
        }
    };
    match from_bytes(&bytes, expected_model, expected_dimension) {
        Ok(index) => {
            info!("loaded index artifact {} ({} entries)", path.display(), index.len());
            Loaded { index, warning: None }
        }
        Err(err) => {
            warn!("ignoring index artifact {}: {}", path.display(), err);
            Loaded { index: empty(), warning: Some(err.to_string()) }
        }
    }
}
