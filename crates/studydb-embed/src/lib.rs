//! studydb-embed
//!
//! Embedders behind the core `Embedder` trait: a deterministic hashing
//! embedder that needs no model files, and BGE-M3 on candle.

pub mod bge;
pub mod device;
pub mod hashing;
pub mod pool;
pub mod tokenize;

use std::sync::Arc;

use studydb_core::config::{EmbeddingProvider, EmbeddingSettings};
use studydb_core::traits::Embedder;

pub use bge::BgeM3Embedder;
pub use hashing::HashingEmbedder;
pub use pool::masked_mean_l2;

/// Build the embedder the settings ask for. The caller compares its
/// `model_id()` against the configured pin.
pub fn get_embedder(settings: &EmbeddingSettings) -> anyhow::Result<Arc<dyn Embedder>> {
    match settings.provider {
        EmbeddingProvider::Hashing => {
            tracing::info!("using hashing embedder (dim {})", settings.dimension);
            Ok(Arc::new(HashingEmbedder::new(settings.dimension)))
        }
        EmbeddingProvider::BgeM3 => {
            let dir = bge::resolve_model_dir(settings.model_dir.as_deref())?;
            Ok(Arc::new(BgeM3Embedder::new(&dir, settings.max_len)?))
        }
    }
}
