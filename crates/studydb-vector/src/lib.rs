//! studydb-vector
//!
//! Embedding index, its on-disk artifact, the swappable active-index handle
//! and the reranking retriever.

pub mod artifact;
pub mod handle;
pub mod index;
pub mod retriever;

pub use handle::{IndexHandle, IndexSnapshot};
pub use index::{build_progress_bar, passage_text, IndexEntry, Neighbor, VectorIndex};
pub use retriever::{Retrieved, Retriever};
