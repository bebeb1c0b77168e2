use parking_lot::RwLock;
use std::sync::Arc;

use crate::index::VectorIndex;

/// An immutable, versioned view of the active index.
#[derive(Debug)]
pub struct IndexSnapshot {
    pub index: VectorIndex,
    /// Bumped on every swap; part of the answer cache key.
    pub version: u64,
    /// Recoverable problem from the last load, if any.
    pub warning: Option<String>,
}

/// Single-writer, many-reader slot for the active index. Readers clone an
/// `Arc` and keep querying their snapshot while a swap installs a new one.
pub struct IndexHandle {
    current: RwLock<Arc<IndexSnapshot>>,
}

impl IndexHandle {
    pub fn new(index: VectorIndex, warning: Option<String>) -> Self {
        Self { current: RwLock::new(Arc::new(IndexSnapshot { index, version: 0, warning })) }
    }

    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.current.read().clone()
    }

    /// Install `index` as the active index and return its version.
    pub fn swap(&self, index: VectorIndex) -> u64 {
        let mut slot = self.current.write();
        let version = slot.version + 1;
        *slot = Arc::new(IndexSnapshot { index, version, warning: None });
        version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn old_snapshot_survives_swap() {
        let handle = IndexHandle::new(VectorIndex::empty("m", 2), Some("missing".into()));
        let before = handle.snapshot();
        assert_eq!(handle.swap(VectorIndex::empty("m", 2)), 1);
        assert_eq!(before.version, 0);
        assert_eq!(before.warning.as_deref(), Some("missing"));
        let after = handle.snapshot();
        assert_eq!(after.version, 1);
        assert!(after.warning.is_none());
    }
}
