use std::collections::BTreeMap;

use crate::error::{BalloonError, Result};
use crate::id::SnapshotId;
use crate::store::SnapshotStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum IndexState {
    /// Index lists every stored snapshot.
    #[default]
    Derived,
    Explicit(Vec<String>),
    Unavailable,
}

/// In-process store, mainly for embedding callers and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    snapshots: BTreeMap<String, String>,
    index: IndexState,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_snapshot(mut self, id: impl Into<String>, content: impl Into<String>) -> Self {
        self.snapshots.insert(id.into(), content.into());
        self
    }

    /// Advertises exactly `ids`, which may name snapshots that are not stored.
    #[must_use]
    pub fn with_index<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.index = IndexState::Explicit(ids.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_unavailable_index(mut self) -> Self {
        self.index = IndexState::Unavailable;
        self
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn list_snapshots(&self) -> Result<Vec<String>> {
        match &self.index {
            IndexState::Derived => Ok(self.snapshots.keys().cloned().collect()),
            IndexState::Explicit(ids) => Ok(ids.clone()),
            IndexState::Unavailable => Err(BalloonError::IndexFetch {
                source_name: self.describe(),
                reason: "index unavailable".to_string(),
            }),
        }
    }

    fn fetch_snapshot(&self, id: &SnapshotId) -> Result<String> {
        self.snapshots
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| BalloonError::SnapshotFetch {
                id: id.to_string(),
                reason: "not stored".to_string(),
            })
    }
}
