//! ---
//! cops_section: "03-state-stores"
//! cops_subsection: "module"
//! cops_type: "source"
//! cops_scope: "code"
//! cops_description: "In-memory state containers for the console session."
//! cops_version: "v0.0.0-prealpha"
//! cops_owner: "tbd"
//! ---
use c_ops_model::{TwinKey, TwinSnapshot};

/// Live twin collection, replaced wholesale by every feed frame.
///
/// The feed publishes complete snapshots, never deltas; the collection
/// therefore has no merge or patch path. Order is preserved as published.
#[derive(Debug, Clone, Default)]
pub struct TwinCollection {
    twins: Vec<TwinSnapshot>,
    revision: u64,
}

impl TwinCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire collection with a freshly published one.
    pub fn replace(&mut self, twins: Vec<TwinSnapshot>) {
        self.twins = twins;
        self.revision += 1;
    }

    pub fn get(&self, key: &TwinKey) -> Option<&TwinSnapshot> {
        self.twins.iter().find(|twin| &twin.key() == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TwinSnapshot> {
        self.twins.iter()
    }

    /// Owned copy of the collection, in published order.
    pub fn snapshot(&self) -> Vec<TwinSnapshot> {
        self.twins.clone()
    }

    pub fn len(&self) -> usize {
        self.twins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.twins.is_empty()
    }

    /// Monotonic counter bumped on every replacement. Consumed by the
    /// view cache.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}
