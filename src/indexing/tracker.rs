use super::registry::SearchRegistry;
use super::types::PendingChangeSet;
use crate::storage::types::PendingWrites;

use std::sync::Arc;

/// Filters a transaction's raw pending writes down to searchable entities.
///
/// Pure: it reads the pending rows and the registry, nothing else. In
/// particular it never queries the store, which could disturb the very
/// pending state it is looking at.
#[derive(Clone)]
pub struct ChangeTracker {
    registry: Arc<SearchRegistry>,
}

impl ChangeTracker {
    pub fn new(registry: Arc<SearchRegistry>) -> Self {
        Self { registry }
    }

    /// Projects the searchable rows of `pending` into a `PendingChangeSet`.
    ///
    /// Must run at the pre-commit instant: once the commit is applied the
    /// pending sets no longer exist.
    pub fn snapshot(&self, pending: &PendingWrites) -> PendingChangeSet {
        let changes = PendingChangeSet {
            added: pending
                .added
                .iter()
                .filter_map(|record| self.registry.project(record.as_ref()))
                .collect(),
            updated: pending
                .updated
                .iter()
                .filter_map(|record| self.registry.project(record.as_ref()))
                .collect(),
            removed: pending
                .removed
                .iter()
                .filter_map(|record| self.registry.index_key(record.as_ref()))
                .collect(),
        };

        tracing::trace!(
            "Snapshot: {} of {} pending writes are searchable",
            changes.len(),
            pending.len()
        );
        changes
    }
}
