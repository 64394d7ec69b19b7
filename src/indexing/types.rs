use crate::search::types::{IndexKey, SearchableRecord};
use crate::storage::types::EntityId;

use serde::Serialize;

/// The searchable part of one transaction's pending writes, projected at the
/// pre-commit instant.
///
/// Owned by the `CommitCoordinator` of that transaction and nobody else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingChangeSet {
    pub added: Vec<SearchableRecord>,
    pub updated: Vec<SearchableRecord>,
    pub removed: Vec<IndexKey>,
}

impl PendingChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }

    /// Flattens the set into index operations: upserts for `added ∪ updated`,
    /// then deletes for `removed`.
    pub fn into_ops(self) -> Vec<IndexOp> {
        let mut ops = Vec::with_capacity(self.len());
        ops.extend(self.added.into_iter().map(IndexOp::Upsert));
        ops.extend(self.updated.into_iter().map(IndexOp::Upsert));
        ops.extend(self.removed.into_iter().map(IndexOp::Delete));
        ops
    }
}

/// A single write against the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOp {
    Upsert(SearchableRecord),
    Delete(IndexKey),
}

impl IndexOp {
    pub fn key(&self) -> IndexKey {
        match self {
            IndexOp::Upsert(record) => record.key(),
            IndexOp::Delete(key) => *key,
        }
    }

    pub fn kind(&self) -> IndexOpKind {
        match self {
            IndexOp::Upsert(_) => IndexOpKind::Upsert,
            IndexOp::Delete(_) => IndexOpKind::Delete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexOpKind {
    Upsert,
    Delete,
}

/// One index write that failed while the rest of its batch went on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexFailure {
    pub index: &'static str,
    pub id: EntityId,
    pub op: IndexOpKind,
    pub error: String,
}

/// Outcome of replaying one committed change set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropagationReport {
    pub upserted: usize,
    pub deleted: usize,
    /// Writes dropped because a newer commit already reached the document.
    pub superseded: usize,
    pub failures: Vec<IndexFailure>,
    /// The set was handed to background workers; the counts above are not yet known.
    pub deferred: bool,
}

impl PropagationReport {
    pub fn deferred() -> Self {
        Self {
            deferred: true,
            ..Self::default()
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Lifecycle of a `CommitCoordinator`, one per transaction.
///
/// `Idle -> Staged -> Applied`, or `Staged -> Discarded` when the transaction
/// never commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Staged,
    Applied,
    Discarded,
}

/// Totals of a full index rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReindexReport {
    pub index: &'static str,
    pub upserted: usize,
    pub failed: usize,
    /// Rows skipped because a newer commit already reached the document.
    pub superseded: usize,
    /// Store offset the next run would resume from.
    pub next_offset: usize,
}
