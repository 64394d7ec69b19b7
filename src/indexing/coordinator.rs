//! Commit Boundary Propagation
//!
//! A `CommitCoordinator` is bound to exactly one transaction. It turns the
//! store's pre-commit and post-commit notifications into index writes, and it
//! guarantees the index never sees a change whose transaction did not commit.
//!
//! ## State Machine
//! - **Idle -> Staged**: pre-commit. The `ChangeTracker` snapshot is stored on
//!   the coordinator itself, never in shared state, so concurrent transactions
//!   cannot see each other's sets.
//! - **Staged -> Applied**: post-commit, which only fires after a successful
//!   commit. Upserts for `added ∪ updated`, deletes for `removed`.
//! - **Staged -> Discarded**: the coordinator is dropped without a post-commit
//!   notification (rollback, failed commit, abandoned session). No index call
//!   is made.
//!
//! ## Ordering
//! Every write carries the sequence number of the commit it came from and goes
//! through the shared `VersionGate`, so a document never moves back to an
//! older committed value, whatever order concurrent commits propagate in.
//!
//! ## Failure Policy
//! By the time propagation runs the primary commit is permanent, so index
//! failures cannot fail it. Each failing write is recorded and the batch goes
//! on; the collected failures are logged and returned in the report.

use super::ordering::{Admission, VersionGate};
use super::queue::PropagationQueue;
use super::registry::SearchRegistry;
use super::tracker::ChangeTracker;
use super::types::*;
use crate::search::client::IndexClient;
use crate::storage::types::{CommitHook, CommitSeq, PendingWrites};

use std::sync::Arc;

/// When a committed change set is replayed against the index.
#[derive(Clone)]
pub enum Propagation {
    /// Before `commit` returns to the caller.
    Synchronous,
    /// By background workers, right after the commit.
    Deferred(PropagationQueue),
}

impl std::fmt::Debug for Propagation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Propagation::Synchronous => f.write_str("Synchronous"),
            Propagation::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

pub struct CommitCoordinator {
    tracker: ChangeTracker,
    client: Arc<dyn IndexClient>,
    gate: Arc<VersionGate>,
    propagation: Propagation,
    staged: Option<PendingChangeSet>,
    state: CoordinatorState,
}

impl CommitCoordinator {
    pub fn new(
        registry: Arc<SearchRegistry>,
        client: Arc<dyn IndexClient>,
        gate: Arc<VersionGate>,
        propagation: Propagation,
    ) -> Self {
        Self {
            tracker: ChangeTracker::new(registry),
            client,
            gate,
            propagation,
            staged: None,
            state: CoordinatorState::Idle,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// The set staged at pre-commit, if any.
    pub fn staged(&self) -> Option<&PendingChangeSet> {
        self.staged.as_ref()
    }
}

impl CommitHook for CommitCoordinator {
    type Outcome = PropagationReport;

    fn before_commit(&mut self, pending: &PendingWrites) {
        if self.state != CoordinatorState::Idle {
            tracing::warn!(
                "Pre-commit notification in state {:?}, ignoring",
                self.state
            );
            return;
        }

        let changes = self.tracker.snapshot(pending);
        tracing::debug!(
            "Staged {} added, {} updated, {} removed searchable rows",
            changes.added.len(),
            changes.updated.len(),
            changes.removed.len()
        );

        self.staged = Some(changes);
        self.state = CoordinatorState::Staged;
    }

    async fn after_commit(mut self, seq: CommitSeq) -> PropagationReport {
        let Some(changes) = self.staged.take() else {
            tracing::warn!("Post-commit notification without a staged change set");
            return PropagationReport::default();
        };
        self.state = CoordinatorState::Applied;

        if changes.is_empty() {
            return PropagationReport::default();
        }

        match &self.propagation {
            Propagation::Synchronous => {
                propagate(self.client.as_ref(), &self.gate, seq, changes.into_ops()).await
            }
            Propagation::Deferred(queue) => {
                queue.enqueue(seq, changes);
                PropagationReport::deferred()
            }
        }
    }
}

impl Drop for CommitCoordinator {
    fn drop(&mut self) {
        if let Some(changes) = self.staged.take() {
            self.state = CoordinatorState::Discarded;
            tracing::debug!(
                "Transaction did not commit, discarded {} staged index changes",
                changes.len()
            );
        }
    }
}

/// Replays the index operations of commit `seq` one by one, never stopping
/// at a failure.
pub async fn propagate(
    client: &dyn IndexClient,
    gate: &VersionGate,
    seq: CommitSeq,
    ops: Vec<IndexOp>,
) -> PropagationReport {
    let mut report = PropagationReport::default();
    let total = ops.len();

    for op in ops {
        let key = op.key();
        let kind = op.kind();
        let result = gate
            .admit(key, seq, || async move {
                match op {
                    IndexOp::Upsert(record) => {
                        client.upsert(record.index, record.id, &record.fields).await
                    }
                    IndexOp::Delete(key) => client.delete(key.index, key.id).await,
                }
            })
            .await;

        match (result, kind) {
            (Ok(Admission::Superseded), _) => report.superseded += 1,
            (Ok(Admission::Applied), IndexOpKind::Upsert) => report.upserted += 1,
            (Ok(Admission::Applied), IndexOpKind::Delete) => report.deleted += 1,
            (Err(e), kind) => {
                tracing::warn!("Index {:?} of {}#{} failed: {}", kind, key.index, key.id, e);
                report.failures.push(IndexFailure {
                    index: key.index,
                    id: key.id,
                    op: kind,
                    error: e.to_string(),
                });
            }
        }
    }

    if report.is_clean() {
        tracing::debug!(
            "Propagated commit {}: {} upserts, {} deletes, {} superseded",
            seq,
            report.upserted,
            report.deleted,
            report.superseded
        );
    } else {
        tracing::error!(
            "{} of {} index operations failed; index is stale until the next write or reindex",
            report.failed(),
            total
        );
    }
    report
}
