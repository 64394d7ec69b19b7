//! Deferred Propagation Queue
//!
//! In deferred mode a committed change set is not replayed by the committing
//! caller. It is split into index operations and handed to a fixed pool of
//! workers, so `commit` returns as soon as the primary store is done.
//!
//! ## Partitioning
//! Operations are routed to a worker by hashing their `(index, id)` address.
//! Every write to the same document therefore goes through the same worker, in
//! the order it was enqueued, while writes to unrelated documents proceed in
//! parallel. Enqueue order can still differ from commit order, so every job
//! carries the sequence number of its commit for the `VersionGate`.
//!
//! ## Draining
//! `wait_idle` resolves once every enqueued operation has been attempted. It is
//! the deferred-mode equivalent of "the commit has returned" for anyone who
//! needs read-your-writes through the index (maintenance code, tests).
//!
//! ## Closing
//! `close` drops every lane sender. Workers finish the jobs already buffered in
//! their lane and then exit; anything enqueued afterwards is counted as failed.

use super::types::*;
use crate::search::types::IndexKey;
use crate::storage::types::CommitSeq;

use parking_lot::RwLock;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::{Notify, mpsc};

/// A slice of one committed change set, owned by a single worker.
#[derive(Debug)]
pub struct PropagationJob {
    pub seq: CommitSeq,
    pub ops: Vec<IndexOp>,
    pub enqueued_at: Instant,
}

/// Cumulative counters since the queue was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued_sets: usize,
    pub applied_ops: usize,
    pub superseded_ops: usize,
    pub failed_ops: usize,
}

/// Counters shared by the queue handles and the workers.
#[derive(Default)]
pub(crate) struct QueueState {
    in_flight: AtomicUsize,
    enqueued_sets: AtomicUsize,
    applied_ops: AtomicUsize,
    superseded_ops: AtomicUsize,
    failed_ops: AtomicUsize,
    idle: Notify,
}

impl QueueState {
    pub(crate) fn record(&self, report: &PropagationReport) {
        self.applied_ops
            .fetch_add(report.upserted + report.deleted, Ordering::SeqCst);
        self.superseded_ops
            .fetch_add(report.superseded, Ordering::SeqCst);
        self.failed_ops.fetch_add(report.failed(), Ordering::SeqCst);
    }

    pub(crate) fn finish_job(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

#[derive(Clone)]
pub struct PropagationQueue {
    senders: Arc<RwLock<Vec<mpsc::UnboundedSender<PropagationJob>>>>,
    partitions: usize,
    state: Arc<QueueState>,
}

/// The worker-side half of a queue: one receiver per partition.
///
/// Holds no sender, so the receivers close once the queue is closed.
pub struct QueueReceivers {
    pub(crate) receivers: Vec<mpsc::UnboundedReceiver<PropagationJob>>,
    pub(crate) state: Arc<QueueState>,
}

impl PropagationQueue {
    /// Creates a queue with `partitions` independent lanes.
    pub fn new(partitions: usize) -> (Self, QueueReceivers) {
        let partitions = partitions.max(1);
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..partitions).map(|_| mpsc::unbounded_channel()).unzip();
        let state = Arc::new(QueueState::default());

        let queue = Self {
            senders: Arc::new(RwLock::new(senders)),
            partitions,
            state: state.clone(),
        };
        (queue, QueueReceivers { receivers, state })
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    /// Lane an index document is pinned to.
    pub fn partition_of(&self, key: &IndexKey) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.partitions as u64) as usize
    }

    /// Splits the changes of commit `seq` by partition and hands each part to
    /// its worker.
    pub fn enqueue(&self, seq: CommitSeq, changes: PendingChangeSet) {
        let mut lanes: Vec<Vec<IndexOp>> = vec![Vec::new(); self.partitions];
        for op in changes.into_ops() {
            lanes[self.partition_of(&op.key())].push(op);
        }

        self.state.enqueued_sets.fetch_add(1, Ordering::SeqCst);
        let now = Instant::now();
        let senders = self.senders.read();

        for (partition, ops) in lanes.into_iter().enumerate() {
            if ops.is_empty() {
                continue;
            }
            let count = ops.len();

            self.state.in_flight.fetch_add(1, Ordering::SeqCst);
            let job = PropagationJob {
                seq,
                ops,
                enqueued_at: now,
            };

            let sent = senders
                .get(partition)
                .is_some_and(|sender| sender.send(job).is_ok());
            if sent {
                tracing::trace!(
                    "Enqueued {} index operations of commit {} on lane {}",
                    count,
                    seq,
                    partition
                );
            } else {
                tracing::error!(
                    "Propagation lane {} is closed, dropping {} index operations of commit {}",
                    partition,
                    count,
                    seq
                );
                self.state.failed_ops.fetch_add(count, Ordering::SeqCst);
                self.state.finish_job();
            }
        }
    }

    /// Stops accepting jobs. Workers exit once their lane is drained.
    pub fn close(&self) {
        let mut senders = self.senders.write();
        if !senders.is_empty() {
            tracing::info!("Closing propagation queue with {} pending jobs", self.pending());
            senders.clear();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.senders.read().is_empty()
    }

    /// Number of jobs enqueued but not yet fully attempted.
    pub fn pending(&self) -> usize {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            enqueued_sets: self.state.enqueued_sets.load(Ordering::SeqCst),
            applied_ops: self.state.applied_ops.load(Ordering::SeqCst),
            superseded_ops: self.state.superseded_ops.load(Ordering::SeqCst),
            failed_ops: self.state.failed_ops.load(Ordering::SeqCst),
        }
    }

    /// Waits until every enqueued operation has been attempted.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.state.idle.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}
