//! Propagation Worker Pool
//!
//! Drives deferred propagation. Each worker owns one lane of the
//! `PropagationQueue` and replays its jobs against the index client, one job at
//! a time, in arrival order.
//!
//! ## Responsibilities
//! - **Draining**: waiting on the lane and applying every job it receives.
//! - **Ordering**: passing each job's commit sequence to the `VersionGate`.
//! - **Accounting**: folding each job's report into the queue counters and
//!   signalling the queue when a job is done.
//! - **Shutdown**: a worker exits once the queue is closed and its lane is empty.

use super::coordinator::propagate;
use super::ordering::VersionGate;
use super::queue::{PropagationJob, PropagationQueue, QueueReceivers, QueueState};
use crate::search::client::IndexClient;

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct PropagationWorker {
    client: Arc<dyn IndexClient>,
    gate: Arc<VersionGate>,
    state: Arc<QueueState>,
}

impl PropagationWorker {
    pub(crate) fn new(
        client: Arc<dyn IndexClient>,
        gate: Arc<VersionGate>,
        state: Arc<QueueState>,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            gate,
            state,
        })
    }

    /// Spawns one worker per lane and returns their handles.
    pub fn start(
        self: Arc<Self>,
        receivers: Vec<mpsc::UnboundedReceiver<PropagationJob>>,
    ) -> Vec<JoinHandle<()>> {
        tracing::info!("Starting {} propagation workers", receivers.len());

        receivers
            .into_iter()
            .enumerate()
            .map(|(worker_id, receiver)| {
                let worker = self.clone();
                tokio::spawn(async move {
                    worker.worker_loop(worker_id, receiver).await;
                })
            })
            .collect()
    }

    async fn worker_loop(
        &self,
        worker_id: usize,
        mut receiver: mpsc::UnboundedReceiver<PropagationJob>,
    ) {
        tracing::debug!("Propagation worker {} started", worker_id);

        while let Some(job) = receiver.recv().await {
            let count = job.ops.len();
            let waited = job.enqueued_at.elapsed();

            let report = propagate(self.client.as_ref(), &self.gate, job.seq, job.ops).await;
            self.state.record(&report);
            self.state.finish_job();

            tracing::trace!(
                "Worker {} applied {} index operations of commit {} ({} failed) after {:?} in queue",
                worker_id,
                count,
                job.seq,
                report.failed(),
                waited
            );
        }

        tracing::debug!("Propagation worker {} stopped", worker_id);
    }
}

/// Creates a deferred propagation queue served by `worker_count` workers.
///
/// The handles resolve once the queue is closed and drained.
pub fn spawn_workers(
    client: Arc<dyn IndexClient>,
    gate: Arc<VersionGate>,
    worker_count: usize,
) -> (PropagationQueue, Vec<JoinHandle<()>>) {
    let (queue, QueueReceivers { receivers, state }) = PropagationQueue::new(worker_count);
    let handles = PropagationWorker::new(client, gate, state).start(receivers);
    (queue, handles)
}
