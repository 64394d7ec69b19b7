use super::coordinator::{CommitCoordinator, Propagation};
use super::ordering::VersionGate;
use super::queue::PropagationQueue;
use super::registry::SearchRegistry;
use super::reindex::Reindexer;
use super::types::ReindexReport;
use super::worker::spawn_workers;
use crate::config::{Config, PropagationMode};
use crate::error::Result;
use crate::search::client::{IndexClient, index_client_from_config};
use crate::search::merger::QueryMerger;
use crate::search::types::{Page, Searchable};
use crate::storage::memory::Database;
use crate::storage::session::Session;

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_REINDEX_BATCH: usize = 500;

/// Entry point of the sync layer.
///
/// Owns the wiring between the primary store, the registry of searchable
/// types, and the index client. Application code opens its transactions
/// through [`SearchSync::begin`] so every session carries its own
/// `CommitCoordinator`, and runs searches through [`SearchSync::search`].
///
/// In deferred mode it also owns the worker pool; call
/// [`SearchSync::shutdown`] to drain it before exiting.
pub struct SearchSync {
    db: Arc<Database>,
    registry: Arc<SearchRegistry>,
    client: Arc<dyn IndexClient>,
    gate: Arc<VersionGate>,
    propagation: Propagation,
    workers: Mutex<Vec<JoinHandle<()>>>,
    query_timeout: Duration,
    reindex_batch: usize,
}

impl SearchSync {
    /// Synchronous propagation with default timeouts.
    pub fn new(
        db: Arc<Database>,
        registry: Arc<SearchRegistry>,
        client: Arc<dyn IndexClient>,
    ) -> Self {
        Self {
            db,
            registry,
            client,
            gate: VersionGate::new(),
            propagation: Propagation::Synchronous,
            workers: Mutex::new(Vec::new()),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            reindex_batch: DEFAULT_REINDEX_BATCH,
        }
    }

    /// Switches to deferred propagation served by `workers` background workers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_deferred(mut self, workers: usize) -> Self {
        let (queue, handles) = spawn_workers(self.client.clone(), self.gate.clone(), workers);
        self.propagation = Propagation::Deferred(queue);
        self.workers.get_mut().extend(handles);
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_reindex_batch(mut self, batch: usize) -> Self {
        self.reindex_batch = batch.max(1);
        self
    }

    /// Builds the index client and, in deferred mode, starts the worker pool.
    ///
    /// Must be called from within a tokio runtime when propagation is deferred.
    pub fn from_config(
        config: &Config,
        db: Arc<Database>,
        registry: Arc<SearchRegistry>,
    ) -> Result<Arc<Self>> {
        let client = index_client_from_config(config)?;

        let mut sync = Self::new(db, registry, client)
            .with_query_timeout(Duration::from_millis(config.query_timeout_ms))
            .with_reindex_batch(config.reindex_batch);
        if config.propagation == PropagationMode::Deferred {
            sync = sync.with_deferred(config.workers);
        }

        tracing::info!(
            "Search sync ready: {} searchable tables, {:?} propagation",
            sync.registry.len(),
            sync.propagation
        );
        Ok(Arc::new(sync))
    }

    /// Opens a transaction whose committed searchable changes reach the index.
    pub fn begin(&self) -> Session<CommitCoordinator> {
        self.db.begin_with(self.coordinator())
    }

    /// A fresh coordinator, bound to nothing yet.
    pub fn coordinator(&self) -> CommitCoordinator {
        CommitCoordinator::new(
            self.registry.clone(),
            self.client.clone(),
            self.gate.clone(),
            self.propagation.clone(),
        )
    }

    pub fn merger(&self) -> QueryMerger {
        QueryMerger::new(self.client.clone(), self.db.clone(), self.query_timeout)
    }

    pub fn reindexer(&self) -> Reindexer {
        Reindexer::new(
            self.db.clone(),
            self.client.clone(),
            self.gate.clone(),
            self.reindex_batch,
        )
    }

    pub async fn search<T: Searchable>(
        &self,
        query: &str,
        page: usize,
        per_page: usize,
    ) -> Result<Page<T>> {
        self.merger().search::<T>(query, page, per_page).await
    }

    /// Rebuilds the index registered as `index_name` from the store.
    pub async fn rebuild(&self, index_name: &str) -> Result<ReindexReport> {
        self.registry.rebuild(index_name, &self.reindexer()).await
    }

    pub async fn rebuild_all(&self) -> Vec<ReindexReport> {
        self.registry.rebuild_all(&self.reindexer()).await
    }

    /// Resolves once every deferred change set has been attempted. Immediate in
    /// synchronous mode.
    pub async fn wait_propagated(&self) {
        if let Propagation::Deferred(queue) = &self.propagation {
            queue.wait_idle().await;
        }
    }

    /// Closes the deferred queue and waits for the workers to drain it.
    ///
    /// Commits made afterwards still succeed in the store, but their index
    /// writes are dropped and counted as failed. Immediate in synchronous mode.
    pub async fn shutdown(&self) {
        let Propagation::Deferred(queue) = &self.propagation else {
            return;
        };
        queue.close();

        let handles = std::mem::take(&mut *self.workers.lock());
        let count = handles.len();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Propagation worker ended abnormally: {}", e);
            }
        }

        let stats = queue.stats();
        tracing::info!(
            "Stopped {} propagation workers: {} applied, {} superseded, {} failed",
            count,
            stats.applied_ops,
            stats.superseded_ops,
            stats.failed_ops
        );
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn registry(&self) -> &Arc<SearchRegistry> {
        &self.registry
    }

    pub fn client(&self) -> &Arc<dyn IndexClient> {
        &self.client
    }

    pub fn propagation(&self) -> &Propagation {
        &self.propagation
    }

    /// The deferred queue, if propagation is deferred.
    pub fn queue(&self) -> Option<&PropagationQueue> {
        match &self.propagation {
            Propagation::Deferred(queue) => Some(queue),
            Propagation::Synchronous => None,
        }
    }

    pub fn gate(&self) -> &Arc<VersionGate> {
        &self.gate
    }

    pub fn is_search_enabled(&self) -> bool {
        self.client.is_enabled()
    }
}
