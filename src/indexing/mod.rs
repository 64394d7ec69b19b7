//! Index Sync Module
//!
//! Keeps the search index consistent with the primary store across transaction
//! boundaries.
//!
//! ## Architecture Overview
//! 1. **Registration**: searchable models are listed once in a `SearchRegistry`.
//! 2. **Capture**: every transaction opened through `SearchSync::begin` carries its
//!    own `CommitCoordinator`. At pre-commit it asks the `ChangeTracker` for the
//!    searchable part of the pending writes and keeps it privately.
//! 3. **Propagation**: after a successful commit the staged set is replayed as
//!    upserts and deletes, either inline or through the partitioned
//!    `PropagationQueue`. A rollback drops the set without touching the index.
//!    Every write is tagged with its commit sequence and passes the
//!    `VersionGate`, so concurrent commits land in commit order per document.
//! 4. **Repair**: `Reindexer` rebuilds an index from the store in bounded batches.
//!
//! ## Submodules
//! - **`coordinator`**: Per-transaction state machine and the propagation loop.
//! - **`ordering`**: Per-document commit ordering of index writes.
//! - **`queue`**: Per-document ordered lanes for deferred propagation.
//! - **`registry`**: Searchable types and their erased projection / rebuild entry points.
//! - **`reindex`**: Batched full rebuild.
//! - **`service`**: `SearchSync`, the wiring facade.
//! - **`tracker`**: Pending writes -> `PendingChangeSet`.
//! - **`worker`**: Background workers draining the queue.

pub mod coordinator;
pub mod ordering;
pub mod queue;
pub mod registry;
pub mod reindex;
pub mod service;
pub mod tracker;
pub mod types;
pub mod worker;
