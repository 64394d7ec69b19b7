//! Transaction Sessions
//!
//! A `Session` is the unit of work against the `Database`. It is exclusively
//! owned by whoever opened it (a request handler, a batch job) and carries the
//! single `CommitHook` bound to it.
//!
//! ## Lifecycle
//! 1. **Buffering**: `add`, `update`, and `delete` record pending writes, coalesced
//!    per row so each row appears in at most one pending set.
//! 2. **Pre-commit**: `commit` hands the pending sets to the hook.
//! 3. **Apply**: the writes are applied atomically, or not at all.
//! 4. **Post-commit**: only after a successful apply, the hook is consumed and its
//!    outcome returned to the caller.
//!
//! `rollback`, a failed apply, or simply dropping the session discards the
//! pending writes and the hook without a post-commit call.

use super::memory::Database;
use super::types::*;
use crate::error::{Result, SyncError};

use std::collections::HashMap;
use std::sync::Arc;

/// A buffered write, already coalesced for its row.
#[derive(Debug, Clone)]
pub(crate) enum PendingOp {
    Insert(Arc<dyn Record>),
    Update(Arc<dyn Record>),
    Delete(Arc<dyn Record>),
}

impl PendingOp {
    pub(crate) fn record(&self) -> &Arc<dyn Record> {
        match self {
            PendingOp::Insert(record) | PendingOp::Update(record) | PendingOp::Delete(record) => {
                record
            }
        }
    }
}

type RowKey = (&'static str, EntityId);

pub struct Session<H: CommitHook = ()> {
    db: Arc<Database>,
    /// Pending writes in first-touch order. `None` marks a row whose insert was
    /// cancelled by a later delete.
    ops: Vec<Option<PendingOp>>,
    /// Row -> slot in `ops`.
    slots: HashMap<RowKey, usize>,
    hook: H,
}

impl<H: CommitHook> Session<H> {
    pub(crate) fn new(db: Arc<Database>, hook: H) -> Self {
        Self {
            db,
            ops: Vec::new(),
            slots: HashMap::new(),
            hook,
        }
    }

    /// Stages a new row, assigning its id from the table sequence.
    pub fn add<M: Model>(&mut self, mut model: M) -> EntityId {
        let id = self.db.next_id(M::TABLE);
        model.set_id(id);

        self.slots.insert((M::TABLE, id), self.ops.len());
        self.ops.push(Some(PendingOp::Insert(Arc::new(model))));

        tracing::trace!("Staged insert {} #{}", M::TABLE, id);
        id
    }

    /// Stages a new value for an existing (or pending) row.
    pub fn update<M: Model>(&mut self, model: M) -> Result<()> {
        let key = (M::TABLE, model.id());
        let record: Arc<dyn Record> = Arc::new(model);

        if let Some(&slot) = self.slots.get(&key) {
            let next = match self.ops[slot].take() {
                Some(PendingOp::Insert(_)) => PendingOp::Insert(record),
                Some(PendingOp::Update(_)) => PendingOp::Update(record),
                Some(op @ PendingOp::Delete(_)) => {
                    self.ops[slot] = Some(op);
                    return Err(SyncError::not_found(format!(
                        "{} #{} is pending deletion",
                        key.0, key.1
                    )));
                }
                None => {
                    return Err(SyncError::not_found(format!("{} #{}", key.0, key.1)));
                }
            };
            self.ops[slot] = Some(next);
            return Ok(());
        }

        if self.db.get_record(key.0, key.1).is_none() {
            return Err(SyncError::not_found(format!("{} #{}", key.0, key.1)));
        }

        self.slots.insert(key, self.ops.len());
        self.ops.push(Some(PendingOp::Update(record)));
        Ok(())
    }

    /// Stages removal of a row.
    ///
    /// Deleting a row this session inserted cancels the insert outright.
    pub fn delete<M: Model>(&mut self, id: EntityId) -> Result<()> {
        let key = (M::TABLE, id);

        if let Some(&slot) = self.slots.get(&key) {
            match self.ops[slot].take() {
                Some(PendingOp::Insert(_)) | None => {
                    // Never committed, so there is nothing to remove.
                }
                Some(PendingOp::Update(record)) | Some(PendingOp::Delete(record)) => {
                    self.ops[slot] = Some(PendingOp::Delete(record));
                }
            }
            return Ok(());
        }

        let record = self
            .db
            .get_record(M::TABLE, id)
            .ok_or_else(|| SyncError::not_found(format!("{} #{}", M::TABLE, id)))?;

        self.slots.insert(key, self.ops.len());
        self.ops.push(Some(PendingOp::Delete(record)));
        Ok(())
    }

    /// Reads a row as this session sees it: pending writes first, then committed rows.
    pub fn get<M: Model>(&self, id: EntityId) -> Option<M> {
        if let Some(&slot) = self.slots.get(&(M::TABLE, id)) {
            return match &self.ops[slot] {
                Some(PendingOp::Insert(record)) | Some(PendingOp::Update(record)) => {
                    downcast::<M>(record.as_ref()).cloned()
                }
                Some(PendingOp::Delete(_)) | None => None,
            };
        }
        self.db.get::<M>(id)
    }

    /// Snapshot of the pending sets as they would be committed right now.
    pub fn pending(&self) -> PendingWrites {
        split(self.ops.iter().flatten())
    }

    /// Commits the transaction and returns the hook's post-commit outcome.
    ///
    /// If the writes cannot be applied, the error is returned and the hook is
    /// dropped without ever seeing a post-commit notification.
    pub async fn commit(self) -> Result<H::Outcome> {
        let Session {
            db, ops, mut hook, ..
        } = self;

        let ops: Vec<PendingOp> = ops.into_iter().flatten().collect();
        let pending = split(&ops);

        hook.before_commit(&pending);
        drop(pending);

        let seq = match db.apply(&ops) {
            Ok(seq) => seq,
            Err(e) => {
                tracing::warn!("Commit failed, discarding transaction: {}", e);
                return Err(e);
            }
        };

        tracing::debug!("Committed {} writes as commit {}", ops.len(), seq);
        Ok(hook.after_commit(seq).await)
    }

    /// Discards every pending write and the bound hook.
    pub fn rollback(self) {
        tracing::debug!(
            "Rolled back transaction with {} pending writes",
            self.ops.iter().flatten().count()
        );
    }
}

fn split<'a>(ops: impl IntoIterator<Item = &'a PendingOp>) -> PendingWrites {
    let mut pending = PendingWrites::default();
    for op in ops {
        match op {
            PendingOp::Insert(record) => pending.added.push(record.clone()),
            PendingOp::Update(record) => pending.updated.push(record.clone()),
            PendingOp::Delete(record) => pending.removed.push(record.clone()),
        }
    }
    pending
}
