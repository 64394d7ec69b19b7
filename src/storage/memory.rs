use super::session::{PendingOp, Session};
use super::types::*;
use crate::error::{Result, SyncError};

use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// A single table: primary-key ordered rows plus the id sequence.
#[derive(Default)]
struct Table {
    rows: RwLock<BTreeMap<EntityId, Arc<dyn Record>>>,
    next_id: AtomicI64,
}

/// The in-memory primary store.
///
/// Writes only happen through `Session::commit`. A commit holds `commits` for
/// writing while it applies, and every read holds it for reading, so readers
/// see each transaction entirely or not at all.
pub struct Database {
    tables: DashMap<&'static str, Arc<Table>>,
    /// Sequence number of the last applied commit.
    commits: RwLock<CommitSeq>,
}

impl Database {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tables: DashMap::new(),
            commits: RwLock::new(0),
        })
    }

    /// Opens a transaction with no observers.
    pub fn begin(self: &Arc<Self>) -> Session<()> {
        Session::new(self.clone(), ())
    }

    /// Opens a transaction observed by `hook`, and only by it.
    pub fn begin_with<H: CommitHook>(self: &Arc<Self>, hook: H) -> Session<H> {
        Session::new(self.clone(), hook)
    }

    fn table(&self, name: &'static str) -> Arc<Table> {
        self.tables
            .entry(name)
            .or_insert_with(|| Arc::new(Table::default()))
            .clone()
    }

    fn existing_table(&self, name: &'static str) -> Option<Arc<Table>> {
        self.tables.get(name).map(|table| table.clone())
    }

    pub(crate) fn next_id(&self, table: &'static str) -> EntityId {
        self.table(table).next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Row lookup without taking the commit lock.
    fn row(&self, table: &'static str, id: EntityId) -> Option<Arc<dyn Record>> {
        let table = self.existing_table(table)?;
        let rows = table.rows.read();
        rows.get(&id).cloned()
    }

    pub(crate) fn get_record(&self, table: &'static str, id: EntityId) -> Option<Arc<dyn Record>> {
        let _commits = self.commits.read();
        self.row(table, id)
    }

    /// Sequence number of the most recent commit, 0 before the first one.
    pub fn last_commit(&self) -> CommitSeq {
        *self.commits.read()
    }

    /// Reads one committed row.
    pub fn get<M: Model>(&self, id: EntityId) -> Option<M> {
        self.get_record(M::TABLE, id)
            .and_then(|record| downcast::<M>(record.as_ref()).cloned())
    }

    /// Number of committed rows in `M`'s table.
    pub fn count<M: Model>(&self) -> usize {
        let _commits = self.commits.read();
        self.existing_table(M::TABLE)
            .map(|table| table.rows.read().len())
            .unwrap_or(0)
    }

    /// Bulk lookup of `ids` in one pass over the table.
    ///
    /// Rows come back in primary-key order, not in the order of `ids`.
    /// Ids without a row are skipped.
    pub fn fetch_by_ids<M: Model>(&self, ids: &[EntityId]) -> Vec<M> {
        let _commits = self.commits.read();
        let Some(table) = self.existing_table(M::TABLE) else {
            return Vec::new();
        };

        let mut wanted: Vec<EntityId> = ids.to_vec();
        wanted.sort_unstable();
        wanted.dedup();

        let rows = table.rows.read();
        wanted
            .iter()
            .filter_map(|id| rows.get(id))
            .filter_map(|record| downcast::<M>(record.as_ref()).cloned())
            .collect()
    }

    /// One primary-key ordered page of `M`'s table.
    pub fn scan<M: Model>(&self, offset: usize, limit: usize) -> Vec<M> {
        self.scan_at::<M>(offset, limit).1
    }

    /// Like `scan`, also returning the commit the page reflects.
    pub fn scan_at<M: Model>(&self, offset: usize, limit: usize) -> (CommitSeq, Vec<M>) {
        let commits = self.commits.read();
        let Some(table) = self.existing_table(M::TABLE) else {
            return (*commits, Vec::new());
        };

        let rows = table.rows.read();
        let page = rows
            .values()
            .skip(offset)
            .take(limit)
            .filter_map(|record| downcast::<M>(record.as_ref()).cloned())
            .collect();
        (*commits, page)
    }

    /// Applies a transaction's writes atomically and returns its sequence number.
    ///
    /// Every update and delete must still target an existing row, and no two
    /// rows of a table may share a unique key afterwards; otherwise nothing is
    /// applied and the commit fails with `Conflict`.
    pub(crate) fn apply(&self, ops: &[PendingOp]) -> Result<CommitSeq> {
        let mut commits = self.commits.write();

        self.validate(ops)?;

        for op in ops {
            match op {
                PendingOp::Insert(record) | PendingOp::Update(record) => {
                    let table = self.table(record.table_name());
                    table
                        .rows
                        .write()
                        .insert(record.record_id(), record.clone());
                }
                PendingOp::Delete(record) => {
                    let table = self.table(record.table_name());
                    table.rows.write().remove(&record.record_id());
                }
            }
        }

        *commits += 1;
        tracing::debug!("Applied {} pending writes as commit {}", ops.len(), *commits);
        Ok(*commits)
    }

    /// Must be called with the commit lock held for writing.
    fn validate(&self, ops: &[PendingOp]) -> Result<()> {
        let mut touched: HashSet<(&'static str, EntityId)> = HashSet::new();

        for op in ops {
            let record = op.record();
            touched.insert((record.table_name(), record.record_id()));

            if let PendingOp::Update(record) | PendingOp::Delete(record) = op
                && self.row(record.table_name(), record.record_id()).is_none()
            {
                return Err(SyncError::conflict(format!(
                    "{} #{} no longer exists",
                    record.table_name(),
                    record.record_id()
                )));
            }
        }

        let mut claimed: HashMap<(&'static str, String), EntityId> = HashMap::new();
        for op in ops {
            let (PendingOp::Insert(record) | PendingOp::Update(record)) = op else {
                continue;
            };
            let Some(key) = record.unique_key() else {
                continue;
            };
            let table_name = record.table_name();

            if let Some(other) = claimed.insert((table_name, key.clone()), record.record_id()) {
                return Err(SyncError::conflict(format!(
                    "{} #{} and #{} share unique key '{}'",
                    table_name,
                    other,
                    record.record_id(),
                    key
                )));
            }

            let Some(table) = self.existing_table(table_name) else {
                continue;
            };
            let rows = table.rows.read();
            let holder = rows.values().find(|row| {
                !touched.contains(&(table_name, row.record_id()))
                    && row.unique_key().as_deref() == Some(key.as_str())
            });
            if let Some(holder) = holder {
                return Err(SyncError::conflict(format!(
                    "{} '{}' is already taken by #{}",
                    table_name,
                    key,
                    holder.record_id()
                )));
            }
        }

        Ok(())
    }
}
