use std::any::Any;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

/// Numeric primary key shared by every table.
pub type EntityId = i64;

/// Position of a commit in the store's total commit order. The first
/// successful commit is 1.
pub type CommitSeq = u64;

/// A row type stored in the primary store.
///
/// Implementors name their table and expose their identity. The store assigns
/// ids on insert through `set_id`.
pub trait Model: Clone + Debug + Send + Sync + 'static {
    /// Table name, unique across the database.
    const TABLE: &'static str;

    fn id(&self) -> EntityId;

    fn set_id(&mut self, id: EntityId);

    /// Value that must be unique across the table, checked at commit.
    fn unique_key(&self) -> Option<String> {
        None
    }
}

/// Type-erased view of a stored row.
///
/// Pending sets mix rows of different tables, so they are carried as
/// `Arc<dyn Record>` and downcast back to a concrete `Model` where needed.
pub trait Record: Debug + Send + Sync {
    fn table_name(&self) -> &'static str;

    fn record_id(&self) -> EntityId;

    fn unique_key(&self) -> Option<String>;

    fn as_any(&self) -> &dyn Any;
}

impl<M: Model> Record for M {
    fn table_name(&self) -> &'static str {
        M::TABLE
    }

    fn record_id(&self) -> EntityId {
        self.id()
    }

    fn unique_key(&self) -> Option<String> {
        Model::unique_key(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Recovers a concrete model from an erased row, if the types line up.
pub fn downcast<M: Model>(record: &dyn Record) -> Option<&M> {
    record.as_any().downcast_ref::<M>()
}

/// The raw pending sets of an about-to-commit transaction.
///
/// Only valid before the commit is applied; afterwards the session that
/// produced it no longer exists.
#[derive(Debug, Default, Clone)]
pub struct PendingWrites {
    pub added: Vec<Arc<dyn Record>>,
    pub updated: Vec<Arc<dyn Record>>,
    pub removed: Vec<Arc<dyn Record>>,
}

impl PendingWrites {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }
}

/// Observer bound to a single transaction.
///
/// `before_commit` fires once, just before the pending writes are applied.
/// `after_commit` fires only if the commit succeeded and consumes the hook, so
/// no hook can be applied twice; it receives the sequence number of that
/// commit. A hook dropped without `after_commit` belongs to a transaction that
/// rolled back or was abandoned.
pub trait CommitHook: Send {
    type Outcome: Send;

    fn before_commit(&mut self, pending: &PendingWrites);

    fn after_commit(self, seq: CommitSeq) -> impl Future<Output = Self::Outcome> + Send;
}

/// The hook of a plain session: observes nothing.
impl CommitHook for () {
    type Outcome = ();

    fn before_commit(&mut self, _pending: &PendingWrites) {}

    async fn after_commit(self, _seq: CommitSeq) {}
}
