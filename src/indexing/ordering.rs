//! Per-Document Commit Ordering
//!
//! Propagation runs after the store has released its commit lock, so two
//! commits touching the same row can reach the index in either order. The
//! `VersionGate` restores commit order per document: it remembers the sequence
//! number of the last write applied to each `(index, id)` and refuses any write
//! from an older commit.
//!
//! The check and the write happen under one per-document lock. A slow write
//! therefore holds back later writes to the same document, never writes to
//! other documents. Entries are kept after deletes so a late upsert cannot
//! resurrect a deleted document.

use crate::error::Result;
use crate::search::types::IndexKey;
use crate::storage::types::CommitSeq;

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Applied,
    /// A newer commit already reached the index; the write was dropped.
    Superseded,
}

#[derive(Default)]
pub struct VersionGate {
    applied: DashMap<IndexKey, Arc<Mutex<CommitSeq>>>,
}

impl VersionGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn slot(&self, key: IndexKey) -> Arc<Mutex<CommitSeq>> {
        self.applied.entry(key).or_default().clone()
    }

    /// Runs `write` for `key` on behalf of commit `seq`, unless a newer commit
    /// already wrote that document.
    ///
    /// Replaying the same sequence number is allowed, so an idempotent rebuild
    /// can rewrite what it wrote before. A failed write leaves the recorded
    /// sequence untouched.
    pub async fn admit<F, Fut>(
        &self,
        key: IndexKey,
        seq: CommitSeq,
        write: F,
    ) -> Result<Admission>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let slot = self.slot(key);
        let mut applied = slot.lock().await;

        if seq < *applied {
            tracing::debug!(
                "Dropping write to {}#{} from commit {}, index already at commit {}",
                key.index,
                key.id,
                seq,
                *applied
            );
            return Ok(Admission::Superseded);
        }

        write().await?;
        *applied = seq;
        Ok(Admission::Applied)
    }

    /// Sequence of the last write applied to `key`, if any.
    pub async fn last_applied(&self, key: IndexKey) -> Option<CommitSeq> {
        let slot = self.applied.get(&key).map(|slot| slot.clone())?;
        let applied = *slot.lock().await;
        Some(applied)
    }

    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}
