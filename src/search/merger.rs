//! Relevance-Preserving Query Merge
//!
//! The index decides *which* records match and in *what order*; the primary
//! store decides *what they contain*. `QueryMerger` asks the index for one page
//! of ranked ids, hydrates them with a single bulk lookup, and puts the rows
//! back into the index's order.
//!
//! Rows that the index still knows about but the store no longer has (deleted
//! between indexing and querying) are dropped, never replaced. The page total
//! always comes from the index so page counts stay stable under that race.

use super::client::IndexClient;
use super::types::{Page, Searchable};
use crate::error::{Result, SyncError};
use crate::storage::memory::Database;
use crate::storage::types::EntityId;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub struct QueryMerger {
    client: Arc<dyn IndexClient>,
    db: Arc<Database>,
    query_timeout: Duration,
}

impl QueryMerger {
    pub fn new(client: Arc<dyn IndexClient>, db: Arc<Database>, query_timeout: Duration) -> Self {
        Self {
            client,
            db,
            query_timeout,
        }
    }

    /// Runs `query` against `T`'s index and returns page `page` (1-based).
    ///
    /// # Errors
    /// * `InvalidArgument` for `page < 1`, `per_page < 1`, or a blank query,
    ///   before any I/O.
    /// * `Timeout` if the index does not answer within the query timeout.
    /// * `Transport` if the index is unreachable. This is never folded into an
    ///   empty page: "no matches" and "search unavailable" stay distinguishable.
    pub async fn search<T: Searchable>(
        &self,
        query: &str,
        page: usize,
        per_page: usize,
    ) -> Result<Page<T>> {
        if page < 1 {
            return Err(SyncError::invalid_argument("page must be >= 1"));
        }
        if per_page < 1 {
            return Err(SyncError::invalid_argument("per_page must be >= 1"));
        }
        if query.trim().is_empty() {
            return Err(SyncError::invalid_argument("query must not be empty"));
        }
        let offset = (page - 1)
            .checked_mul(per_page)
            .ok_or_else(|| SyncError::invalid_argument("page is out of range"))?;

        let ranked = match tokio::time::timeout(
            self.query_timeout,
            self.client.query(T::INDEX_NAME, query, offset, per_page),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    "Query on {} timed out after {:?}",
                    T::INDEX_NAME,
                    self.query_timeout
                );
                return Err(SyncError::timeout(format!(
                    "query on {} exceeded {}ms",
                    T::INDEX_NAME,
                    self.query_timeout.as_millis()
                )));
            }
        };

        if ranked.total == 0 {
            return Ok(Page::empty(page, per_page));
        }

        let records = self.hydrate::<T>(&ranked.ids);
        if records.len() < ranked.ids.len() {
            tracing::debug!(
                "{} of {} ranked ids on {} no longer resolve in the store",
                ranked.ids.len() - records.len(),
                ranked.ids.len(),
                T::INDEX_NAME
            );
        }

        Ok(Page {
            records,
            total: ranked.total,
            page,
            per_page,
        })
    }

    /// Fetches `ids` in one bulk lookup and reorders the rows to match `ids`.
    pub fn hydrate<T: Searchable>(&self, ids: &[EntityId]) -> Vec<T> {
        if ids.is_empty() {
            return Vec::new();
        }

        let mut rank: HashMap<EntityId, usize> = HashMap::with_capacity(ids.len());
        for (position, id) in ids.iter().enumerate() {
            rank.entry(*id).or_insert(position);
        }

        let mut records = self.db.fetch_by_ids::<T>(ids);
        records.sort_by_key(|record| rank.get(&record.id()).copied().unwrap_or(usize::MAX));
        records
    }
}
