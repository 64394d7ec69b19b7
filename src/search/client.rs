//! Index Client Contract
//!
//! The narrow interface the sync layer uses to reach a search engine. All three
//! operations are idempotent per record id: replaying an upsert or a delete
//! leaves the index in the same state.
//!
//! Implementations:
//! - **`ElasticIndex`**: HTTP transport to an Elasticsearch-compatible endpoint.
//! - **`MemoryIndex`**: in-process ranked index.
//! - **`DisabledIndex`**: stands in when no endpoint is configured. Writes succeed
//!   trivially and queries return nothing, so search degrades to "disabled"
//!   instead of failing.

use super::elastic::ElasticIndex;
use super::memory::MemoryIndex;
use super::types::{RankedResultSet, SearchFields};
use crate::config::Config;
use crate::error::Result;
use crate::storage::types::EntityId;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Inserts or replaces the document `id` of `index`.
    async fn upsert(&self, index: &str, id: EntityId, fields: &SearchFields) -> Result<()>;

    /// Removes the document `id` of `index`. Missing documents are not an error.
    async fn delete(&self, index: &str, id: EntityId) -> Result<()>;

    /// Runs a multi-field match over `index` and returns one page of ranked ids.
    async fn query(
        &self,
        index: &str,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> Result<RankedResultSet>;

    /// False when every operation is a no-op.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// The client used when no index endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledIndex;

#[async_trait]
impl IndexClient for DisabledIndex {
    async fn upsert(&self, _index: &str, _id: EntityId, _fields: &SearchFields) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _index: &str, _id: EntityId) -> Result<()> {
        Ok(())
    }

    async fn query(
        &self,
        _index: &str,
        _query: &str,
        _offset: usize,
        _limit: usize,
    ) -> Result<RankedResultSet> {
        Ok(RankedResultSet::empty())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Picks the index transport the configuration asks for.
pub fn index_client_from_config(config: &Config) -> Result<Arc<dyn IndexClient>> {
    if config.in_memory_index {
        tracing::info!("Using in-process search index");
        return Ok(Arc::new(MemoryIndex::new()));
    }

    match config.elasticsearch_url.as_deref() {
        Some(url) if !url.trim().is_empty() => {
            tracing::info!("Using search index at {}", url);
            let client = ElasticIndex::new(url, Duration::from_millis(config.request_timeout_ms))?;
            Ok(Arc::new(client))
        }
        _ => {
            tracing::warn!("No search index configured, full-text search is disabled");
            Ok(Arc::new(DisabledIndex))
        }
    }
}
