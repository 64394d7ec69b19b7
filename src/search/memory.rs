//! In-Process Search Index
//!
//! A small ranked full-text index kept in memory. It implements the same
//! `IndexClient` contract as the HTTP transport, which makes it the backend for
//! local runs and for exercising the sync path end to end.
//!
//! ## Ranking
//! Documents are scored by summing, over the distinct query terms, how often
//! each term occurs in the document (term frequency). Higher scores rank first;
//! equal scores fall back to ascending id so results are deterministic.
//!
//! Each index name is its own shard. Writes lock only that shard, so unrelated
//! indexes never contend.

use super::client::IndexClient;
use super::tokenizer::{tokenize_query, tokenize_text};
use super::types::{RankedResultSet, SearchFields};
use crate::error::Result;
use crate::storage::types::EntityId;

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
struct IndexShard {
    documents: BTreeMap<EntityId, SearchFields>,
    /// term -> (document id -> term frequency)
    postings: HashMap<String, HashMap<EntityId, usize>>,
}

impl IndexShard {
    fn remove(&mut self, id: EntityId) -> bool {
        let Some(fields) = self.documents.remove(&id) else {
            return false;
        };

        for (_, value) in &fields {
            for term in tokenize_text(value) {
                if let Some(docs) = self.postings.get_mut(&term) {
                    docs.remove(&id);
                    if docs.is_empty() {
                        self.postings.remove(&term);
                    }
                }
            }
        }
        true
    }

    fn insert(&mut self, id: EntityId, fields: SearchFields) {
        for (_, value) in &fields {
            for term in tokenize_text(value) {
                *self
                    .postings
                    .entry(term)
                    .or_default()
                    .entry(id)
                    .or_insert(0) += 1;
            }
        }
        self.documents.insert(id, fields);
    }

    fn rank(&self, query: &str) -> Vec<(EntityId, usize)> {
        let mut scores: HashMap<EntityId, usize> = HashMap::new();
        for term in tokenize_query(query) {
            if let Some(docs) = self.postings.get(&term) {
                for (id, frequency) in docs {
                    *scores.entry(*id).or_insert(0) += frequency;
                }
            }
        }

        let mut ranked: Vec<(EntityId, usize)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }
}

#[derive(Debug, Default)]
pub struct MemoryIndex {
    shards: DashMap<String, IndexShard>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored document, if any.
    pub fn document(&self, index: &str, id: EntityId) -> Option<SearchFields> {
        self.shards
            .get(index)
            .and_then(|shard| shard.documents.get(&id).cloned())
    }

    /// Full content of one index, keyed by id.
    pub fn documents(&self, index: &str) -> BTreeMap<EntityId, SearchFields> {
        self.shards
            .get(index)
            .map(|shard| shard.documents.clone())
            .unwrap_or_default()
    }

    pub fn len(&self, index: &str) -> usize {
        self.shards
            .get(index)
            .map(|shard| shard.documents.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, index: &str) -> bool {
        self.len(index) == 0
    }
}

#[async_trait]
impl IndexClient for MemoryIndex {
    async fn upsert(&self, index: &str, id: EntityId, fields: &SearchFields) -> Result<()> {
        let mut shard = self.shards.entry(index.to_string()).or_default();
        shard.remove(id);
        shard.insert(id, fields.clone());
        tracing::trace!("Memory index upsert {}#{}", index, id);
        Ok(())
    }

    async fn delete(&self, index: &str, id: EntityId) -> Result<()> {
        if let Some(mut shard) = self.shards.get_mut(index) {
            if shard.remove(id) {
                tracing::trace!("Memory index delete {}#{}", index, id);
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        index: &str,
        query: &str,
        offset: usize,
        limit: usize,
    ) -> Result<RankedResultSet> {
        let Some(shard) = self.shards.get(index) else {
            return Ok(RankedResultSet::empty());
        };

        let ranked = shard.rank(query);
        let total = ranked.len();
        let ids = ranked
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(id, _)| id)
            .collect();

        Ok(RankedResultSet { ids, total })
    }
}
