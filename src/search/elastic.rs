//! Elasticsearch Transport
//!
//! Speaks the subset of the Elasticsearch document and search APIs the sync
//! layer needs:
//! - `PUT  {base}/{index}/_doc/{id}` with the flat field document (upsert)
//! - `DELETE {base}/{index}/_doc/{id}` (delete, 404 tolerated)
//! - `POST {base}/{index}/_search` with a `multi_match` over all fields (query)

use super::client::IndexClient;
use super::types::{RankedResultSet, SearchFields};
use crate::error::{Result, SyncError};
use crate::storage::types::EntityId;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::time::Duration;

pub struct ElasticIndex {
    base_url: String,
    http_client: reqwest::Client,
    timeout: Duration,
}

impl ElasticIndex {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let cleaned = base_url.trim().trim_end_matches('/');
        reqwest::Url::parse(cleaned).map_err(|e| {
            SyncError::invalid_argument(format!("index url '{}': {}", base_url, e))
        })?;

        Ok(Self {
            base_url: cleaned.to_string(),
            http_client: reqwest::Client::builder().build()?,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn doc_url(&self, index: &str, id: EntityId) -> String {
        format!("{}/{}/_doc/{}", self.base_url, index, id)
    }

    fn search_url(&self, index: &str) -> String {
        format!("{}/{}/_search", self.base_url, index)
    }
}

/// The document body for one record: exactly the declared fields, as flat strings.
pub fn document_body(fields: &SearchFields) -> Value {
    let mut document = Map::new();
    for (name, value) in fields {
        document.insert((*name).to_string(), Value::String(value.clone()));
    }
    Value::Object(document)
}

/// A multi-field match across every indexed field, paginated by offset and count.
pub fn search_body(query: &str, offset: usize, limit: usize) -> Value {
    json!({
        "query": {
            "multi_match": {
                "query": query,
                "fields": ["*"]
            }
        },
        "from": offset,
        "size": limit
    })
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    total: HitsTotal,
    #[serde(default)]
    hits: Vec<Hit>,
}

/// Older servers report a bare count, newer ones `{"value": n, "relation": ..}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HitsTotal {
    Count(usize),
    Object { value: usize },
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
}

/// Extracts ranked ids and the total from a search response.
///
/// Hits whose `_id` is not numeric were not written by this crate and are skipped.
pub fn parse_search_response(response: SearchResponse) -> RankedResultSet {
    let total = match response.hits.total {
        HitsTotal::Count(count) => count,
        HitsTotal::Object { value } => value,
    };

    let ids = response
        .hits
        .hits
        .into_iter()
        .filter_map(|hit| match hit.id.parse::<EntityId>() {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!("Skipping search hit with non-numeric id '{}'", hit.id);
                None
            }
        })
        .collect();

    RankedResultSet { ids, total }
}

#[async_trait]
impl IndexClient for ElasticIndex {
    async fn upsert(&self, index: &str, id: EntityId, fields: &SearchFields) -> Result<()> {
        let body = document_body(fields);
        tracing::debug!("Index upsert {}#{} ({} fields)", index, id, fields.len());

        let response = self
            .http_client
            .put(self.doc_url(index, id))
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::transport(format!(
                "upsert {}#{} failed: {}",
                index,
                id,
                response.status()
            )));
        }
        Ok(())
    }

    async fn delete(&self, index: &str, id: EntityId) -> Result<()> {
        tracing::debug!("Index delete {}#{}", index, id);

        let response = self
            .http_client
            .delete(self.doc_url(index, id))
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::trace!("Document {}#{} was not indexed", index, id);
            return Ok(());
        }
        if !status.is_success() {
            return Err(SyncError::transport(format!(
                "delete {}#{} failed: {}",
                index, id, status
            )));
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
        let body = search_body(query, offset, limit);
        tracing::debug!("Index query on {}: {}", index, body);

        let response = self
            .http_client
            .post(self.search_url(index))
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            // Nothing has been indexed under this name yet.
            return Ok(RankedResultSet::empty());
        }
        if !status.is_success() {
            return Err(SyncError::transport(format!(
                "query on {} failed: {}",
                index, status
            )));
        }

        let parsed: SearchResponse = response.json().await?;
        let ranked = parse_search_response(parsed);
        tracing::debug!(
            "Index query on {} matched {} ({} ids on page)",
            index,
            ranked.total,
            ranked.ids.len()
        );
        Ok(ranked)
    }
}
