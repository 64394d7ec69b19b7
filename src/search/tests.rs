//! Search Module Tests
//!
//! Covers the index side of the sync boundary without any network.
//!
//! ## Test Scopes
//! - **Tokenizer**: Normalization rules of the in-process index.
//! - **MemoryIndex**: Ranking, replacement on upsert, idempotent delete, pagination.
//! - **Elastic wire format**: Request bodies and response parsing.
//! - **QueryMerger**: Rank-preserving hydration, benign misses, degrade mode,
//!   argument validation, and error surfacing.

#[cfg(test)]
mod tests {
    use crate::blog::models::Post;
    use crate::error::{Result, SyncError};
    use crate::search::client::{DisabledIndex, IndexClient};
    use crate::search::elastic::{
        ElasticIndex, SearchResponse, document_body, parse_search_response, search_body,
    };
    use crate::search::memory::MemoryIndex;
    use crate::search::merger::QueryMerger;
    use crate::search::tokenizer::{tokenize_query, tokenize_text};
    use crate::search::types::*;
    use crate::storage::memory::Database;
    use crate::storage::types::EntityId;

    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    /// Answers every query with a fixed ranked result.
    struct FixedIndex {
        result: RankedResultSet,
    }

    #[async_trait]
    impl IndexClient for FixedIndex {
        async fn upsert(&self, _: &str, _: EntityId, _: &SearchFields) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _: &str, _: EntityId) -> Result<()> {
            Ok(())
        }

        async fn query(&self, _: &str, _: &str, _: usize, _: usize) -> Result<RankedResultSet> {
            Ok(self.result.clone())
        }
    }

    /// Never answers in time.
    struct SlowIndex;

    #[async_trait]
    impl IndexClient for SlowIndex {
        async fn upsert(&self, _: &str, _: EntityId, _: &SearchFields) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _: &str, _: EntityId) -> Result<()> {
            Ok(())
        }

        async fn query(&self, _: &str, _: &str, _: usize, _: usize) -> Result<RankedResultSet> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(RankedResultSet::empty())
        }
    }

    /// Unreachable endpoint.
    struct DownIndex;

    #[async_trait]
    impl IndexClient for DownIndex {
        async fn upsert(&self, _: &str, _: EntityId, _: &SearchFields) -> Result<()> {
            Err(SyncError::transport("connection refused"))
        }

        async fn delete(&self, _: &str, _: EntityId) -> Result<()> {
            Err(SyncError::transport("connection refused"))
        }

        async fn query(&self, _: &str, _: &str, _: usize, _: usize) -> Result<RankedResultSet> {
            Err(SyncError::transport("connection refused"))
        }
    }

    async fn seed_posts(db: &Arc<Database>, bodies: &[&str]) -> Vec<EntityId> {
        let mut session = db.begin();
        let ids = bodies
            .iter()
            .map(|body| session.add(Post::new(1, *body)))
            .collect();
        session.commit().await.unwrap();
        ids
    }

    fn merger(client: Arc<dyn IndexClient>, db: Arc<Database>) -> QueryMerger {
        QueryMerger::new(client, db, Duration::from_millis(200))
    }

    fn fields(body: &str) -> SearchFields {
        vec![("body", body.to_string())]
    }

    // ============================================================
    // TEST 1: Tokenizer
    // ============================================================

    #[test]
    fn test_tokenize_text_lowercases_and_filters_short_and_numeric_words() {
        let tokens = tokenize_text("The Rust book, 2nd ed: Rust is FUN!");

        assert_eq!(tokens, vec!["the", "rust", "book", "rust", "fun"]);
    }

    #[test]
    fn test_tokenize_text_keeps_whole_ascii_words_only() {
        let tokens = tokenize_text("mp3 players, C++ and x86_64 for ABC-news");

        assert_eq!(tokens, vec!["players", "and", "for", "abc", "news"]);
    }

    #[test]
    fn test_tokenize_query_keeps_distinct_terms_in_order() {
        let tokens = tokenize_query("beta Alpha beta   gamma");

        assert_eq!(tokens, vec!["beta", "alpha", "gamma"]);
    }

    // ============================================================
    // TEST 2: MemoryIndex
    // ============================================================

    #[tokio::test]
    async fn test_memory_index_ranks_by_term_frequency_then_id() {
        // ARRANGE
        let index = MemoryIndex::new();
        index.upsert("post", 1, &fields("rust once")).await.unwrap();
        index.upsert("post", 2, &fields("rust rust rust")).await.unwrap();
        index.upsert("post", 3, &fields("rust twice rust")).await.unwrap();
        index.upsert("post", 4, &fields("python only")).await.unwrap();

        // ACT
        let result = index.query("post", "rust", 0, 10).await.unwrap();

        // ASSERT
        assert_eq!(result.ids, vec![2, 3, 1]);
        assert_eq!(result.total, 3);
    }

    #[tokio::test]
    async fn test_memory_index_upsert_replaces_previous_terms() {
        // ARRANGE
        let index = MemoryIndex::new();
        index.upsert("post", 1, &fields("old words")).await.unwrap();

        // ACT
        index.upsert("post", 1, &fields("new content")).await.unwrap();

        // ASSERT
        assert_eq!(index.query("post", "old", 0, 10).await.unwrap().total, 0);
        assert_eq!(index.query("post", "new", 0, 10).await.unwrap().ids, vec![1]);
        assert_eq!(index.len("post"), 1);
    }

    #[tokio::test]
    async fn test_memory_index_delete_is_idempotent() {
        // ARRANGE
        let index = MemoryIndex::new();
        index.upsert("post", 1, &fields("hello world")).await.unwrap();

        // ACT
        let first = index.delete("post", 1).await;
        let second = index.delete("post", 1).await;
        let unknown = index.delete("missing", 1).await;

        // ASSERT
        assert!(first.is_ok() && second.is_ok() && unknown.is_ok());
        assert!(index.is_empty("post"));
        assert_eq!(index.query("post", "hello", 0, 10).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_memory_index_paginates_but_reports_full_total() {
        // ARRANGE
        let index = MemoryIndex::new();
        for id in 1..=5 {
            index.upsert("post", id, &fields("same text")).await.unwrap();
        }

        // ACT
        let result = index.query("post", "same", 2, 2).await.unwrap();

        // ASSERT
        assert_eq!(result.ids, vec![3, 4]);
        assert_eq!(result.total, 5);
    }

    // ============================================================
    // TEST 3: Elastic Wire Format
    // ============================================================

    #[test]
    fn test_document_body_contains_exactly_declared_fields() {
        let body = document_body(&vec![("body", "hi there".to_string()), ("title", "t".to_string())]);

        assert_eq!(body, json!({"body": "hi there", "title": "t"}));
    }

    #[test]
    fn test_search_body_is_paginated_multi_match() {
        let body = search_body("rust", 20, 10);

        assert_eq!(
            body,
            json!({
                "query": {"multi_match": {"query": "rust", "fields": ["*"]}},
                "from": 20,
                "size": 10
            })
        );
    }

    #[test]
    fn test_parse_search_response_with_object_total() {
        let response: SearchResponse = serde_json::from_value(json!({
            "took": 3,
            "hits": {
                "total": {"value": 42, "relation": "eq"},
                "hits": [{"_id": "7"}, {"_id": "3"}, {"_id": "9"}]
            }
        }))
        .unwrap();

        let result = parse_search_response(response);

        assert_eq!(result.ids, vec![7, 3, 9]);
        assert_eq!(result.total, 42);
    }

    #[test]
    fn test_parse_search_response_with_integer_total_skips_foreign_ids() {
        let response: SearchResponse = serde_json::from_value(json!({
            "hits": {
                "total": 2,
                "hits": [{"_id": "abc"}, {"_id": "5"}]
            }
        }))
        .unwrap();

        let result = parse_search_response(response);

        assert_eq!(result.ids, vec![5]);
        assert_eq!(result.total, 2);
    }

    #[test]
    fn test_elastic_index_validates_and_normalizes_url() {
        let index = ElasticIndex::new(" http://localhost:9200/ ", Duration::from_secs(1)).unwrap();
        let invalid = ElasticIndex::new("not a url", Duration::from_secs(1));

        assert_eq!(index.base_url(), "http://localhost:9200");
        assert!(matches!(invalid, Err(SyncError::InvalidArgument(_))));
    }

    // ============================================================
    // TEST 4: QueryMerger
    // ============================================================

    #[tokio::test]
    async fn test_hydration_preserves_index_order() {
        // ARRANGE: Store order is 3, 7, 9; index order is 7, 3, 9
        let db = Database::new();
        seed_posts(&db, &["a"; 9]).await;
        let client = Arc::new(FixedIndex {
            result: RankedResultSet {
                ids: vec![7, 3, 9],
                total: 3,
            },
        });

        // ACT
        let page = merger(client, db)
            .search::<Post>("anything", 1, 10)
            .await
            .unwrap();

        // ASSERT
        let ids: Vec<EntityId> = page.records.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![7, 3, 9]);
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn test_deleted_row_is_dropped_but_total_kept() {
        // ARRANGE
        let db = Database::new();
        seed_posts(&db, &["a"; 9]).await;
        let mut session = db.begin();
        session.delete::<Post>(3).unwrap();
        session.commit().await.unwrap();

        let client = Arc::new(FixedIndex {
            result: RankedResultSet {
                ids: vec![7, 3, 9],
                total: 3,
            },
        });

        // ACT
        let page = merger(client, db)
            .search::<Post>("anything", 1, 10)
            .await
            .unwrap();

        // ASSERT
        let ids: Vec<EntityId> = page.records.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![7, 9]);
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn test_disabled_index_degrades_to_empty_page() {
        // ARRANGE
        let db = Database::new();
        seed_posts(&db, &["anything here"]).await;
        let client = Arc::new(DisabledIndex);

        // ACT
        let upsert = client.upsert("post", 1, &fields("x")).await;
        let delete = client.delete("post", 1).await;
        let page = merger(client, db)
            .search::<Post>("anything", 1, 10)
            .await
            .unwrap();

        // ASSERT
        assert!(upsert.is_ok() && delete.is_ok());
        assert!(page.records.is_empty());
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_scenario_beta_query_over_memory_index() {
        // ARRANGE
        let db = Database::new();
        let ids = seed_posts(&db, &["alpha beta", "beta gamma", "gamma delta"]).await;
        let index = Arc::new(MemoryIndex::new());
        for post in db.scan::<Post>(0, 10) {
            let record = SearchableRecord::project(&post);
            index.upsert(record.index, record.id, &record.fields).await.unwrap();
        }
        let merger = merger(index, db);

        // ACT
        let page = merger.search::<Post>("beta", 1, 10).await.unwrap();
        let second = merger.search::<Post>("beta", 2, 1).await.unwrap();

        // ASSERT
        assert_eq!(page.total, 2);
        let bodies: Vec<&str> = page.records.iter().map(|p| p.body.as_str()).collect();
        assert_eq!(bodies, vec!["alpha beta", "beta gamma"]);
        assert!(!page.has_next());

        assert_eq!(second.records.len(), 1);
        assert_eq!(second.records[0].id, ids[1]);
        assert!(second.has_prev());
        assert!(!second.has_next());
        assert_eq!(second.pages(), 2);
    }

    #[tokio::test]
    async fn test_invalid_arguments_fail_before_io() {
        // ARRANGE
        let merger = merger(Arc::new(DownIndex), Database::new());

        // ACT & ASSERT
        for (query, page, per_page) in [("rust", 0, 10), ("rust", 1, 0), ("   ", 1, 10)] {
            let result = merger.search::<Post>(query, page, per_page).await;
            assert!(
                matches!(result, Err(SyncError::InvalidArgument(_))),
                "expected InvalidArgument for ({:?}, {}, {})",
                query,
                page,
                per_page
            );
        }
    }

    #[tokio::test]
    async fn test_unreachable_index_is_an_error_not_an_empty_page() {
        let merger = merger(Arc::new(DownIndex), Database::new());

        let result = merger.search::<Post>("rust", 1, 10).await;

        assert!(result.unwrap_err().is_transport());
    }

    #[tokio::test]
    async fn test_slow_index_times_out() {
        let merger = merger(Arc::new(SlowIndex), Database::new());

        let result = merger.search::<Post>("rust", 1, 10).await;

        assert!(result.unwrap_err().is_timeout());
    }

    // ============================================================
    // TEST 5: Page Helpers
    // ============================================================

    #[test]
    fn test_page_navigation() {
        let page = Page::<Post> {
            records: Vec::new(),
            total: 25,
            page: 2,
            per_page: 10,
        };

        assert!(page.has_next());
        assert!(page.has_prev());
        assert_eq!(page.pages(), 3);

        let empty = Page::<Post>::empty(1, 10);
        assert!(!empty.has_next());
        assert!(!empty.has_prev());
        assert_eq!(empty.pages(), 0);
    }

    #[test]
    fn test_projection_follows_declared_fields() {
        let mut post = Post::new(4, "projected body");
        post.id = 11;

        let record = SearchableRecord::project(&post);

        assert_eq!(record.index, "post");
        assert_eq!(record.id, 11);
        assert_eq!(record.fields, vec![("body", "projected body".to_string())]);
        assert_eq!(Post::field_names(), vec!["body"]);
    }
}
