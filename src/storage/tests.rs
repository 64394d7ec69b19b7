//! Storage Module Tests
//!
//! Validates the transactional behaviour the sync layer relies on.
//!
//! ## Test Scopes
//! - **Sessions**: Id assignment, per-row coalescing of pending writes, read-your-writes.
//! - **Commit Hooks**: Pre-commit sees the pending sets; post-commit fires only on success.
//! - **Commit Validation**: stale rows and unique keys are rejected as a whole.
//! - **Bulk Reads**: `fetch_by_ids` and `scan` ordering guarantees, and
//!   all-or-nothing visibility of a commit.

#[cfg(test)]
mod tests {
    use crate::error::SyncError;
    use crate::storage::memory::Database;
    use crate::storage::types::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Note {
        id: EntityId,
        text: String,
    }

    impl Note {
        fn new(text: &str) -> Self {
            Self {
                id: 0,
                text: text.to_string(),
            }
        }
    }

    impl Model for Note {
        const TABLE: &'static str = "note";

        fn id(&self) -> EntityId {
            self.id
        }

        fn set_id(&mut self, id: EntityId) {
            self.id = id;
        }
    }

    /// A model with a unique `name`.
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Handle {
        id: EntityId,
        name: String,
    }

    impl Handle {
        fn new(name: &str) -> Self {
            Self {
                id: 0,
                name: name.to_string(),
            }
        }
    }

    impl Model for Handle {
        const TABLE: &'static str = "handle";

        fn id(&self) -> EntityId {
            self.id
        }

        fn set_id(&mut self, id: EntityId) {
            self.id = id;
        }

        fn unique_key(&self) -> Option<String> {
            Some(self.name.clone())
        }
    }

    /// Records the notifications it receives.
    struct RecordingHook {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl CommitHook for RecordingHook {
        type Outcome = &'static str;

        fn before_commit(&mut self, pending: &PendingWrites) {
            self.events.lock().push(format!(
                "before added={} updated={} removed={}",
                pending.added.len(),
                pending.updated.len(),
                pending.removed.len()
            ));
        }

        async fn after_commit(self, seq: CommitSeq) -> &'static str {
            self.events.lock().push(format!("after commit {}", seq));
            "applied"
        }
    }

    async fn seed(db: &Arc<Database>, texts: &[&str]) -> Vec<EntityId> {
        let mut session = db.begin();
        let ids = texts.iter().map(|t| session.add(Note::new(t))).collect();
        session.commit().await.unwrap();
        ids
    }

    // ============================================================
    // TEST 1: Session - Ids and Visibility
    // ============================================================

    #[tokio::test]
    async fn test_add_assigns_sequential_ids_and_commit_publishes() {
        // ARRANGE
        let db = Database::new();
        let mut session = db.begin();

        // ACT
        let first = session.add(Note::new("first"));
        let second = session.add(Note::new("second"));

        // ASSERT: Pending rows are only visible to the session
        assert_eq!((first, second), (1, 2));
        assert_eq!(session.get::<Note>(first).unwrap().text, "first");
        assert!(db.get::<Note>(first).is_none());

        // ACT
        session.commit().await.unwrap();

        // ASSERT
        assert_eq!(db.count::<Note>(), 2);
        assert_eq!(db.get::<Note>(second).unwrap().id, second);
    }

    #[tokio::test]
    async fn test_rollback_discards_pending_writes() {
        // ARRANGE
        let db = Database::new();
        let mut session = db.begin();
        session.add(Note::new("never"));

        // ACT
        session.rollback();

        // ASSERT
        assert_eq!(db.count::<Note>(), 0);
    }

    // ============================================================
    // TEST 2: Session - Coalescing
    // ============================================================

    #[tokio::test]
    async fn test_add_then_update_stays_an_insert() {
        // ARRANGE
        let db = Database::new();
        let mut session = db.begin();
        let id = session.add(Note::new("draft"));

        // ACT
        session
            .update(Note {
                id,
                text: "final".to_string(),
            })
            .unwrap();

        // ASSERT
        let pending = session.pending();
        assert_eq!(pending.added.len(), 1);
        assert!(pending.updated.is_empty());
        assert_eq!(
            downcast::<Note>(pending.added[0].as_ref()).unwrap().text,
            "final"
        );
    }

    #[tokio::test]
    async fn test_add_then_delete_cancels_out() {
        // ARRANGE
        let db = Database::new();
        let mut session = db.begin();
        let id = session.add(Note::new("oops"));

        // ACT
        session.delete::<Note>(id).unwrap();

        // ASSERT
        assert!(session.pending().is_empty());
        assert!(session.get::<Note>(id).is_none());
        session.commit().await.unwrap();
        assert_eq!(db.count::<Note>(), 0);
    }

    #[tokio::test]
    async fn test_update_then_delete_becomes_delete() {
        // ARRANGE
        let db = Database::new();
        let ids = seed(&db, &["keep", "drop"]).await;
        let mut session = db.begin();

        // ACT
        session
            .update(Note {
                id: ids[1],
                text: "edited".to_string(),
            })
            .unwrap();
        session.delete::<Note>(ids[1]).unwrap();

        // ASSERT
        let pending = session.pending();
        assert!(pending.updated.is_empty());
        assert_eq!(pending.removed.len(), 1);
        assert_eq!(pending.removed[0].record_id(), ids[1]);
    }

    #[tokio::test]
    async fn test_update_or_delete_of_missing_row_is_not_found() {
        // ARRANGE
        let db = Database::new();
        let mut session = db.begin();

        // ACT
        let update = session.update(Note {
            id: 42,
            text: "ghost".to_string(),
        });
        let delete = session.delete::<Note>(42);

        // ASSERT
        assert!(matches!(update, Err(SyncError::NotFound(_))));
        assert!(matches!(delete, Err(SyncError::NotFound(_))));
    }

    // ============================================================
    // TEST 3: Commit Hooks
    // ============================================================

    #[tokio::test]
    async fn test_hook_sees_pending_sets_then_post_commit() {
        // ARRANGE
        let db = Database::new();
        let ids = seed(&db, &["a", "b"]).await;
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut session = db.begin_with(RecordingHook {
            events: events.clone(),
        });

        session.add(Note::new("c"));
        session
            .update(Note {
                id: ids[0],
                text: "a2".to_string(),
            })
            .unwrap();
        session.delete::<Note>(ids[1]).unwrap();

        // ACT
        let outcome = session.commit().await.unwrap();

        // ASSERT
        assert_eq!(outcome, "applied");
        assert_eq!(
            *events.lock(),
            vec![
                "before added=1 updated=1 removed=1".to_string(),
                "after commit 2".to_string()
            ]
        );
        assert_eq!(db.get::<Note>(ids[0]).unwrap().text, "a2");
        assert!(db.get::<Note>(ids[1]).is_none());
    }

    #[tokio::test]
    async fn test_rollback_never_fires_hook() {
        // ARRANGE
        let db = Database::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut session = db.begin_with(RecordingHook {
            events: events.clone(),
        });
        session.add(Note::new("x"));

        // ACT
        session.rollback();

        // ASSERT
        assert!(events.lock().is_empty());
    }

    #[tokio::test]
    async fn test_conflicting_commit_applies_nothing_and_skips_post_commit() {
        // ARRANGE: Two sessions race on the same row
        let db = Database::new();
        let ids = seed(&db, &["shared"]).await;

        let mut deleter = db.begin();
        deleter.delete::<Note>(ids[0]).unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let mut editor = db.begin_with(RecordingHook {
            events: events.clone(),
        });
        let added = editor.add(Note::new("side effect"));
        editor
            .update(Note {
                id: ids[0],
                text: "late edit".to_string(),
            })
            .unwrap();

        // ACT
        deleter.commit().await.unwrap();
        let result = editor.commit().await;

        // ASSERT: Conflict, no partial apply, no post-commit
        assert!(matches!(result, Err(SyncError::Conflict(_))));
        assert!(db.get::<Note>(added).is_none());
        assert_eq!(events.lock().len(), 1);
        assert!(events.lock()[0].starts_with("before"));
    }

    // ============================================================
    // TEST 4: Commit Validation
    // ============================================================

    #[tokio::test]
    async fn test_commit_sequence_advances_only_on_success() {
        // ARRANGE
        let db = Database::new();
        assert_eq!(db.last_commit(), 0);
        let ids = seed(&db, &["row"]).await;
        assert_eq!(db.last_commit(), 1);

        let mut deleter = db.begin();
        deleter.delete::<Note>(ids[0]).unwrap();
        let mut stale = db.begin();
        stale.delete::<Note>(ids[0]).unwrap();

        // ACT
        deleter.commit().await.unwrap();
        let result = stale.commit().await;

        // ASSERT
        assert!(result.is_err());
        assert_eq!(db.last_commit(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_sessions_cannot_both_claim_a_unique_key() {
        // ARRANGE: Both sessions pass any pre-commit check
        let db = Database::new();
        let mut first = db.begin();
        first.add(Handle::new("susan"));
        let mut second = db.begin();
        let loser = second.add(Handle::new("susan"));

        // ACT
        first.commit().await.unwrap();
        let result = second.commit().await;

        // ASSERT
        assert!(matches!(result, Err(SyncError::Conflict(_))));
        assert_eq!(db.count::<Handle>(), 1);
        assert!(db.get::<Handle>(loser).is_none());
        assert_eq!(db.last_commit(), 1);
    }

    #[tokio::test]
    async fn test_unique_key_rules_within_one_commit() {
        // ARRANGE
        let db = Database::new();
        let mut session = db.begin();
        let old = session.add(Handle::new("old"));
        session.commit().await.unwrap();

        // ACT: Two new rows with the same key
        let mut twins = db.begin();
        twins.add(Handle::new("twin"));
        twins.add(Handle::new("twin"));
        let duplicate = twins.commit().await;

        // ACT: Renaming a row frees its old key in the same commit
        let mut swap = db.begin();
        swap.update(Handle {
            id: old,
            name: "renamed".to_string(),
        })
        .unwrap();
        let taker = swap.add(Handle::new("old"));
        let renamed = swap.commit().await;

        // ASSERT
        assert!(matches!(duplicate, Err(SyncError::Conflict(_))));
        assert!(renamed.is_ok());
        assert_eq!(db.get::<Handle>(old).unwrap().name, "renamed");
        assert_eq!(db.get::<Handle>(taker).unwrap().name, "old");
    }

    #[tokio::test]
    async fn test_models_without_unique_key_accept_duplicates() {
        let db = Database::new();

        seed(&db, &["same", "same"]).await;

        assert_eq!(db.count::<Note>(), 2);
    }

    // ============================================================
    // TEST 5: Bulk Reads
    // ============================================================

    #[tokio::test]
    async fn test_fetch_by_ids_returns_store_order_and_skips_missing() {
        // ARRANGE
        let db = Database::new();
        seed(&db, &["one", "two", "three", "four"]).await;

        // ACT
        let notes = db.fetch_by_ids::<Note>(&[4, 99, 2, 4, 1]);

        // ASSERT
        let ids: Vec<EntityId> = notes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 4]);
    }

    #[tokio::test]
    async fn test_scan_pages_in_primary_key_order() {
        // ARRANGE
        let db = Database::new();
        seed(&db, &["a", "b", "c", "d", "e"]).await;

        // ACT
        let first = db.scan::<Note>(0, 2);
        let last = db.scan::<Note>(4, 2);
        let past_end = db.scan::<Note>(10, 2);

        // ASSERT
        assert_eq!(first.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(last.iter().map(|n| n.id).collect::<Vec<_>>(), vec![5]);
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn test_scan_at_reports_the_commit_it_reflects() {
        // ARRANGE
        let db = Database::new();
        seed(&db, &["a", "b"]).await;
        seed(&db, &["c"]).await;

        // ACT
        let (seq, rows) = db.scan_at::<Note>(0, 10);

        // ASSERT
        assert_eq!(seq, 2);
        assert_eq!(rows.len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_readers_never_see_half_a_commit() {
        // ARRANGE: Two rows always rewritten together
        let db = Database::new();
        let ids = seed(&db, &["round 0", "round 0"]).await;

        let reader_db = db.clone();
        let reader_ids = ids.clone();
        let reader = tokio::task::spawn_blocking(move || {
            for _ in 0..2_000 {
                let rows = reader_db.fetch_by_ids::<Note>(&reader_ids);
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].text, rows[1].text, "torn read");
            }
        });

        // ACT
        for round in 1..=200 {
            let mut session = db.begin();
            for id in &ids {
                session
                    .update(Note {
                        id: *id,
                        text: format!("round {}", round),
                    })
                    .unwrap();
            }
            session.commit().await.unwrap();
        }

        // ASSERT
        reader.await.unwrap();
        assert_eq!(db.last_commit(), 201);
    }

    #[test]
    fn test_unknown_table_reads_are_empty() {
        let db = Database::new();

        assert_eq!(db.count::<Note>(), 0);
        assert!(db.fetch_by_ids::<Note>(&[1]).is_empty());
        assert!(db.scan::<Note>(0, 10).is_empty());
    }
}
