//! Integration tests for SqliteEntityStore
//!
//! These tests verify the LocalStore implementation using an in-memory
//! SQLite database. Each test function creates a fresh database to ensure
//! test isolation. Durability is verified separately against a file-backed
//! database that is closed and reopened.

use chrono::{Duration, Utc};

use studypad_core::domain::{
    Chat, EntityId, EntityKind, Message, Note, OwnerId, RecordPatch, StoreError, StoredEntity,
    SyncCursor, SyncQueueEntry, SyncStatus,
};
use studypad_core::ports::{LocalStore, SyncCheckpoint};
use studypad_store::{DatabasePool, SqliteEntityStore};

// ============================================================================
// Test helpers
// ============================================================================

/// Create a fresh in-memory store for each test
async fn setup() -> SqliteEntityStore {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    SqliteEntityStore::new(pool.pool().clone())
}

fn owner() -> OwnerId {
    OwnerId::new("user-1").unwrap()
}

fn note(title: &str, content: &str, tags: &[&str]) -> Note {
    Note::new(
        owner(),
        title,
        content,
        tags.iter().map(|t| t.to_string()).collect(),
    )
    .unwrap()
}

// ============================================================================
// Entity tests
// ============================================================================

#[tokio::test]
async fn test_put_and_get() {
    let store = setup().await;
    let record = note("Physics", "Newton's laws", &["physics"])
        .to_record()
        .unwrap();

    store.put(&record).await.unwrap();

    let fetched = store.get(&record.id).await.unwrap().unwrap();
    assert_eq!(fetched, record);
}

#[tokio::test]
async fn test_get_missing_returns_none() {
    let store = setup().await;
    assert!(store.get(&EntityId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_put_replaces_by_id() {
    let store = setup().await;
    let mut original = note("Title", "v1", &[]);
    store.put(&original.to_record().unwrap()).await.unwrap();

    original
        .apply(studypad_core::domain::NoteUpdate {
            content: Some("v2".to_string()),
            ..Default::default()
        })
        .unwrap();
    store.put(&original.to_record().unwrap()).await.unwrap();

    let fetched = store.get(original.id()).await.unwrap().unwrap();
    let restored = Note::from_record(&fetched).unwrap();
    assert_eq!(restored.content(), "v2");
    assert_eq!(restored.version(), 2);
}

#[tokio::test]
async fn test_get_all_scopes_by_owner_and_kind() {
    let store = setup().await;
    let other_owner = OwnerId::new("user-2").unwrap();

    store
        .put(&note("Mine", "c", &[]).to_record().unwrap())
        .await
        .unwrap();
    store
        .put(
            &Note::new(other_owner.clone(), "Theirs", "c", vec![])
                .unwrap()
                .to_record()
                .unwrap(),
        )
        .await
        .unwrap();
    store
        .put(
            &Chat::new(owner(), "Chat", vec![])
                .unwrap()
                .to_record()
                .unwrap(),
        )
        .await
        .unwrap();

    let notes = store.get_all(EntityKind::Note, &owner(), None).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].search_text, "mine c");

    let theirs = store
        .get_all(EntityKind::Note, &other_owner, None)
        .await
        .unwrap();
    assert_eq!(theirs.len(), 1);
}

#[tokio::test]
async fn test_get_all_filters_by_parent() {
    let store = setup().await;
    let chat_a = EntityId::new();
    let chat_b = EntityId::new();

    for (chat, body) in [(chat_a, "in a"), (chat_a, "also a"), (chat_b, "in b")] {
        let msg = Message::new(owner(), chat, body, vec![]).unwrap();
        store.put(&msg.to_record().unwrap()).await.unwrap();
    }

    let in_a = store
        .get_all(EntityKind::Message, &owner(), Some(&chat_a))
        .await
        .unwrap();
    assert_eq!(in_a.len(), 2);

    let in_b = store
        .get_all(EntityKind::Message, &owner(), Some(&chat_b))
        .await
        .unwrap();
    assert_eq!(in_b.len(), 1);
}

#[tokio::test]
async fn test_update_patches_fields() {
    let store = setup().await;
    let record = note("T", "c", &[]).to_record().unwrap();
    store.put(&record).await.unwrap();

    let later = Utc::now() + Duration::seconds(5);
    let patch = RecordPatch::new()
        .with_sync_status(SyncStatus::Synced)
        .with_version(7)
        .with_updated_at(later);
    store.update(&record.id, &patch).await.unwrap();

    let fetched = store.get(&record.id).await.unwrap().unwrap();
    assert_eq!(fetched.sync_status, SyncStatus::Synced);
    assert_eq!(fetched.version, 7);
    assert_eq!(fetched.updated_at, later);
    // Unpatched fields are untouched
    assert_eq!(fetched.payload, record.payload);
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let store = setup().await;
    let result = store
        .update(&EntityId::new(), &RecordPatch::new().with_version(2))
        .await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let store = setup().await;
    let record = note("T", "c", &[]).to_record().unwrap();
    store.put(&record).await.unwrap();

    store.delete(&record.id).await.unwrap();
    assert!(store.get(&record.id).await.unwrap().is_none());

    // Second delete of the same id is not an error and changes nothing
    store.delete(&record.id).await.unwrap();
    assert!(store.get(&record.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_set_sync_status() {
    let store = setup().await;
    let record = note("T", "c", &[]).to_record().unwrap();
    store.put(&record).await.unwrap();

    store
        .set_sync_status(&record.id, SyncStatus::Synced)
        .await
        .unwrap();
    let fetched = store.get(&record.id).await.unwrap().unwrap();
    assert_eq!(fetched.sync_status, SyncStatus::Synced);

    let missing = store
        .set_sync_status(&EntityId::new(), SyncStatus::Synced)
        .await;
    assert!(matches!(missing, Err(StoreError::NotFound(_))));
}

// ============================================================================
// Search tests
// ============================================================================

#[tokio::test]
async fn test_search_matches_title_content_and_tags() {
    let store = setup().await;
    store
        .put(&note("Physics homework", "mechanics", &[]).to_record().unwrap())
        .await
        .unwrap();
    store
        .put(&note("History", "the French revolution", &[]).to_record().unwrap())
        .await
        .unwrap();
    store
        .put(&note("Untitled", "misc", &["physics"]).to_record().unwrap())
        .await
        .unwrap();

    let hits = store
        .search(EntityKind::Note, &owner(), "physics")
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
}

#[tokio::test]
async fn test_search_is_case_insensitive() {
    let store = setup().await;
    store
        .put(&note("Physics", "Newton", &[]).to_record().unwrap())
        .await
        .unwrap();

    let hits = store
        .search(EntityKind::Note, &owner(), "PHYSICS")
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn test_search_no_match_is_empty() {
    let store = setup().await;
    store
        .put(&note("Physics", "Newton", &[]).to_record().unwrap())
        .await
        .unwrap();

    let hits = store
        .search(EntityKind::Note, &owner(), "chemistry")
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_search_treats_wildcards_literally() {
    let store = setup().await;
    store
        .put(&note("Progress", "50% done", &[]).to_record().unwrap())
        .await
        .unwrap();
    store
        .put(&note("Other", "nothing here", &[]).to_record().unwrap())
        .await
        .unwrap();

    // A bare '%' must not match everything
    let hits = store.search(EntityKind::Note, &owner(), "50%").await.unwrap();
    assert_eq!(hits.len(), 1);
}

// ============================================================================
// Queue tests
// ============================================================================

#[tokio::test]
async fn test_queue_fifo_order() {
    let store = setup().await;

    let mut ids = Vec::new();
    for i in 0..3 {
        let record = note(&format!("Note {i}"), "c", &[]).to_record().unwrap();
        let entry = SyncQueueEntry::for_create(&record);
        ids.push(*entry.id());
        store.enqueue(&entry).await.unwrap();
    }

    let pending = store.pending_entries(&owner()).await.unwrap();
    assert_eq!(pending.len(), 3);
    let drained: Vec<_> = pending.iter().map(|e| *e.id()).collect();
    assert_eq!(drained, ids);
}

#[tokio::test]
async fn test_pending_entries_does_not_consume() {
    let store = setup().await;
    let record = note("T", "c", &[]).to_record().unwrap();
    store
        .enqueue(&SyncQueueEntry::for_create(&record))
        .await
        .unwrap();

    assert_eq!(store.pending_entries(&owner()).await.unwrap().len(), 1);
    assert_eq!(store.pending_entries(&owner()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_remove_entry() {
    let store = setup().await;
    let record = note("T", "c", &[]).to_record().unwrap();
    let entry = SyncQueueEntry::for_create(&record);
    store.enqueue(&entry).await.unwrap();

    store.remove_entry(entry.id()).await.unwrap();
    assert!(store.pending_entries(&owner()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_increment_retry() {
    let store = setup().await;
    let record = note("T", "c", &[]).to_record().unwrap();
    let entry = SyncQueueEntry::for_create(&record);
    store.enqueue(&entry).await.unwrap();

    let attempted = Utc::now();
    store.increment_retry(entry.id(), attempted).await.unwrap();
    store.increment_retry(entry.id(), attempted).await.unwrap();

    let pending = store.pending_entries(&owner()).await.unwrap();
    assert_eq!(pending[0].retry_count(), 2);
    assert!(pending[0].last_attempt_at().is_some());
}

#[tokio::test]
async fn test_entries_for_entity_and_bulk_removal() {
    let store = setup().await;
    let record_a = note("A", "c", &[]).to_record().unwrap();
    let record_b = note("B", "c", &[]).to_record().unwrap();

    store
        .enqueue(&SyncQueueEntry::for_create(&record_a))
        .await
        .unwrap();
    store
        .enqueue(&SyncQueueEntry::for_update(&record_a))
        .await
        .unwrap();
    store
        .enqueue(&SyncQueueEntry::for_create(&record_b))
        .await
        .unwrap();

    assert_eq!(store.entries_for_entity(&record_a.id).await.unwrap().len(), 2);

    store.remove_entries_for_entity(&record_a.id).await.unwrap();
    assert!(store.entries_for_entity(&record_a.id).await.unwrap().is_empty());
    // Other entities' entries survive
    assert_eq!(store.pending_entries(&owner()).await.unwrap().len(), 1);
}

// ============================================================================
// Transaction tests
// ============================================================================

#[tokio::test]
async fn test_put_with_entry_is_atomic() {
    let store = setup().await;
    let record = note("T", "c", &[]).to_record().unwrap();
    let entry = SyncQueueEntry::for_create(&record);

    store.put_with_entry(&record, &entry).await.unwrap();

    assert!(store.get(&record.id).await.unwrap().is_some());
    let pending = store.pending_entries(&owner()).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].entity_id(), &record.id);
}

#[tokio::test]
async fn test_put_with_entry_rolls_back_together() {
    let store = setup().await;
    let record = note("T", "c", &[]).to_record().unwrap();
    let entry = SyncQueueEntry::for_create(&record);
    store.put_with_entry(&record, &entry).await.unwrap();

    // Re-inserting the same queue entry id violates the primary key; the
    // record write in the same transaction must roll back with it.
    let mut replacement = record.clone();
    replacement.version = 99;
    let result = store.put_with_entry(&replacement, &entry).await;
    assert!(result.is_err());

    let fetched = store.get(&record.id).await.unwrap().unwrap();
    assert_eq!(fetched.version, record.version);
    assert_eq!(store.pending_entries(&owner()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_with_entry() {
    let store = setup().await;
    let record = note("T", "c", &[]).to_record().unwrap();
    store.put(&record).await.unwrap();

    let entry = SyncQueueEntry::for_delete(record.owner_id.clone(), record.kind, record.id);
    store.delete_with_entry(&record.id, &entry).await.unwrap();

    assert!(store.get(&record.id).await.unwrap().is_none());
    let pending = store.pending_entries(&owner()).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(
        pending[0].operation(),
        studypad_core::domain::SyncOperation::Delete
    );
}

// ============================================================================
// Checkpoint tests
// ============================================================================

#[tokio::test]
async fn test_checkpoint_roundtrip() {
    let store = setup().await;

    assert!(store
        .checkpoint(&owner(), EntityKind::Note)
        .await
        .unwrap()
        .is_none());

    let checkpoint = SyncCheckpoint {
        owner_id: owner(),
        kind: EntityKind::Note,
        cursor: Some(SyncCursor::new("cursor-42").unwrap()),
        last_pulled_at: Utc::now(),
    };
    store.save_checkpoint(&checkpoint).await.unwrap();

    let fetched = store
        .checkpoint(&owner(), EntityKind::Note)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.cursor, checkpoint.cursor);

    // Saving again replaces
    let newer = SyncCheckpoint {
        cursor: Some(SyncCursor::new("cursor-43").unwrap()),
        ..checkpoint
    };
    store.save_checkpoint(&newer).await.unwrap();
    let fetched = store
        .checkpoint(&owner(), EntityKind::Note)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.cursor.unwrap().as_str(), "cursor-43");
}

// ============================================================================
// Durability tests
// ============================================================================

#[tokio::test]
async fn test_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sync.db");

    let record = note("Durable", "still here", &["keep"]).to_record().unwrap();
    let entry = SyncQueueEntry::for_create(&record);

    {
        let pool = DatabasePool::new(&db_path).await.unwrap();
        let store = SqliteEntityStore::new(pool.pool().clone());
        store.put_with_entry(&record, &entry).await.unwrap();
    }

    // Simulated process restart: a fresh pool over the same file
    let pool = DatabasePool::new(&db_path).await.unwrap();
    let store = SqliteEntityStore::new(pool.pool().clone());

    let fetched = store.get(&record.id).await.unwrap().unwrap();
    assert_eq!(fetched.payload, record.payload);
    assert_eq!(fetched.sync_status, SyncStatus::Pending);

    let pending = store.pending_entries(&owner()).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].entity_id(), &record.id);
}
