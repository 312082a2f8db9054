//! Local store port (driven/secondary port)
//!
//! Durable, queryable, transactional storage for entities, the sync queue,
//! and sync checkpoints. The store exclusively owns entity and queue
//! durability; the sync service and the entity helpers operate through this
//! interface only.
//!
//! ## Design Notes
//!
//! - Errors are typed ([`StoreError`](crate::domain::StoreError)) rather
//!   than opaque, because callers must distinguish a storage failure
//!   (roll back optimistic state) from a missing id (no-op failure).
//! - The `put_with_entry`/`delete_with_entry` pairs exist so that a local
//!   write and its queue entry commit atomically: an entity left pending
//!   without a queue entry would never be delivered.
//! - Queue reads do not consume: removal is the sync service's
//!   responsibility after confirmed remote success.

use chrono::{DateTime, Utc};

use crate::domain::{
    entity::{EntityKind, EntityRecord, RecordPatch, SyncStatus},
    errors::StoreError,
    newtypes::{EntityId, EntryId, OwnerId, SyncCursor},
    queue_entry::SyncQueueEntry,
};

/// Per-(owner, kind) bookmark of the last completed remote pull
#[derive(Debug, Clone, PartialEq)]
pub struct SyncCheckpoint {
    /// The owner scope the cursor belongs to
    pub owner_id: OwnerId,
    /// The entity kind the cursor belongs to
    pub kind: EntityKind,
    /// Opaque cursor to resume the next pull from, if the remote issued one
    pub cursor: Option<SyncCursor>,
    /// When the last pull for this scope completed
    pub last_pulled_at: DateTime<Utc>,
}

/// Port trait for durable local storage
#[async_trait::async_trait]
pub trait LocalStore: Send + Sync {
    // --- Entity operations ---

    /// Returns all records of a kind for an owner, newest first
    ///
    /// When `parent` is set, only records whose `parent_id` matches are
    /// returned (e.g. the messages of one chat).
    async fn get_all(
        &self,
        kind: EntityKind,
        owner: &OwnerId,
        parent: Option<&EntityId>,
    ) -> Result<Vec<EntityRecord>, StoreError>;

    /// Retrieves a record by id
    async fn get(&self, id: &EntityId) -> Result<Option<EntityRecord>, StoreError>;

    /// Inserts or replaces a record by id
    async fn put(&self, record: &EntityRecord) -> Result<(), StoreError>;

    /// Merges a patch into an existing record
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the id is absent.
    async fn update(&self, id: &EntityId, patch: &RecordPatch) -> Result<(), StoreError>;

    /// Removes a record; deleting a missing id is not an error
    async fn delete(&self, id: &EntityId) -> Result<(), StoreError>;

    /// Case-insensitive substring match over the indexed text fields
    async fn search(
        &self,
        kind: EntityKind,
        owner: &OwnerId,
        query: &str,
    ) -> Result<Vec<EntityRecord>, StoreError>;

    /// Sets only the sync status of a record
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the id is absent.
    async fn set_sync_status(&self, id: &EntityId, status: SyncStatus) -> Result<(), StoreError>;

    // --- Atomic entity + queue writes ---

    /// Persists a record and its queue entry in one transaction
    async fn put_with_entry(
        &self,
        record: &EntityRecord,
        entry: &SyncQueueEntry,
    ) -> Result<(), StoreError>;

    /// Deletes a record and enqueues its delete entry in one transaction
    async fn delete_with_entry(
        &self,
        id: &EntityId,
        entry: &SyncQueueEntry,
    ) -> Result<(), StoreError>;

    // --- Sync queue operations ---

    /// Appends an entry to the queue
    async fn enqueue(&self, entry: &SyncQueueEntry) -> Result<(), StoreError>;

    /// Returns all outstanding entries for an owner in FIFO order
    /// (`created_at` ascending); does not remove them
    async fn pending_entries(&self, owner: &OwnerId) -> Result<Vec<SyncQueueEntry>, StoreError>;

    /// Returns the outstanding entries referencing one entity, FIFO order
    async fn entries_for_entity(
        &self,
        entity_id: &EntityId,
    ) -> Result<Vec<SyncQueueEntry>, StoreError>;

    /// Deletes a successfully processed entry
    async fn remove_entry(&self, id: &EntryId) -> Result<(), StoreError>;

    /// Bumps an entry's retry count and records the attempt time
    async fn increment_retry(
        &self,
        id: &EntryId,
        attempted_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Discards every entry referencing an entity (superseded by remote state
    /// or by permanent failure)
    async fn remove_entries_for_entity(&self, entity_id: &EntityId) -> Result<(), StoreError>;

    // --- Sync checkpoints ---

    /// Returns the stored checkpoint for an (owner, kind) scope
    async fn checkpoint(
        &self,
        owner: &OwnerId,
        kind: EntityKind,
    ) -> Result<Option<SyncCheckpoint>, StoreError>;

    /// Inserts or replaces a checkpoint
    async fn save_checkpoint(&self, checkpoint: &SyncCheckpoint) -> Result<(), StoreError>;
}
