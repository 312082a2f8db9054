//! Note helper
//!
//! Typed accessors and mutators for notes. Mutations persist the new state
//! and its sync queue entry atomically and return the entity for optimistic
//! application; list and search read straight from the local store so they
//! are safe to call on a UI-mount path.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{
    EntityId, Note, NoteUpdate, OwnerId, StoreError, StoredEntity, SyncQueueEntry,
};
use crate::ports::LocalStore;

use super::HelperError;

/// Typed wrapper around the local store for notes
pub struct NoteHelper {
    store: Arc<dyn LocalStore>,
}

impl NoteHelper {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Creates a note locally and enqueues its remote create
    pub async fn create(
        &self,
        owner: &OwnerId,
        title: impl Into<String>,
        content: impl Into<String>,
        tags: Vec<String>,
    ) -> Result<Note, HelperError> {
        let note = Note::new(owner.clone(), title, content, tags)?;
        let record = note.to_record()?;
        let entry = SyncQueueEntry::for_create(&record);
        self.store.put_with_entry(&record, &entry).await?;

        debug!(id = %note.id(), "note created");
        Ok(note)
    }

    /// Retrieves a note by id
    pub async fn get(&self, id: &EntityId) -> Result<Option<Note>, HelperError> {
        match self.store.get(id).await? {
            Some(record) => Ok(Some(Note::from_record(&record)?)),
            None => Ok(None),
        }
    }

    /// Returns all of an owner's notes, newest first
    pub async fn list(&self, owner: &OwnerId) -> Result<Vec<Note>, HelperError> {
        let records = self.store.get_all(Note::KIND, owner, None).await?;
        records
            .iter()
            .map(|r| Note::from_record(r).map_err(HelperError::from))
            .collect()
    }

    /// Case-insensitive substring search over title, content, and tags
    pub async fn search(&self, owner: &OwnerId, query: &str) -> Result<Vec<Note>, HelperError> {
        let records = self.store.search(Note::KIND, owner, query).await?;
        records
            .iter()
            .map(|r| Note::from_record(r).map_err(HelperError::from))
            .collect()
    }

    /// Applies a partial update and enqueues the remote update
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the id is absent.
    pub async fn update(&self, id: &EntityId, update: NoteUpdate) -> Result<Note, HelperError> {
        let record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut note = Note::from_record(&record)?;
        note.apply(update)?;

        let record = note.to_record()?;
        let entry = SyncQueueEntry::for_update(&record);
        self.store.put_with_entry(&record, &entry).await?;
        Ok(note)
    }

    /// Flips the favorite flag and enqueues the remote update
    pub async fn toggle_favorite(&self, id: &EntityId) -> Result<Note, HelperError> {
        let record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut note = Note::from_record(&record)?;
        note.toggle_favorite();

        let record = note.to_record()?;
        let entry = SyncQueueEntry::for_update(&record);
        self.store.put_with_entry(&record, &entry).await?;
        Ok(note)
    }

    /// Deletes a note locally and enqueues the remote delete
    ///
    /// Deleting an id with no local record is a no-op (and enqueues
    /// nothing).
    pub async fn delete(&self, id: &EntityId) -> Result<(), HelperError> {
        let Some(record) = self.store.get(id).await? else {
            debug!(id = %id, "delete of unknown note, skipping");
            return Ok(());
        };

        let entry = SyncQueueEntry::for_delete(record.owner_id.clone(), record.kind, record.id);
        self.store.delete_with_entry(id, &entry).await?;
        Ok(())
    }
}
