//! Chat helper
//!
//! Typed accessors and mutators for chats. Deleting a chat also deletes its
//! messages locally and enqueues their remote deletes, so no orphaned
//! messages survive a chat removal.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{
    Chat, ChatUpdate, EntityId, EntityKind, OwnerId, StoreError, StoredEntity, SyncQueueEntry,
};
use crate::ports::LocalStore;

use super::HelperError;

/// Typed wrapper around the local store for chats
pub struct ChatHelper {
    store: Arc<dyn LocalStore>,
}

impl ChatHelper {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Creates a chat locally and enqueues its remote create
    pub async fn create(
        &self,
        owner: &OwnerId,
        name: impl Into<String>,
        participants: Vec<String>,
    ) -> Result<Chat, HelperError> {
        let chat = Chat::new(owner.clone(), name, participants)?;
        let record = chat.to_record()?;
        let entry = SyncQueueEntry::for_create(&record);
        self.store.put_with_entry(&record, &entry).await?;

        debug!(id = %chat.id(), "chat created");
        Ok(chat)
    }

    /// Retrieves a chat by id
    pub async fn get(&self, id: &EntityId) -> Result<Option<Chat>, HelperError> {
        match self.store.get(id).await? {
            Some(record) => Ok(Some(Chat::from_record(&record)?)),
            None => Ok(None),
        }
    }

    /// Returns all of an owner's chats, newest first
    pub async fn list(&self, owner: &OwnerId) -> Result<Vec<Chat>, HelperError> {
        let records = self.store.get_all(Chat::KIND, owner, None).await?;
        records
            .iter()
            .map(|r| Chat::from_record(r).map_err(HelperError::from))
            .collect()
    }

    /// Applies a partial update (rename, participant change) and enqueues
    /// the remote update
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the id is absent.
    pub async fn update(&self, id: &EntityId, update: ChatUpdate) -> Result<Chat, HelperError> {
        let record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut chat = Chat::from_record(&record)?;
        chat.apply(update)?;

        let record = chat.to_record()?;
        let entry = SyncQueueEntry::for_update(&record);
        self.store.put_with_entry(&record, &entry).await?;
        Ok(chat)
    }

    /// Deletes a chat and its messages locally, enqueueing remote deletes
    ///
    /// Deleting an id with no local record is a no-op.
    pub async fn delete(&self, id: &EntityId) -> Result<(), HelperError> {
        let Some(record) = self.store.get(id).await? else {
            debug!(id = %id, "delete of unknown chat, skipping");
            return Ok(());
        };

        // Cascade to the chat's messages first so their delete entries
        // precede the chat's in the queue.
        let messages = self
            .store
            .get_all(EntityKind::Message, &record.owner_id, Some(id))
            .await?;
        for message in messages {
            let entry = SyncQueueEntry::for_delete(
                message.owner_id.clone(),
                message.kind,
                message.id,
            );
            self.store.delete_with_entry(&message.id, &entry).await?;
        }

        let entry = SyncQueueEntry::for_delete(record.owner_id.clone(), record.kind, record.id);
        self.store.delete_with_entry(id, &entry).await?;
        Ok(())
    }
}
