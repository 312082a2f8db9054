//! Message helper
//!
//! Typed accessors and mutators for messages. `mark_as_read` is the
//! idempotent path the conversation view calls on scroll; it only persists
//! and enqueues when the status actually changes.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{
    EntityId, Message, MessageUpdate, OwnerId, StoreError, StoredEntity, SyncQueueEntry,
};
use crate::ports::LocalStore;

use super::HelperError;

/// Typed wrapper around the local store for messages
pub struct MessageHelper {
    store: Arc<dyn LocalStore>,
}

impl MessageHelper {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Creates a message locally and enqueues its remote create
    pub async fn send(
        &self,
        owner: &OwnerId,
        chat_id: &EntityId,
        body: impl Into<String>,
        attachments: Vec<String>,
    ) -> Result<Message, HelperError> {
        let message = Message::new(owner.clone(), *chat_id, body, attachments)?;
        let record = message.to_record()?;
        let entry = SyncQueueEntry::for_create(&record);
        self.store.put_with_entry(&record, &entry).await?;

        debug!(id = %message.id(), chat_id = %chat_id, "message sent");
        Ok(message)
    }

    /// Retrieves a message by id
    pub async fn get(&self, id: &EntityId) -> Result<Option<Message>, HelperError> {
        match self.store.get(id).await? {
            Some(record) => Ok(Some(Message::from_record(&record)?)),
            None => Ok(None),
        }
    }

    /// Returns all messages of one chat, newest first
    pub async fn list_for_chat(
        &self,
        owner: &OwnerId,
        chat_id: &EntityId,
    ) -> Result<Vec<Message>, HelperError> {
        let records = self
            .store
            .get_all(Message::KIND, owner, Some(chat_id))
            .await?;
        records
            .iter()
            .map(|r| Message::from_record(r).map_err(HelperError::from))
            .collect()
    }

    /// Applies a partial update (edit body, advance status) and enqueues the
    /// remote update
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the id is absent, or
    /// `DomainError::InvalidStatusTransition` on a backward status move.
    pub async fn update(
        &self,
        id: &EntityId,
        update: MessageUpdate,
    ) -> Result<Message, HelperError> {
        let record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut message = Message::from_record(&record)?;
        message.apply(update)?;

        let record = message.to_record()?;
        let entry = SyncQueueEntry::for_update(&record);
        self.store.put_with_entry(&record, &entry).await?;
        Ok(message)
    }

    /// Advances a message's status to read
    ///
    /// Already-read messages are returned unchanged with nothing persisted
    /// or enqueued.
    pub async fn mark_as_read(&self, id: &EntityId) -> Result<Message, HelperError> {
        let record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut message = Message::from_record(&record)?;
        if !message.mark_read() {
            return Ok(message);
        }

        let record = message.to_record()?;
        let entry = SyncQueueEntry::for_update(&record);
        self.store.put_with_entry(&record, &entry).await?;
        Ok(message)
    }

    /// Deletes a message locally and enqueues the remote delete
    ///
    /// Deleting an id with no local record is a no-op.
    pub async fn delete(&self, id: &EntityId) -> Result<(), HelperError> {
        let Some(record) = self.store.get(id).await? else {
            debug!(id = %id, "delete of unknown message, skipping");
            return Ok(());
        };

        let entry = SyncQueueEntry::for_delete(record.owner_id.clone(), record.kind, record.id);
        self.store.delete_with_entry(id, &entry).await?;
        Ok(())
    }
}
