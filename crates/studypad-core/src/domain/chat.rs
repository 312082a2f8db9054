//! Chat entity
//!
//! A conversation container. Messages reference their chat via `parent_id`
//! on the persisted record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{EntityKind, EntityRecord, StoredEntity, SyncStatus};
use super::errors::{DomainError, StoreError};
use super::newtypes::{EntityId, OwnerId};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatPayload {
    name: String,
    participants: Vec<String>,
}

/// Explicit partial update for a chat
#[derive(Debug, Clone, Default)]
pub struct ChatUpdate {
    pub name: Option<String>,
    pub participants: Option<Vec<String>>,
}

/// A conversation
#[derive(Debug, Clone, PartialEq)]
pub struct Chat {
    id: EntityId,
    owner_id: OwnerId,
    name: String,
    participants: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    sync_status: SyncStatus,
    version: i64,
}

impl Chat {
    /// Creates a new chat with a client-generated id and pending sync status
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the name is empty.
    pub fn new(
        owner_id: OwnerId,
        name: impl Into<String>,
        participants: Vec<String>,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::Validation(
                "chat name must not be empty".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id: EntityId::new(),
            owner_id,
            name,
            participants,
            created_at: now,
            updated_at: now,
            sync_status: SyncStatus::Pending,
            version: 1,
        })
    }

    // --- Getters ---

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn participants(&self) -> &[String] {
        &self.participants
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.sync_status
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    // --- Mutations ---

    /// Applies a partial update, bumping version and resetting to pending
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the update would empty the name.
    pub fn apply(&mut self, update: ChatUpdate) -> Result<(), DomainError> {
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(DomainError::Validation(
                    "chat name must not be empty".to_string(),
                ));
            }
            self.name = name;
        }
        if let Some(participants) = update.participants {
            self.participants = participants;
        }
        self.version += 1;
        self.updated_at = Utc::now();
        self.sync_status = SyncStatus::Pending;
        Ok(())
    }

    /// Marks the latest local state as accepted by the remote system
    pub fn mark_synced(&mut self) {
        self.sync_status = SyncStatus::Synced;
    }
}

impl StoredEntity for Chat {
    const KIND: EntityKind = EntityKind::Chat;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn sync_status(&self) -> SyncStatus {
        self.sync_status
    }

    fn search_text(&self) -> String {
        self.name.to_lowercase()
    }

    fn to_record(&self) -> Result<EntityRecord, StoreError> {
        let payload = serde_json::to_value(ChatPayload {
            name: self.name.clone(),
            participants: self.participants.clone(),
        })?;
        Ok(EntityRecord {
            id: self.id,
            owner_id: self.owner_id.clone(),
            kind: Self::KIND,
            parent_id: None,
            search_text: self.search_text(),
            payload,
            created_at: self.created_at,
            updated_at: self.updated_at,
            sync_status: self.sync_status,
            version: self.version,
        })
    }

    fn from_record(record: &EntityRecord) -> Result<Self, StoreError> {
        let payload: ChatPayload = serde_json::from_value(record.payload.clone())?;
        Ok(Self {
            id: record.id,
            owner_id: record.owner_id.clone(),
            name: payload.name,
            participants: payload.participants,
            created_at: record.created_at,
            updated_at: record.updated_at,
            sync_status: record.sync_status,
            version: record.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> OwnerId {
        OwnerId::new("user-1").unwrap()
    }

    #[test]
    fn test_new_chat() {
        let chat = Chat::new(owner(), "Study Group", vec!["user-2".to_string()]).unwrap();
        assert_eq!(chat.sync_status(), SyncStatus::Pending);
        assert_eq!(chat.version(), 1);
        assert_eq!(chat.participants().len(), 1);
    }

    #[test]
    fn test_new_chat_rejects_empty_name() {
        assert!(Chat::new(owner(), "", vec![]).is_err());
    }

    #[test]
    fn test_rename() {
        let mut chat = Chat::new(owner(), "Old", vec![]).unwrap();
        chat.mark_synced();
        chat.apply(ChatUpdate {
            name: Some("New".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(chat.name(), "New");
        assert_eq!(chat.version(), 2);
        assert_eq!(chat.sync_status(), SyncStatus::Pending);
    }

    #[test]
    fn test_record_roundtrip() {
        let chat = Chat::new(owner(), "Study Group", vec!["user-2".to_string()]).unwrap();
        let record = chat.to_record().unwrap();
        assert_eq!(record.kind, EntityKind::Chat);
        assert_eq!(record.search_text, "study group");
        let restored = Chat::from_record(&record).unwrap();
        assert_eq!(restored, chat);
    }
}
