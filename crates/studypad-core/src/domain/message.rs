//! Message entity
//!
//! A message inside a chat. The delivery status only moves forward:
//!
//! ```text
//!     sent ───► delivered ───► read
//! ```
//!
//! Backward transitions are rejected; a transition to the current status is
//! a no-op rather than an error, so repeated mark-as-read calls are safe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::entity::{EntityKind, EntityRecord, StoredEntity, SyncStatus};
use super::errors::{DomainError, StoreError};
use super::newtypes::{EntityId, OwnerId};

// ============================================================================
// MessageStatus
// ============================================================================

/// Delivery status of a message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Accepted locally, awaiting delivery confirmation
    #[default]
    Sent,
    /// The recipient's device has received the message
    Delivered,
    /// The recipient has read the message
    Read,
}

impl MessageStatus {
    /// Returns true if the status may move to `target`
    ///
    /// The ordering `sent < delivered < read` makes forward-only a simple
    /// comparison; equal status counts as an allowed no-op.
    pub fn can_transition_to(&self, target: MessageStatus) -> bool {
        target >= *self
    }

    /// Returns the status as its stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(MessageStatus::Sent),
            "delivered" => Ok(MessageStatus::Delivered),
            "read" => Ok(MessageStatus::Read),
            other => Err(DomainError::Validation(format!(
                "unknown message status: {other}"
            ))),
        }
    }
}

// ============================================================================
// Message
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MessagePayload {
    chat_id: EntityId,
    body: String,
    attachments: Vec<String>,
    status: MessageStatus,
}

/// Explicit partial update for a message
#[derive(Debug, Clone, Default)]
pub struct MessageUpdate {
    pub body: Option<String>,
    pub status: Option<MessageStatus>,
}

/// A message belonging to a chat
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: EntityId,
    owner_id: OwnerId,
    chat_id: EntityId,
    body: String,
    attachments: Vec<String>,
    status: MessageStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    sync_status: SyncStatus,
    version: i64,
}

impl Message {
    /// Creates a new message with a client-generated id and pending sync status
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the body is empty and there are
    /// no attachments.
    pub fn new(
        owner_id: OwnerId,
        chat_id: EntityId,
        body: impl Into<String>,
        attachments: Vec<String>,
    ) -> Result<Self, DomainError> {
        let body = body.into();
        if body.trim().is_empty() && attachments.is_empty() {
            return Err(DomainError::Validation(
                "message must have a body or attachments".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id: EntityId::new(),
            owner_id,
            chat_id,
            body,
            attachments,
            status: MessageStatus::Sent,
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

    pub fn chat_id(&self) -> &EntityId {
        &self.chat_id
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn attachments(&self) -> &[String] {
        &self.attachments
    }

    pub fn status(&self) -> MessageStatus {
        self.status
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
    /// A status update that matches the current status leaves the message
    /// untouched when nothing else changed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidStatusTransition` on a backward status
    /// move.
    pub fn apply(&mut self, update: MessageUpdate) -> Result<(), DomainError> {
        let mut changed = false;

        if let Some(status) = update.status {
            if !self.status.can_transition_to(status) {
                return Err(DomainError::InvalidStatusTransition {
                    from: self.status.as_str().to_string(),
                    to: status.as_str().to_string(),
                });
            }
            if status != self.status {
                self.status = status;
                changed = true;
            }
        }
        if let Some(body) = update.body {
            if body != self.body {
                self.body = body;
                changed = true;
            }
        }

        if changed {
            self.version += 1;
            self.updated_at = Utc::now();
            self.sync_status = SyncStatus::Pending;
        }
        Ok(())
    }

    /// Advances the status to read; a no-op if already read
    ///
    /// Returns true if the status actually changed.
    pub fn mark_read(&mut self) -> bool {
        if self.status == MessageStatus::Read {
            return false;
        }
        self.status = MessageStatus::Read;
        self.version += 1;
        self.updated_at = Utc::now();
        self.sync_status = SyncStatus::Pending;
        true
    }

    /// Marks the latest local state as accepted by the remote system
    pub fn mark_synced(&mut self) {
        self.sync_status = SyncStatus::Synced;
    }
}

impl StoredEntity for Message {
    const KIND: EntityKind = EntityKind::Message;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    fn parent_id(&self) -> Option<&EntityId> {
        Some(&self.chat_id)
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
        self.body.to_lowercase()
    }

    fn to_record(&self) -> Result<EntityRecord, StoreError> {
        let payload = serde_json::to_value(MessagePayload {
            chat_id: self.chat_id,
            body: self.body.clone(),
            attachments: self.attachments.clone(),
            status: self.status,
        })?;
        Ok(EntityRecord {
            id: self.id,
            owner_id: self.owner_id.clone(),
            kind: Self::KIND,
            parent_id: Some(self.chat_id),
            search_text: self.search_text(),
            payload,
            created_at: self.created_at,
            updated_at: self.updated_at,
            sync_status: self.sync_status,
            version: self.version,
        })
    }

    fn from_record(record: &EntityRecord) -> Result<Self, StoreError> {
        let payload: MessagePayload = serde_json::from_value(record.payload.clone())?;
        Ok(Self {
            id: record.id,
            owner_id: record.owner_id.clone(),
            chat_id: payload.chat_id,
            body: payload.body,
            attachments: payload.attachments,
            status: payload.status,
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

    fn message() -> Message {
        Message::new(owner(), EntityId::new(), "hello", vec![]).unwrap()
    }

    #[test]
    fn test_new_message_starts_sent() {
        let msg = message();
        assert_eq!(msg.status(), MessageStatus::Sent);
        assert_eq!(msg.sync_status(), SyncStatus::Pending);
        assert_eq!(msg.version(), 1);
    }

    #[test]
    fn test_new_message_requires_body_or_attachment() {
        assert!(Message::new(owner(), EntityId::new(), "", vec![]).is_err());
        assert!(
            Message::new(owner(), EntityId::new(), "", vec!["file.pdf".to_string()]).is_ok()
        );
    }

    #[test]
    fn test_status_moves_only_forward() {
        assert!(MessageStatus::Sent.can_transition_to(MessageStatus::Delivered));
        assert!(MessageStatus::Sent.can_transition_to(MessageStatus::Read));
        assert!(MessageStatus::Delivered.can_transition_to(MessageStatus::Read));
        assert!(!MessageStatus::Read.can_transition_to(MessageStatus::Delivered));
        assert!(!MessageStatus::Delivered.can_transition_to(MessageStatus::Sent));
        // Same status is an allowed no-op
        assert!(MessageStatus::Read.can_transition_to(MessageStatus::Read));
    }

    #[test]
    fn test_apply_rejects_backward_status() {
        let mut msg = message();
        msg.mark_read();
        let result = msg.apply(MessageUpdate {
            status: Some(MessageStatus::Sent),
            ..Default::default()
        });
        assert!(matches!(
            result,
            Err(DomainError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn test_mark_read_is_idempotent() {
        let mut msg = message();
        assert!(msg.mark_read());
        let version = msg.version();
        assert!(!msg.mark_read());
        assert_eq!(msg.version(), version);
    }

    #[test]
    fn test_same_status_apply_does_not_bump_version() {
        let mut msg = message();
        msg.apply(MessageUpdate {
            status: Some(MessageStatus::Sent),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(msg.version(), 1);
    }

    #[test]
    fn test_record_roundtrip_keeps_parent() {
        let msg = message();
        let record = msg.to_record().unwrap();
        assert_eq!(record.kind, EntityKind::Message);
        assert_eq!(record.parent_id.as_ref(), Some(msg.chat_id()));
        let restored = Message::from_record(&record).unwrap();
        assert_eq!(restored, msg);
    }
}
