//! Generic entity shape shared by notes, chats, and messages
//!
//! Typed entities ([`Note`](super::note::Note), [`Chat`](super::chat::Chat),
//! [`Message`](super::message::Message)) are what the helpers and the UI
//! work with. The store persists them as [`EntityRecord`]s: an envelope of
//! identity, timestamps, and sync bookkeeping around a JSON payload column.
//! The [`StoredEntity`] trait is the conversion seam between the two.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::{DomainError, StoreError};
use super::newtypes::{EntityId, OwnerId};

// ============================================================================
// SyncStatus
// ============================================================================

/// Synchronization state of a locally persisted entity
///
/// Set to `Pending` on every local mutation, flipped to `Synced` only after
/// the sync service confirms remote acceptance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// A local mutation awaits remote delivery
    #[default]
    Pending,
    /// The remote system has accepted the latest local state
    Synced,
    /// Local and remote diverged; resolved automatically, kept for telemetry
    Conflict,
    /// Remote delivery failed permanently; awaits explicit retry
    Error,
}

impl SyncStatus {
    /// Returns true if the entity has an outstanding local mutation
    pub fn is_pending(&self) -> bool {
        matches!(self, SyncStatus::Pending)
    }

    /// Returns true if the entity needs user attention
    pub fn needs_attention(&self) -> bool {
        matches!(self, SyncStatus::Error)
    }

    /// Returns the status as its stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Conflict => "conflict",
            SyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SyncStatus::Pending),
            "synced" => Ok(SyncStatus::Synced),
            "conflict" => Ok(SyncStatus::Conflict),
            "error" => Ok(SyncStatus::Error),
            other => Err(DomainError::Validation(format!(
                "unknown sync status: {other}"
            ))),
        }
    }
}

// ============================================================================
// EntityKind
// ============================================================================

/// The kind of a synchronized entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Note,
    Chat,
    Message,
}

impl EntityKind {
    /// All kinds, in the order the sync service pulls them (parents first,
    /// so messages never arrive before the chat they belong to)
    pub const ALL: [EntityKind; 3] = [EntityKind::Note, EntityKind::Chat, EntityKind::Message];

    /// Returns the kind as its stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Note => "note",
            EntityKind::Chat => "chat",
            EntityKind::Message => "message",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "note" => Ok(EntityKind::Note),
            "chat" => Ok(EntityKind::Chat),
            "message" => Ok(EntityKind::Message),
            other => Err(DomainError::Validation(format!(
                "unknown entity kind: {other}"
            ))),
        }
    }
}

// ============================================================================
// EntityRecord
// ============================================================================

/// The persisted form of an entity
///
/// Identity, timestamps, and sync bookkeeping live in columns; the
/// entity-specific fields live in the JSON `payload`. `search_text` is a
/// lowercased concatenation of the entity's indexed text fields, maintained
/// on every write so substring search never has to parse payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Globally unique, client-generated id
    pub id: EntityId,
    /// Owning user; all queries are scoped to it
    pub owner_id: OwnerId,
    /// Which typed entity the payload encodes
    pub kind: EntityKind,
    /// Parent reference (the chat id for messages, `None` otherwise)
    pub parent_id: Option<EntityId>,
    /// Entity-specific content as JSON
    pub payload: serde_json::Value,
    /// Lowercased searchable text derived from the payload
    pub search_text: String,
    /// When the entity was created
    pub created_at: DateTime<Utc>,
    /// Last local or remote mutation time; the conflict-resolution tiebreaker
    pub updated_at: DateTime<Utc>,
    /// Sync bookkeeping state
    pub sync_status: SyncStatus,
    /// Monotonically incrementing mutation counter
    pub version: i64,
}

/// Derives searchable text from a payload without a typed round-trip
///
/// Pulls the known text fields for each kind out of the JSON value; fields
/// missing from the payload contribute nothing. Used when reconciling remote
/// payloads whose shape the engine does not otherwise interpret.
pub fn search_text_from_payload(kind: EntityKind, payload: &serde_json::Value) -> String {
    fn text_field(payload: &serde_json::Value, key: &str) -> Option<String> {
        payload
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    let mut parts: Vec<String> = Vec::new();
    match kind {
        EntityKind::Note => {
            parts.extend(text_field(payload, "title"));
            parts.extend(text_field(payload, "content"));
            if let Some(tags) = payload.get("tags").and_then(|v| v.as_array()) {
                parts.extend(tags.iter().filter_map(|t| t.as_str()).map(str::to_lowercase));
            }
        }
        EntityKind::Chat => {
            parts.extend(text_field(payload, "name"));
        }
        EntityKind::Message => {
            parts.extend(text_field(payload, "body"));
        }
    }

    parts.join(" ")
}

// ============================================================================
// RecordPatch
// ============================================================================

/// A partial update applied to an existing record
///
/// All fields are optional; when `None`, the stored value is kept. Built
/// with the `with_` methods, so only explicitly named fields can change.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    /// Replacement payload
    pub payload: Option<serde_json::Value>,
    /// Replacement search text (set alongside `payload`)
    pub search_text: Option<String>,
    /// New mutation time
    pub updated_at: Option<DateTime<Utc>>,
    /// New sync bookkeeping state
    pub sync_status: Option<SyncStatus>,
    /// New version counter
    pub version: Option<i64>,
}

impl RecordPatch {
    /// Creates an empty patch (changes nothing)
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the replacement payload and its derived search text
    pub fn with_payload(mut self, kind: EntityKind, payload: serde_json::Value) -> Self {
        self.search_text = Some(search_text_from_payload(kind, &payload));
        self.payload = Some(payload);
        self
    }

    /// Sets the new mutation time
    pub fn with_updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// Sets the new sync status
    pub fn with_sync_status(mut self, status: SyncStatus) -> Self {
        self.sync_status = Some(status);
        self
    }

    /// Sets the new version counter
    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }

    /// Returns true if no fields are set
    pub fn is_empty(&self) -> bool {
        self.payload.is_none()
            && self.search_text.is_none()
            && self.updated_at.is_none()
            && self.sync_status.is_none()
            && self.version.is_none()
    }
}

// ============================================================================
// StoredEntity
// ============================================================================

/// Conversion seam between typed entities and their persisted records
pub trait StoredEntity: Sized {
    /// The kind tag stored with this entity's records
    const KIND: EntityKind;

    /// The entity's unique id
    fn id(&self) -> &EntityId;

    /// The owning user
    fn owner_id(&self) -> &OwnerId;

    /// Parent reference, if the kind has one
    fn parent_id(&self) -> Option<&EntityId> {
        None
    }

    /// Last mutation time
    fn updated_at(&self) -> DateTime<Utc>;

    /// Mutation counter
    fn version(&self) -> i64;

    /// Sync bookkeeping state
    fn sync_status(&self) -> SyncStatus;

    /// Lowercased searchable text for the indexed fields
    fn search_text(&self) -> String;

    /// Converts to the persisted record form
    fn to_record(&self) -> Result<EntityRecord, StoreError>;

    /// Reconstructs the typed entity from a persisted record
    fn from_record(record: &EntityRecord) -> Result<Self, StoreError>;
}
