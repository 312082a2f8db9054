//! Domain model for the local-first sync layer
//!
//! Entities (notes, chats, messages), the generic persisted record shape,
//! the sync queue entry, and the error taxonomy shared by all layers.

pub mod chat;
pub mod entity;
pub mod errors;
pub mod message;
pub mod newtypes;
pub mod note;
pub mod queue_entry;

pub use chat::{Chat, ChatUpdate};
pub use entity::{EntityKind, EntityRecord, RecordPatch, StoredEntity, SyncStatus};
pub use errors::{DomainError, StoreError};
pub use message::{Message, MessageStatus, MessageUpdate};
pub use newtypes::{EntityId, EntryId, OwnerId, SyncCursor};
pub use note::{Note, NoteUpdate};
pub use queue_entry::{SyncOperation, SyncQueueEntry};
