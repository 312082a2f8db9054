//! Entity helpers (use-case layer)
//!
//! Typed, validated wrappers around the local store for each entity kind,
//! and the only code that knows entity-specific invariants. Every mutating
//! helper performs, as one logical unit: compute the new entity state,
//! persist it together with its sync queue entry atomically, and return the
//! new state to the caller for optimistic application. Helpers never call
//! the remote API.

pub mod chats;
pub mod messages;
pub mod notes;

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::domain::{DomainError, EntityId, StoreError, SyncQueueEntry, SyncStatus};
use crate::ports::LocalStore;

pub use chats::ChatHelper;
pub use messages::MessageHelper;
pub use notes::NoteHelper;

/// Failure of an entity helper operation
#[derive(Debug, Error)]
pub enum HelperError {
    /// An entity invariant was violated
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The local store failed or the target record was missing
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl HelperError {
    /// Returns true for storage-layer failures that require the caller to
    /// roll back optimistic state
    pub fn is_storage(&self) -> bool {
        matches!(self, HelperError::Store(e) if e.is_storage())
    }
}

/// Re-arms delivery for an entity stuck in `sync_status = error`
///
/// Marks the record pending again and enqueues an update replaying its
/// current state, atomically. Entities in any other status are left alone.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if the id is absent.
pub async fn retry_entity(store: &Arc<dyn LocalStore>, id: &EntityId) -> Result<(), HelperError> {
    let mut record = store
        .get(id)
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

    if record.sync_status != SyncStatus::Error {
        debug!(id = %id, status = %record.sync_status, "retry requested for non-errored entity, skipping");
        return Ok(());
    }

    record.sync_status = SyncStatus::Pending;
    let entry = SyncQueueEntry::for_update(&record);
    store.put_with_entry(&record, &entry).await?;
    Ok(())
}
