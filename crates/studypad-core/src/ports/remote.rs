//! Remote API port (driven/secondary port)
//!
//! The request/response interface the sync service drains the queue against
//! and pulls deltas from. The core is agnostic to the transport; the REST
//! adapter lives in `studypad-remote`.
//!
//! Errors carry the one classification the engine needs: transient failures
//! (timeouts, 5xx, network) are retried with capped exponential backoff,
//! permanent failures (validation, other 4xx) mark the entity as errored
//! and are never auto-retried.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{
    entity::EntityKind,
    newtypes::{EntityId, OwnerId, SyncCursor},
};

/// Failure of a remote call, classified for retry policy
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Retryable: network failure, timeout, 408/429, or server 5xx
    #[error("Transient remote error: {0}")]
    Transient(String),

    /// Not retryable: the remote rejected the request (validation, 4xx)
    #[error("Permanent remote error: {0}")]
    Permanent(String),
}

impl RemoteError {
    /// Returns true if the sync service should retry the operation
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transient(_))
    }
}

/// An entity as reported by the remote system
///
/// The payload is opaque to the engine; it is stored verbatim during
/// reconciliation. Tombstones arrive with `deleted` set and an empty
/// payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEntity {
    pub id: EntityId,
    pub owner_id: OwnerId,
    pub kind: EntityKind,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
    pub deleted: bool,
}

/// One page of a remote listing
#[derive(Debug, Clone)]
pub struct RemotePage {
    /// Entities changed since the requested cursor
    pub entities: Vec<RemoteEntity>,
    /// Cursor for the next request; persisted as the checkpoint when the
    /// page is the last of the pull
    pub next_cursor: Option<SyncCursor>,
}

/// Port trait for the remote backend
#[async_trait::async_trait]
pub trait RemoteApi: Send + Sync {
    /// Lists entities of a kind changed since the given cursor
    async fn list_entities(
        &self,
        kind: EntityKind,
        owner: &OwnerId,
        since: Option<&SyncCursor>,
    ) -> Result<RemotePage, RemoteError>;

    /// Creates an entity remotely; the payload is a queue-entry replay body
    async fn create_entity(
        &self,
        kind: EntityKind,
        payload: &serde_json::Value,
    ) -> Result<RemoteEntity, RemoteError>;

    /// Updates (upserts) an entity remotely
    async fn update_entity(
        &self,
        kind: EntityKind,
        id: &EntityId,
        payload: &serde_json::Value,
    ) -> Result<RemoteEntity, RemoteError>;

    /// Deletes an entity remotely; deleting an already-absent id succeeds
    async fn delete_entity(&self, kind: EntityKind, id: &EntityId) -> Result<(), RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(RemoteError::Transient("503".into()).is_transient());
        assert!(!RemoteError::Permanent("422".into()).is_transient());
    }
}
