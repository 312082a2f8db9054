//! Sync queue entry
//!
//! A durable record of one pending local mutation awaiting remote
//! reconciliation. Entries are created atomically alongside the optimistic
//! local write, removed once the remote call succeeds, and retained with an
//! incremented retry count on transient failure.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::entity::{EntityKind, EntityRecord};
use super::errors::DomainError;
use super::newtypes::{EntityId, EntryId, OwnerId};

// ============================================================================
// SyncOperation
// ============================================================================

/// The remote mutation an entry replays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    Create,
    Update,
    Delete,
}

impl SyncOperation {
    /// Returns the operation as its stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperation::Create => "create",
            SyncOperation::Update => "update",
            SyncOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncOperation {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(SyncOperation::Create),
            "update" => Ok(SyncOperation::Update),
            "delete" => Ok(SyncOperation::Delete),
            other => Err(DomainError::Validation(format!(
                "unknown sync operation: {other}"
            ))),
        }
    }
}

// ============================================================================
// SyncQueueEntry
// ============================================================================

/// A pending local mutation, durable until remotely confirmed
///
/// The payload carries everything needed to replay the mutation remotely:
/// the entity's identity envelope plus its full current payload for creates
/// and updates, identity only for deletes. Replaying full state keeps the
/// remote call idempotent and makes manual retry a plain re-enqueue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueEntry {
    id: EntryId,
    owner_id: OwnerId,
    kind: EntityKind,
    entity_id: EntityId,
    operation: SyncOperation,
    payload: serde_json::Value,
    retry_count: u32,
    created_at: DateTime<Utc>,
    last_attempt_at: Option<DateTime<Utc>>,
}

impl SyncQueueEntry {
    /// Builds an entry replaying a create of the given record
    pub fn for_create(record: &EntityRecord) -> Self {
        Self::from_record(record, SyncOperation::Create)
    }

    /// Builds an entry replaying an update of the given record
    pub fn for_update(record: &EntityRecord) -> Self {
        Self::from_record(record, SyncOperation::Update)
    }

    /// Builds an entry replaying a delete of the given entity
    pub fn for_delete(owner_id: OwnerId, kind: EntityKind, entity_id: EntityId) -> Self {
        Self {
            id: EntryId::new(),
            owner_id,
            kind,
            entity_id,
            operation: SyncOperation::Delete,
            payload: serde_json::json!({ "id": entity_id }),
            retry_count: 0,
            created_at: Utc::now(),
            last_attempt_at: None,
        }
    }

    fn from_record(record: &EntityRecord, operation: SyncOperation) -> Self {
        let payload = serde_json::json!({
            "id": record.id,
            "owner_id": record.owner_id,
            "created_at": record.created_at,
            "updated_at": record.updated_at,
            "version": record.version,
            "data": record.payload,
        });
        Self {
            id: EntryId::new(),
            owner_id: record.owner_id.clone(),
            kind: record.kind,
            entity_id: record.id,
            operation,
            payload,
            retry_count: 0,
            created_at: Utc::now(),
            last_attempt_at: None,
        }
    }

    /// Reconstructs an entry from its stored fields
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: EntryId,
        owner_id: OwnerId,
        kind: EntityKind,
        entity_id: EntityId,
        operation: SyncOperation,
        payload: serde_json::Value,
        retry_count: u32,
        created_at: DateTime<Utc>,
        last_attempt_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            owner_id,
            kind,
            entity_id,
            operation,
            payload,
            retry_count,
            created_at,
            last_attempt_at,
        }
    }

    // --- Getters ---

    pub fn id(&self) -> &EntryId {
        &self.id
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn operation(&self) -> SyncOperation {
        self.operation
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_attempt_at(&self) -> Option<DateTime<Utc>> {
        self.last_attempt_at
    }

    // --- Retry bookkeeping ---

    /// Records a failed remote attempt
    pub fn record_attempt(&mut self, at: DateTime<Utc>) {
        self.retry_count += 1;
        self.last_attempt_at = Some(at);
    }

    /// Returns true once the capped exponential backoff window has elapsed
    ///
    /// The delay is `base_delay * 2^retry_count`, capped at `max_delay`,
    /// measured from the last attempt. An entry that has never been
    /// attempted is always due.
    pub fn is_due(&self, now: DateTime<Utc>, base_delay: Duration, max_delay: Duration) -> bool {
        let Some(last_attempt) = self.last_attempt_at else {
            return true;
        };
        let multiplier = 2i32.saturating_pow(self.retry_count.min(30));
        let delay = base_delay * multiplier;
        let delay = if delay > max_delay { max_delay } else { delay };
        now >= last_attempt + delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::note::Note;
    use crate::domain::StoredEntity;

    fn owner() -> OwnerId {
        OwnerId::new("user-1").unwrap()
    }

    fn record() -> EntityRecord {
        Note::new(owner(), "T", "c", vec![])
            .unwrap()
            .to_record()
            .unwrap()
    }

    #[test]
    fn test_for_create_carries_identity_and_data() {
        let record = record();
        let entry = SyncQueueEntry::for_create(&record);

        assert_eq!(entry.operation(), SyncOperation::Create);
        assert_eq!(entry.entity_id(), &record.id);
        assert_eq!(entry.kind(), EntityKind::Note);
        assert_eq!(entry.retry_count(), 0);
        assert_eq!(
            entry.payload().get("id").and_then(|v| v.as_str()),
            Some(record.id.to_string().as_str())
        );
        assert_eq!(entry.payload().get("data"), Some(&record.payload));
    }

    #[test]
    fn test_for_delete_carries_identity_only() {
        let entity_id = EntityId::new();
        let entry = SyncQueueEntry::for_delete(owner(), EntityKind::Chat, entity_id);
        assert_eq!(entry.operation(), SyncOperation::Delete);
        assert_eq!(entry.entity_id(), &entity_id);
        assert!(entry.payload().get("data").is_none());
    }

    #[test]
    fn test_fresh_entry_is_due() {
        let entry = SyncQueueEntry::for_create(&record());
        assert!(entry.is_due(Utc::now(), Duration::milliseconds(500), Duration::seconds(60)));
    }

    #[test]
    fn test_backoff_window_grows_with_retries() {
        let mut entry = SyncQueueEntry::for_create(&record());
        let base = Duration::milliseconds(500);
        let cap = Duration::seconds(60);
        let attempt_time = Utc::now();

        entry.record_attempt(attempt_time);
        assert_eq!(entry.retry_count(), 1);
        // delay = 500ms * 2^1 = 1s
        assert!(!entry.is_due(attempt_time + Duration::milliseconds(900), base, cap));
        assert!(entry.is_due(attempt_time + Duration::milliseconds(1100), base, cap));

        entry.record_attempt(attempt_time);
        // delay = 500ms * 2^2 = 2s
        assert!(!entry.is_due(attempt_time + Duration::milliseconds(1500), base, cap));
        assert!(entry.is_due(attempt_time + Duration::milliseconds(2100), base, cap));
    }

    #[test]
    fn test_backoff_is_capped() {
        let mut entry = SyncQueueEntry::for_create(&record());
        let attempt_time = Utc::now();
        for _ in 0..20 {
            entry.record_attempt(attempt_time);
        }
        // 500ms * 2^20 would be ~6 days; the cap keeps it at 60s
        assert!(entry.is_due(
            attempt_time + Duration::seconds(61),
            Duration::milliseconds(500),
            Duration::seconds(60)
        ));
    }

    #[test]
    fn test_operation_roundtrip() {
        for op in [
            SyncOperation::Create,
            SyncOperation::Update,
            SyncOperation::Delete,
        ] {
            let parsed: SyncOperation = op.as_str().parse().unwrap();
            assert_eq!(op, parsed);
        }
    }
}
