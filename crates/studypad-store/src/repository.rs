//! SQLite implementation of the LocalStore port
//!
//! Handles all domain type serialization/deserialization and SQL query
//! construction.
//!
//! ## Type Mapping
//!
//! | Domain Type      | SQL Type | Strategy                                   |
//! |------------------|----------|--------------------------------------------|
//! | EntityId, EntryId| TEXT     | UUID string via `.to_string()` / `FromStr` |
//! | OwnerId          | TEXT     | String via `.as_str()` / `OwnerId::new()`  |
//! | EntityKind       | TEXT     | `.as_str()` / `FromStr`                    |
//! | SyncStatus       | TEXT     | `.as_str()` / `FromStr`                    |
//! | SyncOperation    | TEXT     | `.as_str()` / `FromStr`                    |
//! | SyncCursor       | TEXT     | String via `.as_str()` / `SyncCursor::new()` |
//! | payload (JSON)   | TEXT     | serde_json string                          |
//! | DateTime<Utc>    | TEXT     | ISO 8601 via `to_rfc3339()` / `parse_from_rfc3339()` |

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use studypad_core::domain::{
    EntityId, EntityKind, EntityRecord, EntryId, OwnerId, RecordPatch, StoreError, SyncCursor,
    SyncOperation, SyncQueueEntry, SyncStatus,
};
use studypad_core::ports::{LocalStore, SyncCheckpoint};

/// SQLite-based implementation of the local store port
///
/// Provides persistent storage for entity records, the sync queue, and sync
/// checkpoints. All operations go through a connection pool; the multi-record
/// writes the queue invariant depends on run inside transactions.
pub struct SqliteEntityStore {
    pool: SqlitePool,
}

impl SqliteEntityStore {
    /// Creates a new store instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

fn storage_err(e: sqlx::Error) -> StoreError {
    StoreError::Storage(e.to_string())
}

fn invalid_column(column: &str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization(format!("Invalid {} column: {}", column, detail))
}

/// Parse a DateTime<Utc> from an ISO 8601 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| invalid_column("datetime", format!("'{}': {}", s, e)))
}

/// Parse an optional DateTime<Utc> from an optional string
fn parse_optional_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    match s {
        Some(ref val) if !val.is_empty() => parse_datetime(val).map(Some),
        _ => Ok(None),
    }
}

/// Escape LIKE wildcards so user queries match literally
fn escape_like(query: &str) -> String {
    query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

// ============================================================================
// Row mapping functions
// ============================================================================

/// Reconstruct an EntityRecord from a database row
fn record_from_row(row: &SqliteRow) -> Result<EntityRecord, StoreError> {
    let id_str: String = row.get("id");
    let owner_str: String = row.get("owner_id");
    let kind_str: String = row.get("kind");
    let parent_str: Option<String> = row.get("parent_id");
    let payload_str: String = row.get("payload");
    let search_text: String = row.get("search_text");
    let created_at_str: String = row.get("created_at");
    let updated_at_str: String = row.get("updated_at");
    let status_str: String = row.get("sync_status");
    let version: i64 = row.get("version");

    let parent_id = match parent_str {
        Some(ref s) if !s.is_empty() => {
            Some(EntityId::from_str(s).map_err(|e| invalid_column("parent_id", e))?)
        }
        _ => None,
    };

    Ok(EntityRecord {
        id: EntityId::from_str(&id_str).map_err(|e| invalid_column("id", e))?,
        owner_id: OwnerId::new(owner_str).map_err(|e| invalid_column("owner_id", e))?,
        kind: EntityKind::from_str(&kind_str).map_err(|e| invalid_column("kind", e))?,
        parent_id,
        payload: serde_json::from_str(&payload_str)
            .map_err(|e| invalid_column("payload", e))?,
        search_text,
        created_at: parse_datetime(&created_at_str)?,
        updated_at: parse_datetime(&updated_at_str)?,
        sync_status: SyncStatus::from_str(&status_str)
            .map_err(|e| invalid_column("sync_status", e))?,
        version,
    })
}

/// Reconstruct a SyncQueueEntry from a database row
fn entry_from_row(row: &SqliteRow) -> Result<SyncQueueEntry, StoreError> {
    let id_str: String = row.get("id");
    let owner_str: String = row.get("owner_id");
    let kind_str: String = row.get("kind");
    let entity_id_str: String = row.get("entity_id");
    let operation_str: String = row.get("operation");
    let payload_str: String = row.get("payload");
    let retry_count: i64 = row.get("retry_count");
    let created_at_str: String = row.get("created_at");
    let last_attempt_str: Option<String> = row.get("last_attempt_at");

    Ok(SyncQueueEntry::from_parts(
        EntryId::from_str(&id_str).map_err(|e| invalid_column("id", e))?,
        OwnerId::new(owner_str).map_err(|e| invalid_column("owner_id", e))?,
        EntityKind::from_str(&kind_str).map_err(|e| invalid_column("kind", e))?,
        EntityId::from_str(&entity_id_str).map_err(|e| invalid_column("entity_id", e))?,
        SyncOperation::from_str(&operation_str).map_err(|e| invalid_column("operation", e))?,
        serde_json::from_str(&payload_str).map_err(|e| invalid_column("payload", e))?,
        retry_count as u32,
        parse_datetime(&created_at_str)?,
        parse_optional_datetime(last_attempt_str)?,
    ))
}

// ============================================================================
// SQL fragments
// ============================================================================

const ENTITY_COLUMNS: &str =
    "id, owner_id, kind, parent_id, payload, search_text, created_at, updated_at, sync_status, version";

const ENTRY_COLUMNS: &str =
    "id, owner_id, kind, entity_id, operation, payload, retry_count, created_at, last_attempt_at";

const UPSERT_ENTITY: &str = "INSERT OR REPLACE INTO entities \
     (id, owner_id, kind, parent_id, payload, search_text, created_at, updated_at, sync_status, version) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const INSERT_ENTRY: &str = "INSERT INTO sync_queue \
     (id, owner_id, kind, entity_id, operation, payload, retry_count, created_at, last_attempt_at) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)";

/// Bind an entity record's fields to an upsert statement, in column order
fn bind_record<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    record: &'q EntityRecord,
    payload_json: String,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(record.id.to_string())
        .bind(record.owner_id.as_str())
        .bind(record.kind.as_str())
        .bind(record.parent_id.map(|p| p.to_string()))
        .bind(payload_json)
        .bind(record.search_text.clone())
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .bind(record.sync_status.as_str())
        .bind(record.version)
}

/// Bind a queue entry's fields to an insert statement, in column order
fn bind_entry<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    entry: &'q SyncQueueEntry,
    payload_json: String,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(entry.id().to_string())
        .bind(entry.owner_id().as_str())
        .bind(entry.kind().as_str())
        .bind(entry.entity_id().to_string())
        .bind(entry.operation().as_str())
        .bind(payload_json)
        .bind(entry.retry_count() as i64)
        .bind(entry.created_at().to_rfc3339())
        .bind(entry.last_attempt_at().map(|dt| dt.to_rfc3339()))
}

// ============================================================================
// LocalStore implementation
// ============================================================================

#[async_trait::async_trait]
impl LocalStore for SqliteEntityStore {
    async fn get_all(
        &self,
        kind: EntityKind,
        owner: &OwnerId,
        parent: Option<&EntityId>,
    ) -> Result<Vec<EntityRecord>, StoreError> {
        let rows = match parent {
            Some(parent_id) => {
                let sql = format!(
                    "SELECT {ENTITY_COLUMNS} FROM entities \
                     WHERE kind = ? AND owner_id = ? AND parent_id = ? \
                     ORDER BY updated_at DESC"
                );
                sqlx::query(&sql)
                    .bind(kind.as_str())
                    .bind(owner.as_str())
                    .bind(parent_id.to_string())
                    .fetch_all(&self.pool)
                    .await
                    .map_err(storage_err)?
            }
            None => {
                let sql = format!(
                    "SELECT {ENTITY_COLUMNS} FROM entities \
                     WHERE kind = ? AND owner_id = ? \
                     ORDER BY updated_at DESC"
                );
                sqlx::query(&sql)
                    .bind(kind.as_str())
                    .bind(owner.as_str())
                    .fetch_all(&self.pool)
                    .await
                    .map_err(storage_err)?
            }
        };

        rows.iter().map(record_from_row).collect()
    }

    async fn get(&self, id: &EntityId) -> Result<Option<EntityRecord>, StoreError> {
        let sql = format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn put(&self, record: &EntityRecord) -> Result<(), StoreError> {
        let payload_json = serde_json::to_string(&record.payload)?;
        bind_record(sqlx::query(UPSERT_ENTITY), record, payload_json)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn update(&self, id: &EntityId, patch: &RecordPatch) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let sql = format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage_err)?;

        let Some(row) = row else {
            return Err(StoreError::NotFound(id.to_string()));
        };
        let mut record = record_from_row(&row)?;

        if let Some(ref payload) = patch.payload {
            record.payload = payload.clone();
        }
        if let Some(ref search_text) = patch.search_text {
            record.search_text = search_text.clone();
        }
        if let Some(updated_at) = patch.updated_at {
            record.updated_at = updated_at;
        }
        if let Some(status) = patch.sync_status {
            record.sync_status = status;
        }
        if let Some(version) = patch.version {
            record.version = version;
        }

        let payload_json = serde_json::to_string(&record.payload)?;
        bind_record(sqlx::query(UPSERT_ENTITY), &record, payload_json)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    async fn delete(&self, id: &EntityId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM entities WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn search(
        &self,
        kind: EntityKind,
        owner: &OwnerId,
        query: &str,
    ) -> Result<Vec<EntityRecord>, StoreError> {
        let pattern = format!("%{}%", escape_like(&query.to_lowercase()));
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM entities \
             WHERE kind = ? AND owner_id = ? AND search_text LIKE ? ESCAPE '\\' \
             ORDER BY updated_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(kind.as_str())
            .bind(owner.as_str())
            .bind(pattern)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn set_sync_status(&self, id: &EntityId, status: SyncStatus) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE entities SET sync_status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn put_with_entry(
        &self,
        record: &EntityRecord,
        entry: &SyncQueueEntry,
    ) -> Result<(), StoreError> {
        let record_json = serde_json::to_string(&record.payload)?;
        let entry_json = serde_json::to_string(entry.payload())?;

        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        bind_record(sqlx::query(UPSERT_ENTITY), record, record_json)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        bind_entry(sqlx::query(INSERT_ENTRY), entry, entry_json)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    async fn delete_with_entry(
        &self,
        id: &EntityId,
        entry: &SyncQueueEntry,
    ) -> Result<(), StoreError> {
        let entry_json = serde_json::to_string(entry.payload())?;

        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        sqlx::query("DELETE FROM entities WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        bind_entry(sqlx::query(INSERT_ENTRY), entry, entry_json)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    async fn enqueue(&self, entry: &SyncQueueEntry) -> Result<(), StoreError> {
        let entry_json = serde_json::to_string(entry.payload())?;
        bind_entry(sqlx::query(INSERT_ENTRY), entry, entry_json)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn pending_entries(&self, owner: &OwnerId) -> Result<Vec<SyncQueueEntry>, StoreError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM sync_queue \
             WHERE owner_id = ? \
             ORDER BY created_at ASC, rowid ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(owner.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn entries_for_entity(
        &self,
        entity_id: &EntityId,
    ) -> Result<Vec<SyncQueueEntry>, StoreError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM sync_queue \
             WHERE entity_id = ? \
             ORDER BY created_at ASC, rowid ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(entity_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn remove_entry(&self, id: &EntryId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sync_queue WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn increment_retry(
        &self,
        id: &EntryId,
        attempted_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE sync_queue SET retry_count = retry_count + 1, last_attempt_at = ? WHERE id = ?",
        )
        .bind(attempted_at.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn remove_entries_for_entity(&self, entity_id: &EntityId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sync_queue WHERE entity_id = ?")
            .bind(entity_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn checkpoint(
        &self,
        owner: &OwnerId,
        kind: EntityKind,
    ) -> Result<Option<SyncCheckpoint>, StoreError> {
        let row = sqlx::query(
            "SELECT owner_id, kind, cursor, last_pulled_at FROM sync_checkpoints \
             WHERE owner_id = ? AND kind = ?",
        )
        .bind(owner.as_str())
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let owner_str: String = row.get("owner_id");
        let kind_str: String = row.get("kind");
        let cursor_str: Option<String> = row.get("cursor");
        let last_pulled_str: String = row.get("last_pulled_at");

        let cursor = match cursor_str {
            Some(ref s) if !s.is_empty() => {
                Some(SyncCursor::new(s.clone()).map_err(|e| invalid_column("cursor", e))?)
            }
            _ => None,
        };

        Ok(Some(SyncCheckpoint {
            owner_id: OwnerId::new(owner_str).map_err(|e| invalid_column("owner_id", e))?,
            kind: EntityKind::from_str(&kind_str).map_err(|e| invalid_column("kind", e))?,
            cursor,
            last_pulled_at: parse_datetime(&last_pulled_str)?,
        }))
    }

    async fn save_checkpoint(&self, checkpoint: &SyncCheckpoint) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO sync_checkpoints (owner_id, kind, cursor, last_pulled_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(checkpoint.owner_id.as_str())
        .bind(checkpoint.kind.as_str())
        .bind(checkpoint.cursor.as_ref().map(|c| c.as_str().to_string()))
        .bind(checkpoint.last_pulled_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("50%"), "50\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn test_parse_datetime_rfc3339() {
        let dt = parse_datetime("2026-03-01T12:00:00+00:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-03-01T12:00:00+00:00");
        assert!(parse_datetime("not a date").is_err());
    }

    #[test]
    fn test_parse_optional_datetime() {
        assert_eq!(parse_optional_datetime(None).unwrap(), None);
        assert_eq!(
            parse_optional_datetime(Some(String::new())).unwrap(),
            None
        );
        assert!(parse_optional_datetime(Some("2026-03-01T12:00:00Z".to_string()))
            .unwrap()
            .is_some());
    }
}
