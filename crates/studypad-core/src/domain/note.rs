//! Note entity
//!
//! A study note with title, content, and a de-duplicated tag set. Every
//! mutation bumps the version, refreshes `updated_at`, and resets the sync
//! status to pending so the sync service knows to deliver it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{EntityKind, EntityRecord, StoredEntity, SyncStatus};
use super::errors::{DomainError, StoreError};
use super::newtypes::{EntityId, OwnerId};

/// The payload fields persisted in a note record's JSON column
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NotePayload {
    title: String,
    content: String,
    tags: Vec<String>,
    favorite: bool,
}

/// Explicit partial update for a note
///
/// Only named fields change; an invalid field name is a compile error, not
/// a silently accepted dynamic merge.
#[derive(Debug, Clone, Default)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub favorite: Option<bool>,
}

/// A study note
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    id: EntityId,
    owner_id: OwnerId,
    title: String,
    content: String,
    tags: Vec<String>,
    favorite: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    sync_status: SyncStatus,
    version: i64,
}

impl Note {
    /// Creates a new note with a client-generated id and pending sync status
    ///
    /// Tags are normalized: trimmed, empties dropped, duplicates removed
    /// (first occurrence wins).
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the title is empty.
    pub fn new(
        owner_id: OwnerId,
        title: impl Into<String>,
        content: impl Into<String>,
        tags: Vec<String>,
    ) -> Result<Self, DomainError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(DomainError::Validation(
                "note title must not be empty".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id: EntityId::new(),
            owner_id,
            title,
            content: content.into(),
            tags: normalize_tags(tags),
            favorite: false,
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

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn is_favorite(&self) -> bool {
        self.favorite
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
    /// Returns `DomainError::Validation` if the update would empty the title.
    pub fn apply(&mut self, update: NoteUpdate) -> Result<(), DomainError> {
        if let Some(title) = update.title {
            if title.trim().is_empty() {
                return Err(DomainError::Validation(
                    "note title must not be empty".to_string(),
                ));
            }
            self.title = title;
        }
        if let Some(content) = update.content {
            self.content = content;
        }
        if let Some(tags) = update.tags {
            self.tags = normalize_tags(tags);
        }
        if let Some(favorite) = update.favorite {
            self.favorite = favorite;
        }
        self.touch();
        Ok(())
    }

    /// Flips the favorite flag, bumping version and resetting to pending
    pub fn toggle_favorite(&mut self) {
        self.favorite = !self.favorite;
        self.touch();
    }

    /// Marks the latest local state as accepted by the remote system
    pub fn mark_synced(&mut self) {
        self.sync_status = SyncStatus::Synced;
    }

    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
        self.sync_status = SyncStatus::Pending;
    }
}

/// Trims, drops empties, and de-duplicates while preserving first-seen order
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .collect()
}

impl StoredEntity for Note {
    const KIND: EntityKind = EntityKind::Note;

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
        let mut parts = vec![self.title.to_lowercase(), self.content.to_lowercase()];
        parts.extend(self.tags.iter().map(|t| t.to_lowercase()));
        parts.retain(|p| !p.is_empty());
        parts.join(" ")
    }

    fn to_record(&self) -> Result<EntityRecord, StoreError> {
        let payload = serde_json::to_value(NotePayload {
            title: self.title.clone(),
            content: self.content.clone(),
            tags: self.tags.clone(),
            favorite: self.favorite,
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
        let payload: NotePayload = serde_json::from_value(record.payload.clone())?;
        Ok(Self {
            id: record.id,
            owner_id: record.owner_id.clone(),
            title: payload.title,
            content: payload.content,
            tags: payload.tags,
            favorite: payload.favorite,
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
    fn test_new_note_is_pending_version_one() {
        let note = Note::new(owner(), "Physics", "Newton", vec![]).unwrap();
        assert_eq!(note.sync_status(), SyncStatus::Pending);
        assert_eq!(note.version(), 1);
        assert!(!note.is_favorite());
    }

    #[test]
    fn test_new_note_rejects_empty_title() {
        assert!(Note::new(owner(), "  ", "content", vec![]).is_err());
    }

    #[test]
    fn test_tags_are_deduplicated() {
        let note = Note::new(
            owner(),
            "T",
            "c",
            vec![
                "physics".to_string(),
                " physics ".to_string(),
                "Physics".to_string(),
                "math".to_string(),
                String::new(),
            ],
        )
        .unwrap();
        assert_eq!(note.tags(), &["physics".to_string(), "math".to_string()]);
    }

    #[test]
    fn test_apply_bumps_version_and_resets_status() {
        let mut note = Note::new(owner(), "T", "c", vec![]).unwrap();
        note.mark_synced();
        assert_eq!(note.sync_status(), SyncStatus::Synced);

        let before = note.updated_at();
        note.apply(NoteUpdate {
            content: Some("new content".to_string()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(note.version(), 2);
        assert_eq!(note.sync_status(), SyncStatus::Pending);
        assert_eq!(note.content(), "new content");
        assert!(note.updated_at() >= before);
    }

    #[test]
    fn test_apply_rejects_empty_title() {
        let mut note = Note::new(owner(), "T", "c", vec![]).unwrap();
        let result = note.apply(NoteUpdate {
            title: Some(String::new()),
            ..Default::default()
        });
        assert!(result.is_err());
        // Nothing else changed
        assert_eq!(note.version(), 1);
    }

    #[test]
    fn test_toggle_favorite() {
        let mut note = Note::new(owner(), "T", "c", vec![]).unwrap();
        note.toggle_favorite();
        assert!(note.is_favorite());
        assert_eq!(note.version(), 2);
        note.toggle_favorite();
        assert!(!note.is_favorite());
        assert_eq!(note.version(), 3);
    }

    #[test]
    fn test_record_roundtrip() {
        let note = Note::new(
            owner(),
            "Physics Notes",
            "Newton's laws",
            vec!["physics".to_string()],
        )
        .unwrap();
        let record = note.to_record().unwrap();
        assert_eq!(record.kind, EntityKind::Note);
        assert!(record.parent_id.is_none());
        assert!(record.search_text.contains("physics notes"));

        let restored = Note::from_record(&record).unwrap();
        assert_eq!(restored, note);
    }
}
