//! Notes feature binding
//!
//! Observable collection of the owner's notes plus the imperative mutation
//! surface the notes UI calls. Mutations go through the note helper (local
//! persist + queue entry), merge into the watch channel, and signal the
//! scheduler; the network is never on the interactive path.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use studypad_core::domain::{EntityId, Note, NoteUpdate, OwnerId};
use studypad_core::ports::LocalStore;
use studypad_core::usecases::{retry_entity, HelperError, NoteHelper};
use studypad_sync::{MutationSignal, SyncEngine, SyncError, SyncOutcome, SyncPhase};

/// Reactive binding for the notes feature
pub struct NotesHandle {
    owner: OwnerId,
    helper: NoteHelper,
    store: Arc<dyn LocalStore>,
    engine: Arc<SyncEngine>,
    signal: MutationSignal,
    notes: Arc<watch::Sender<Vec<Note>>>,
}

impl NotesHandle {
    /// Loads the owner's notes from the local store and starts the
    /// refresh task that follows the sync engine's passes
    pub async fn new(
        owner: OwnerId,
        store: Arc<dyn LocalStore>,
        engine: Arc<SyncEngine>,
        signal: MutationSignal,
    ) -> Result<Self, HelperError> {
        let helper = NoteHelper::new(store.clone());
        let initial = helper.list(&owner).await?;
        let (notes, _) = watch::channel(initial);

        let handle = Self {
            owner,
            helper,
            store,
            engine,
            signal,
            notes: Arc::new(notes),
        };
        handle.spawn_refresh_task();
        Ok(handle)
    }

    /// Reloads the collection whenever a sync pass returns to idle, so
    /// reconciled remote changes reach the UI. The task ends when the
    /// engine is dropped.
    fn spawn_refresh_task(&self) {
        let store = self.store.clone();
        let owner = self.owner.clone();
        let notes = self.notes.clone();
        let mut phase_rx = self.engine.phase();

        tokio::spawn(async move {
            let helper = NoteHelper::new(store);
            loop {
                if phase_rx.changed().await.is_err() {
                    break;
                }
                if *phase_rx.borrow_and_update() != SyncPhase::Idle {
                    continue;
                }
                match helper.list(&owner).await {
                    Ok(list) => {
                        debug!(notes = list.len(), "refreshed notes after sync pass");
                        notes.send_replace(list);
                    }
                    Err(err) => warn!(error = %err, "failed to refresh notes after sync"),
                }
            }
        });
    }

    // --- Observable state ---

    /// The observable notes collection, newest first
    pub fn subscribe(&self) -> watch::Receiver<Vec<Note>> {
        self.notes.subscribe()
    }

    /// True while a sync pass is in flight
    pub fn is_syncing(&self) -> bool {
        self.engine.is_syncing()
    }

    /// Observable sync pass phase
    pub fn sync_phase(&self) -> watch::Receiver<SyncPhase> {
        self.engine.phase()
    }

    // --- Mutations ---

    /// Creates a note; visible in the collection before any network call
    pub async fn create(
        &self,
        title: impl Into<String>,
        content: impl Into<String>,
        tags: Vec<String>,
    ) -> Result<Note, HelperError> {
        let note = self.helper.create(&self.owner, title, content, tags).await?;
        self.notes
            .send_modify(|list| list.insert(0, note.clone()));
        self.signal.notify();
        Ok(note)
    }

    /// Applies a partial update to a note
    pub async fn update(&self, id: &EntityId, update: NoteUpdate) -> Result<Note, HelperError> {
        let note = self.helper.update(id, update).await?;
        self.merge(note.clone());
        self.signal.notify();
        Ok(note)
    }

    /// Flips a note's favorite flag
    pub async fn toggle_favorite(&self, id: &EntityId) -> Result<Note, HelperError> {
        let note = self.helper.toggle_favorite(id).await?;
        self.merge(note.clone());
        self.signal.notify();
        Ok(note)
    }

    /// Deletes a note
    pub async fn delete(&self, id: &EntityId) -> Result<(), HelperError> {
        self.helper.delete(id).await?;
        self.notes.send_modify(|list| list.retain(|n| n.id() != id));
        self.signal.notify();
        Ok(())
    }

    /// Case-insensitive substring search over title, content, and tags
    pub async fn search(&self, query: &str) -> Result<Vec<Note>, HelperError> {
        self.helper.search(&self.owner, query).await
    }

    /// Re-arms delivery for a note stuck in `sync_status = error`
    pub async fn retry(&self, id: &EntityId) -> Result<(), HelperError> {
        retry_entity(&self.store, id).await?;
        if let Some(note) = self.helper.get(id).await? {
            self.merge(note);
        }
        self.signal.notify();
        Ok(())
    }

    /// Runs a sync pass immediately and refreshes the collection
    pub async fn force_sync_now(&self) -> Result<SyncOutcome, SyncError> {
        let outcome = self.engine.sync().await?;
        if let Err(err) = self.refresh().await {
            warn!(error = %err, "failed to refresh notes after forced sync");
        }
        Ok(outcome)
    }

    /// Reloads the collection from the local store
    pub async fn refresh(&self) -> Result<(), HelperError> {
        let list = self.helper.list(&self.owner).await?;
        self.notes.send_replace(list);
        Ok(())
    }

    /// Replaces a note in the observable collection, keeping its position
    fn merge(&self, note: Note) {
        self.notes.send_modify(|list| {
            let id = *note.id();
            match list.iter_mut().find(|n| *n.id() == id) {
                Some(slot) => *slot = note,
                None => list.insert(0, note),
            }
        });
    }
}
