//! Queue-drain and reconciliation engine
//!
//! The [`SyncEngine`] runs the per-owner state machine
//!
//! ```text
//!     Idle ──► Draining ──► Pulling ──► Reconciling ──► Idle
//! ```
//!
//! one pass at a time. A `sync()` call arriving while a pass is in flight
//! does not start a second overlapping pass: it flags a follow-up, and the
//! running pass triggers exactly one successor on completion to pick up
//! whatever was queued in the interim.
//!
//! ## Retry Logic
//!
//! Transient remote failures (network, timeouts, 5xx) leave the queue entry
//! in place with its retry count incremented; the entry becomes eligible
//! again after `base_delay * 2^retry_count` (capped). After `max_retries`
//! transient failures, or on any permanent failure (4xx), the entity is
//! marked `error`, its queue entries are dropped, and delivery stops until
//! an explicit retry re-enqueues it.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use studypad_core::config::SyncSettings;
use studypad_core::domain::entity::search_text_from_payload;
use studypad_core::domain::{
    EntityId, EntityKind, EntityRecord, OwnerId, StoreError, SyncOperation, SyncQueueEntry,
    SyncStatus,
};
use studypad_core::ports::{LocalStore, RemoteApi, RemoteEntity, SyncCheckpoint};

// ============================================================================
// SyncPhase
// ============================================================================

/// Where a sync pass currently is, observable through a watch channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No sync in flight
    Idle,
    /// Pushing queued local mutations to the remote API
    Draining,
    /// Fetching remote changes newer than the stored checkpoint
    Pulling,
    /// Merging pulled remote state into the local store
    Reconciling,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPhase::Idle => write!(f, "idle"),
            SyncPhase::Draining => write!(f, "draining"),
            SyncPhase::Pulling => write!(f, "pulling"),
            SyncPhase::Reconciling => write!(f, "reconciling"),
        }
    }
}

// ============================================================================
// SyncOutcome
// ============================================================================

/// Summary of a completed synchronization pass
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    /// Queue entries delivered to the remote API
    pub pushed: u32,
    /// Remote changes applied to the local store
    pub pulled: u32,
    /// Divergences resolved by the last-write-wins policy
    pub conflicts_resolved: u32,
    /// Queue entries that failed this pass (left for retry or errored out)
    pub failed: u32,
    /// Non-fatal errors encountered during the pass
    pub errors: Vec<String>,
    /// Wall-clock duration of the pass in milliseconds
    pub duration_ms: u64,
    /// True when the call coalesced into an already-running pass instead of
    /// executing one itself
    pub coalesced: bool,
}

impl SyncOutcome {
    fn coalesced() -> Self {
        Self {
            coalesced: true,
            ..Self::default()
        }
    }
}

/// Failure that aborts a sync pass
///
/// Only local storage failures abort; remote failures are retry
/// bookkeeping and never escape the engine.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Background reconciliation engine for one owner scope
///
/// ## Dependencies
///
/// - `store`: durable local state (entities, queue, checkpoints)
/// - `remote`: the backend the queue is drained against
///
/// The engine owns no data of its own; every pass is a stateless
/// reconciliation over the store and the remote API.
pub struct SyncEngine {
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteApi>,
    owner: OwnerId,
    /// Transient failures per entry before the entity is marked errored
    max_retries: u32,
    /// Base delay for per-entry exponential backoff
    backoff_base: chrono::Duration,
    /// Cap on the per-entry backoff delay
    backoff_cap: chrono::Duration,
    /// Guard: at most one pass in flight per engine
    in_flight: AtomicBool,
    /// A sync was requested while a pass was running
    follow_up: AtomicBool,
    /// Observable pass phase
    phase: watch::Sender<SyncPhase>,
}

impl SyncEngine {
    /// Creates an engine for one owner scope
    pub fn new(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteApi>,
        owner: OwnerId,
        settings: &SyncSettings,
    ) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Self {
            store,
            remote,
            owner,
            max_retries: settings.max_retries,
            backoff_base: settings.backoff_base(),
            backoff_cap: settings.backoff_cap(),
            in_flight: AtomicBool::new(false),
            follow_up: AtomicBool::new(false),
            phase,
        }
    }

    /// The owner scope this engine reconciles
    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Returns true while a pass is in flight
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// A receiver observing the current pass phase
    pub fn phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    /// Runs a full sync pass, or coalesces into the one already running
    ///
    /// Returns the summary of the last pass executed by this call, or an
    /// outcome with `coalesced` set when another call already holds the
    /// guard (that call's pass will run a follow-up to cover this request).
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Store` if the local store fails; remote failures
    /// are absorbed into retry bookkeeping and the outcome's error list.
    #[tracing::instrument(skip(self), fields(owner = %self.owner))]
    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("sync already in flight, scheduling follow-up pass");
            self.follow_up.store(true, Ordering::Release);
            return Ok(SyncOutcome::coalesced());
        }

        let result = self.run_until_settled().await;

        self.phase.send_replace(SyncPhase::Idle);
        self.in_flight.store(false, Ordering::Release);
        result
    }

    /// Runs one pass, plus one follow-up per sync request that arrived
    /// while a pass was executing
    async fn run_until_settled(&self) -> Result<SyncOutcome, SyncError> {
        let mut outcome = self.run_pass().await?;
        while self.follow_up.swap(false, Ordering::AcqRel) {
            debug!("running follow-up sync pass");
            outcome = self.run_pass().await?;
        }
        Ok(outcome)
    }

    /// One Draining → Pulling → Reconciling cycle
    async fn run_pass(&self) -> Result<SyncOutcome, SyncError> {
        let start = std::time::Instant::now();
        let mut outcome = SyncOutcome::default();

        self.phase.send_replace(SyncPhase::Draining);
        self.drain(&mut outcome).await?;

        // Parents before children: chats are pulled before messages
        for kind in EntityKind::ALL {
            if !self.pull_kind(kind, &mut outcome).await? {
                break;
            }
        }

        outcome.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            pushed = outcome.pushed,
            pulled = outcome.pulled,
            conflicts = outcome.conflicts_resolved,
            failed = outcome.failed,
            duration_ms = outcome.duration_ms,
            "Sync pass completed"
        );

        Ok(outcome)
    }

    // ========================================================================
    // Draining
    // ========================================================================

    /// Pushes queued mutations to the remote API in FIFO order
    ///
    /// Entries for the same entity are strictly ordered: once one is
    /// deferred (backoff) or fails, the rest of that entity's entries are
    /// skipped for this pass so a create is never outrun by a later update.
    /// Entries for different entities are independent.
    async fn drain(&self, outcome: &mut SyncOutcome) -> Result<(), SyncError> {
        let entries = self.store.pending_entries(&self.owner).await?;
        if entries.is_empty() {
            return Ok(());
        }

        debug!(entries = entries.len(), "draining sync queue");
        let now = Utc::now();
        let mut blocked: HashSet<EntityId> = HashSet::new();

        for entry in entries {
            if blocked.contains(entry.entity_id()) {
                continue;
            }

            if !entry.is_due(now, self.backoff_base, self.backoff_cap) {
                debug!(
                    entry = %entry.id(),
                    retries = entry.retry_count(),
                    "entry still backing off, deferring"
                );
                blocked.insert(*entry.entity_id());
                continue;
            }

            match self.push_entry(&entry).await {
                Ok(()) => {
                    self.store.remove_entry(entry.id()).await?;
                    self.settle_entity(&entry).await?;
                    outcome.pushed += 1;
                }
                Err(err) if err.is_transient() => {
                    outcome.failed += 1;
                    outcome.errors.push(err.to_string());
                    blocked.insert(*entry.entity_id());
                    self.store.increment_retry(entry.id(), Utc::now()).await?;

                    if entry.retry_count() + 1 >= self.max_retries {
                        warn!(
                            entity = %entry.entity_id(),
                            retries = entry.retry_count() + 1,
                            "retries exhausted, marking entity errored"
                        );
                        self.mark_errored(entry.entity_id()).await?;
                    } else {
                        warn!(
                            entity = %entry.entity_id(),
                            retries = entry.retry_count() + 1,
                            error = %err,
                            "transient failure, will retry"
                        );
                    }
                }
                Err(err) => {
                    outcome.failed += 1;
                    outcome.errors.push(err.to_string());
                    blocked.insert(*entry.entity_id());
                    warn!(
                        entity = %entry.entity_id(),
                        error = %err,
                        "permanent failure, marking entity errored"
                    );
                    self.mark_errored(entry.entity_id()).await?;
                }
            }
        }

        Ok(())
    }

    /// Replays one queue entry against the remote API
    async fn push_entry(
        &self,
        entry: &SyncQueueEntry,
    ) -> Result<(), studypad_core::ports::RemoteError> {
        match entry.operation() {
            SyncOperation::Create => {
                self.remote
                    .create_entity(entry.kind(), entry.payload())
                    .await?;
            }
            SyncOperation::Update => {
                self.remote
                    .update_entity(entry.kind(), entry.entity_id(), entry.payload())
                    .await?;
            }
            SyncOperation::Delete => {
                self.remote
                    .delete_entity(entry.kind(), entry.entity_id())
                    .await?;
            }
        }
        Ok(())
    }

    /// Flips an entity to synced once its last queue entry has drained
    ///
    /// A drained delete has no local record to flip; an entity deleted
    /// between drain and settle is likewise left alone.
    async fn settle_entity(&self, entry: &SyncQueueEntry) -> Result<(), SyncError> {
        if entry.operation() == SyncOperation::Delete {
            return Ok(());
        }

        let remaining = self.store.entries_for_entity(entry.entity_id()).await?;
        if !remaining.is_empty() {
            return Ok(());
        }

        match self
            .store
            .set_sync_status(entry.entity_id(), SyncStatus::Synced)
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) => {
                debug!(entity = %entry.entity_id(), "entity gone before status settle");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Marks an entity permanently failed and stops auto-retrying it
    ///
    /// Dropping the entity's queue entries keeps the invariant that every
    /// pending entity has an outstanding entry: the entity is no longer
    /// pending. An explicit retry re-marks it pending and re-enqueues.
    async fn mark_errored(&self, entity_id: &EntityId) -> Result<(), SyncError> {
        match self
            .store
            .set_sync_status(entity_id, SyncStatus::Error)
            .await
        {
            Ok(()) | Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        self.store.remove_entries_for_entity(entity_id).await?;
        Ok(())
    }

    // ========================================================================
    // Pulling & reconciling
    // ========================================================================

    /// Pulls and reconciles one entity kind from the stored checkpoint
    ///
    /// Pages until the remote stops returning entities; the last cursor
    /// seen is checkpointed only after the pull completes, so an aborted
    /// pull is re-attempted from the old checkpoint (reconciliation is
    /// idempotent). Returns false when a remote failure ended the pass.
    async fn pull_kind(
        &self,
        kind: EntityKind,
        outcome: &mut SyncOutcome,
    ) -> Result<bool, SyncError> {
        self.phase.send_replace(SyncPhase::Pulling);

        let checkpoint = self.store.checkpoint(&self.owner, kind).await?;
        let mut cursor = checkpoint.and_then(|c| c.cursor);

        loop {
            let page = match self
                .remote
                .list_entities(kind, &self.owner, cursor.as_ref())
                .await
            {
                Ok(page) => page,
                Err(err) => {
                    warn!(kind = %kind, error = %err, "pull failed, keeping checkpoint");
                    outcome.errors.push(err.to_string());
                    return Ok(false);
                }
            };

            let page_empty = page.entities.is_empty();

            if !page_empty {
                self.phase.send_replace(SyncPhase::Reconciling);
                debug!(kind = %kind, entities = page.entities.len(), "reconciling pulled page");
                for remote_entity in &page.entities {
                    self.reconcile_entity(remote_entity, outcome).await?;
                }
            }

            match page.next_cursor {
                Some(next) => {
                    cursor = Some(next);
                    if page_empty {
                        break;
                    }
                    self.phase.send_replace(SyncPhase::Pulling);
                }
                None => break,
            }
        }

        self.store
            .save_checkpoint(&SyncCheckpoint {
                owner_id: self.owner.clone(),
                kind,
                cursor,
                last_pulled_at: Utc::now(),
            })
            .await?;

        Ok(true)
    }

    /// Merges one pulled remote entity into the local store
    ///
    /// Last-write-wins, decided explicitly before anything is overwritten:
    /// a still-pending local record only loses to a strictly newer remote
    /// (`updated_at`, then `version` on equal timestamps). When remote
    /// wins, the superseded queue entries are discarded so the stale local
    /// edit is never pushed afterwards.
    async fn reconcile_entity(
        &self,
        remote: &RemoteEntity,
        outcome: &mut SyncOutcome,
    ) -> Result<(), SyncError> {
        let local = self.store.get(&remote.id).await?;

        if remote.deleted {
            let Some(local) = local else {
                return Ok(());
            };
            if local.sync_status.is_pending() && !remote_newer(&local, remote) {
                debug!(id = %remote.id, "pending local edit outlives remote tombstone");
                outcome.conflicts_resolved += 1;
                return Ok(());
            }
            self.store.delete(&remote.id).await?;
            self.store.remove_entries_for_entity(&remote.id).await?;
            outcome.pulled += 1;
            return Ok(());
        }

        match local {
            None => {
                self.store.put(&record_from_remote(remote)).await?;
                outcome.pulled += 1;
            }
            Some(local) => {
                if local.sync_status.is_pending() {
                    if remote_newer(&local, remote) {
                        debug!(
                            id = %remote.id,
                            local_updated = %local.updated_at,
                            remote_updated = %remote.updated_at,
                            "conflict: remote is newer, superseding pending local edit"
                        );
                        self.store.put(&record_from_remote(remote)).await?;
                        self.store.remove_entries_for_entity(&remote.id).await?;
                        outcome.pulled += 1;
                        outcome.conflicts_resolved += 1;
                    } else if local.updated_at != remote.updated_at
                        || local.version != remote.version
                    {
                        debug!(
                            id = %remote.id,
                            "conflict: pending local edit is newer, keeping for next drain"
                        );
                        outcome.conflicts_resolved += 1;
                    }
                } else if remote_newer(&local, remote) {
                    self.store.put(&record_from_remote(remote)).await?;
                    outcome.pulled += 1;
                }
            }
        }

        Ok(())
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// True when the remote copy should win last-write-wins
fn remote_newer(local: &EntityRecord, remote: &RemoteEntity) -> bool {
    remote.updated_at > local.updated_at
        || (remote.updated_at == local.updated_at && remote.version > local.version)
}

/// Builds the local record for an authoritative remote entity
fn record_from_remote(remote: &RemoteEntity) -> EntityRecord {
    EntityRecord {
        id: remote.id,
        owner_id: remote.owner_id.clone(),
        kind: remote.kind,
        parent_id: parent_from_payload(remote.kind, &remote.payload),
        search_text: search_text_from_payload(remote.kind, &remote.payload),
        payload: remote.payload.clone(),
        created_at: remote.created_at,
        updated_at: remote.updated_at,
        sync_status: SyncStatus::Synced,
        version: remote.version,
    }
}

/// Extracts the parent reference from a remote payload, if the kind has one
fn parent_from_payload(kind: EntityKind, payload: &serde_json::Value) -> Option<EntityId> {
    if kind != EntityKind::Message {
        return None;
    }
    payload
        .get("chat_id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
}
