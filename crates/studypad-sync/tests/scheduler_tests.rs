//! Integration tests for SyncScheduler
//!
//! Uses a real engine over an in-memory store with a call-counting remote
//! stub, so "did a pass run" is observable through the remote's list calls.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use studypad_core::config::SyncSettings;
use studypad_core::domain::{EntityId, EntityKind, OwnerId, SyncCursor};
use studypad_core::ports::{RemoteApi, RemoteEntity, RemoteError, RemotePage};
use studypad_store::{DatabasePool, SqliteEntityStore};
use studypad_sync::{StaticNetworkMonitor, SyncEngine, SyncScheduler};

/// Remote that counts sync passes (one Note list call per pass)
#[derive(Default)]
struct CountingRemote {
    note_lists: AtomicU32,
}

impl CountingRemote {
    fn passes(&self) -> u32 {
        self.note_lists.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RemoteApi for CountingRemote {
    async fn list_entities(
        &self,
        kind: EntityKind,
        _owner: &OwnerId,
        _since: Option<&SyncCursor>,
    ) -> Result<RemotePage, RemoteError> {
        if kind == EntityKind::Note {
            self.note_lists.fetch_add(1, Ordering::SeqCst);
        }
        Ok(RemotePage {
            entities: Vec::new(),
            next_cursor: None,
        })
    }

    async fn create_entity(
        &self,
        _kind: EntityKind,
        _payload: &serde_json::Value,
    ) -> Result<RemoteEntity, RemoteError> {
        unreachable!("scheduler tests never enqueue mutations")
    }

    async fn update_entity(
        &self,
        _kind: EntityKind,
        _id: &EntityId,
        _payload: &serde_json::Value,
    ) -> Result<RemoteEntity, RemoteError> {
        unreachable!("scheduler tests never enqueue mutations")
    }

    async fn delete_entity(&self, _kind: EntityKind, _id: &EntityId) -> Result<(), RemoteError> {
        unreachable!("scheduler tests never enqueue mutations")
    }
}

fn settings(debounce_ms: u64, poll_interval_secs: u64) -> SyncSettings {
    SyncSettings {
        debounce_ms,
        poll_interval_secs,
        ..SyncSettings::default()
    }
}

async fn setup(
    settings: &SyncSettings,
    online: bool,
) -> (Arc<CountingRemote>, Arc<SyncEngine>, Arc<StaticNetworkMonitor>) {
    let pool = DatabasePool::in_memory().await.unwrap();
    let store = Arc::new(SqliteEntityStore::new(pool.pool().clone()));
    let remote = Arc::new(CountingRemote::default());
    let engine = Arc::new(SyncEngine::new(
        store,
        remote.clone(),
        OwnerId::new("user-1").unwrap(),
        settings,
    ));
    let network = Arc::new(StaticNetworkMonitor::new(online));
    (remote, engine, network)
}

#[tokio::test]
async fn test_debounce_collapses_burst_into_one_pass() {
    let settings = settings(50, 3600);
    let (remote, engine, network) = setup(&settings, true).await;

    let (scheduler, signal, stop) = SyncScheduler::new(engine, network, &settings);
    let task = tokio::spawn(scheduler.run());

    // A burst of rapid mutations
    for _ in 0..5 {
        signal.notify();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // Wait past the debounce window
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(remote.passes(), 1);

    stop.stop();
    task.await.unwrap();
}

#[tokio::test]
async fn test_each_settled_burst_triggers_again() {
    let settings = settings(30, 3600);
    let (remote, engine, network) = setup(&settings, true).await;

    let (scheduler, signal, stop) = SyncScheduler::new(engine, network, &settings);
    let task = tokio::spawn(scheduler.run());

    signal.notify();
    tokio::time::sleep(Duration::from_millis(150)).await;
    signal.notify();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(remote.passes(), 2);

    stop.stop();
    task.await.unwrap();
}

#[tokio::test]
async fn test_offline_gates_triggers() {
    let settings = settings(20, 3600);
    let (remote, engine, network) = setup(&settings, false).await;

    let (scheduler, signal, stop) = SyncScheduler::new(engine, network.clone(), &settings);
    let task = tokio::spawn(scheduler.run());

    signal.notify();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(remote.passes(), 0);

    stop.stop();
    task.await.unwrap();
}

#[tokio::test]
async fn test_reconnect_triggers_pass() {
    let settings = settings(1000, 3600);
    let (remote, engine, network) = setup(&settings, false).await;

    let (scheduler, _signal, stop) = SyncScheduler::new(engine, network.clone(), &settings);
    let task = tokio::spawn(scheduler.run());

    tokio::time::sleep(Duration::from_millis(20)).await;
    network.set_online(true);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(remote.passes(), 1);

    stop.stop();
    task.await.unwrap();
}

#[tokio::test]
async fn test_periodic_timer_triggers_passes() {
    let settings = settings(10_000, 1);
    let (remote, engine, network) = setup(&settings, true).await;

    let (scheduler, _signal, stop) = SyncScheduler::new(engine, network, &settings);
    let task = tokio::spawn(scheduler.run());

    // No mutations at all; the 1s timer still drives passes
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(remote.passes() >= 2);

    stop.stop();
    task.await.unwrap();
}

#[tokio::test]
async fn test_stop_terminates_task() {
    let settings = settings(1000, 3600);
    let (_remote, engine, network) = setup(&settings, true).await;

    let (scheduler, _signal, stop) = SyncScheduler::new(engine, network, &settings);
    let task = tokio::spawn(scheduler.run());

    stop.stop();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("scheduler should stop when asked")
        .unwrap();
}

#[tokio::test]
async fn test_dropping_all_signals_stops_scheduler() {
    let settings = settings(10, 3600);
    let (remote, engine, network) = setup(&settings, true).await;

    let (scheduler, signal, _stop) = SyncScheduler::new(engine, network, &settings);
    let task = tokio::spawn(scheduler.run());

    signal.notify();
    drop(signal);

    // The pending debounced trigger is flushed before shutdown
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("scheduler should stop when all signals are dropped")
        .unwrap();
    assert_eq!(remote.passes(), 1);
}
