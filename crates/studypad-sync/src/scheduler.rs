//! Sync scheduler - turns mutation signals into engine passes
//!
//! The [`SyncScheduler`] sits between the session layer and the
//! [`SyncEngine`](crate::engine::SyncEngine). It owns every trigger the
//! engine reacts to:
//!
//! - a **debounced signal** after local mutations (bursts of rapid edits
//!   collapse into one pass),
//! - a **periodic timer** while the network is available,
//! - a **network reconnect** edge,
//! - and shutdown, either explicit via [`StopHandle`] or implicit when
//!   every [`MutationSignal`] has been dropped.
//!
//! ```text
//! session handles ──► MutationSignal ──► SyncScheduler ──► SyncEngine
//!                                             ▲
//!                              timer ─────────┤
//!                              reconnect ─────┘
//! ```
//!
//! The scheduler is an explicitly constructed task with a clear start/stop
//! lifecycle; nothing here installs global timers or listeners.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use studypad_core::config::SyncSettings;

use crate::engine::SyncEngine;
use crate::network::NetworkMonitor;

/// Capacity of the mutation signal channel; signals carry no payload, so
/// a full channel just means a pass is already due
const SIGNAL_BUFFER: usize = 64;

// ============================================================================
// Handles
// ============================================================================

/// Cloneable sender the session layer notifies after every local mutation
#[derive(Clone)]
pub struct MutationSignal {
    tx: mpsc::Sender<()>,
}

impl MutationSignal {
    /// Signals that a local mutation happened
    ///
    /// Never blocks; a full buffer is fine because the scheduler only needs
    /// to know that *something* changed.
    pub fn notify(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Stops the scheduler task
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Asks the scheduler loop to terminate
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

// ============================================================================
// SyncScheduler
// ============================================================================

/// Drives the engine from debounced signals, a timer, and reconnect events
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    network: Arc<dyn NetworkMonitor>,
    mutation_rx: mpsc::Receiver<()>,
    stop_rx: watch::Receiver<bool>,
    debounce: Duration,
    poll_interval: Duration,
}

impl SyncScheduler {
    /// Creates a scheduler and its control handles
    ///
    /// The scheduler does nothing until [`run`](SyncScheduler::run) is
    /// awaited (typically inside `tokio::spawn`).
    pub fn new(
        engine: Arc<SyncEngine>,
        network: Arc<dyn NetworkMonitor>,
        settings: &SyncSettings,
    ) -> (Self, MutationSignal, StopHandle) {
        let (mutation_tx, mutation_rx) = mpsc::channel(SIGNAL_BUFFER);
        let (stop_tx, stop_rx) = watch::channel(false);

        info!(
            debounce_ms = settings.debounce_ms,
            poll_interval_secs = settings.poll_interval_secs,
            "Creating sync scheduler"
        );

        let scheduler = Self {
            engine,
            network,
            mutation_rx,
            stop_rx,
            debounce: settings.debounce(),
            poll_interval: settings.poll_interval(),
        };

        (
            scheduler,
            MutationSignal { tx: mutation_tx },
            StopHandle { tx: stop_tx },
        )
    }

    /// Main scheduler loop
    ///
    /// Terminates when [`StopHandle::stop`] is called or when every
    /// [`MutationSignal`] has been dropped (after flushing a pending
    /// debounced trigger).
    pub async fn run(mut self) {
        info!("Sync scheduler starting");

        let mut online_rx = self.network.subscribe();
        let mut was_online = self.network.is_online();
        let mut network_alive = true;

        // First periodic tick only after a full interval, not at startup
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);

        // Pending debounce deadline, armed by mutation signals
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                maybe = self.mutation_rx.recv() => {
                    match maybe {
                        Some(()) => {
                            // Each signal re-arms the window, collapsing bursts
                            deadline = Some(Instant::now() + self.debounce);
                        }
                        None => {
                            info!("All mutation signals dropped, scheduler shutting down");
                            if deadline.take().is_some() {
                                self.trigger("final flush").await;
                            }
                            break;
                        }
                    }
                }

                () = async { tokio::time::sleep_until(deadline.unwrap()).await }, if deadline.is_some() => {
                    deadline = None;
                    self.trigger("debounced local mutations").await;
                }

                _ = ticker.tick() => {
                    self.trigger("periodic").await;
                }

                changed = online_rx.changed(), if network_alive => {
                    match changed {
                        Ok(()) => {
                            let online = *online_rx.borrow_and_update();
                            if online && !was_online {
                                self.trigger("network reconnect").await;
                            }
                            was_online = online;
                        }
                        Err(_) => {
                            warn!("Network monitor dropped, reconnect triggers disabled");
                            network_alive = false;
                        }
                    }
                }

                result = self.stop_rx.changed() => {
                    if result.is_err() || *self.stop_rx.borrow() {
                        info!("Sync scheduler stop requested");
                        break;
                    }
                }
            }
        }

        info!("Sync scheduler stopped");
    }

    /// Runs one engine pass unless the network is down
    async fn trigger(&self, reason: &str) {
        if !self.network.is_online() {
            debug!(reason, "offline, skipping sync trigger");
            return;
        }

        debug!(reason, "triggering sync pass");
        match self.engine.sync().await {
            Ok(outcome) if outcome.coalesced => {
                debug!(reason, "sync coalesced into running pass");
            }
            Ok(outcome) => {
                debug!(
                    reason,
                    pushed = outcome.pushed,
                    pulled = outcome.pulled,
                    failed = outcome.failed,
                    "sync pass finished"
                );
            }
            Err(err) => {
                warn!(reason, error = %err, "sync pass failed");
            }
        }
    }
}
