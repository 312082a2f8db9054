//! StudyPad Sync - Background reconciliation engine
//!
//! The only component that talks to the remote system: turns the local
//! sync queue into remote calls and remote state into local updates.
//!
//! ## Sync Flow
//!
//! 1. **Draining**: push queued local mutations to the remote API in FIFO
//!    order, with per-entry capped exponential backoff
//! 2. **Pulling**: fetch remote changes newer than the stored checkpoint
//! 3. **Reconciling**: merge pulled state into the local store, resolving
//!    conflicts last-write-wins by `updated_at` (version as tiebreak)
//!
//! ## Components
//!
//! - [`SyncEngine`] - runs one pass at a time; concurrent requests coalesce
//!   into a follow-up pass instead of overlapping
//! - [`SyncScheduler`] - turns debounced mutation signals, a periodic
//!   timer, and network-reconnect events into engine passes, with an
//!   explicit stop lifecycle
//! - [`NetworkMonitor`] - the online/offline signal the scheduler gates on

pub mod engine;
pub mod network;
pub mod scheduler;

pub use engine::{SyncEngine, SyncError, SyncOutcome, SyncPhase};
pub use network::{NetworkMonitor, StaticNetworkMonitor};
pub use scheduler::{MutationSignal, StopHandle, SyncScheduler};
