//! Port definitions (hexagonal architecture)
//!
//! Traits the adapter crates implement: `LocalStore` (SQLite adapter in
//! `studypad-store`) and `RemoteApi` (REST adapter in `studypad-remote`).
//! The core is agnostic to the transport behind each port.

pub mod remote;
pub mod store;

pub use remote::{RemoteApi, RemoteEntity, RemoteError, RemotePage};
pub use store::{LocalStore, SyncCheckpoint};
