//! StudyPad Session - reactive feature bindings
//!
//! Bridges the local store and entity helpers to UI-observable state. Each
//! handle loads its collection from the local store on construction (no
//! network wait), exposes it through a `watch` channel, applies every
//! mutation optimistically, and nudges the sync scheduler after each local
//! write.
//!
//! Handles also watch the sync engine's phase: whenever a pass returns to
//! idle, the collection is reloaded so reconciled remote changes become
//! visible without any imperative refresh from the UI.
//!
//! Sync failures never surface here as exceptions; they are queryable per
//! entity through `sync_status` on the returned values.

pub mod conversations;
pub mod notes;

pub use conversations::ConversationsHandle;
pub use notes::NotesHandle;
