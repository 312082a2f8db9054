//! StudyPad Remote - REST client for the sync backend
//!
//! Implements the `RemoteApi` port from `studypad-core` over HTTP. This is
//! a driven (secondary) adapter in the hexagonal architecture: the sync
//! engine drains the queue against it and pulls deltas from it, and stays
//! agnostic to the transport.
//!
//! The client owns the one policy decision the engine depends on: remote
//! failures are classified as transient (retry with backoff) or permanent
//! (mark the entity errored, stop retrying) by status code.

pub mod client;

pub use client::RestRemoteApi;
