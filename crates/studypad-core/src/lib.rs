//! StudyPad Core - Domain logic for the local-first sync layer
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Note`, `Chat`, `Message`, `EntityRecord`, `SyncQueueEntry`
//! - **Use cases** - the entity helpers (`NoteHelper`, `ChatHelper`, `MessageHelper`)
//! - **Port definitions** - Traits for adapters: `LocalStore`, `RemoteApi`
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O dependencies.
//! Ports define trait interfaces that adapter crates implement
//! (`studypad-store` for SQLite, `studypad-remote` for the REST backend).
//! The entity helpers orchestrate domain entities through port interfaces
//! and are the only code that knows entity-specific invariants.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
