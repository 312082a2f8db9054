//! StudyPad Store - Local state persistence
//!
//! SQLite-backed durable storage for:
//! - Entity records (notes, chats, messages) with their payload JSON
//! - The sync queue of pending mutations
//! - Per-(owner, kind) sync checkpoints
//!
//! ## Architecture
//!
//! This crate implements the `LocalStore` port from `studypad-core` using
//! SQLite as the storage backend. It is a driven (secondary) adapter in the
//! hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteEntityStore`] - Full `LocalStore` implementation
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use studypad_store::{DatabasePool, SqliteEntityStore};
//!
//! # async fn example() -> Result<(), studypad_core::domain::StoreError> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/studypad/sync.db")).await?;
//! let store = SqliteEntityStore::new(pool.pool().clone());
//! // Use store as LocalStore...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteEntityStore;
