//! Domain and storage error types
//!
//! `DomainError` covers entity-invariant violations raised by constructors
//! and mutation methods. `StoreError` is the typed failure surface of the
//! local store port: callers must be able to distinguish a storage-layer
//! failure (roll back optimistic state) from a missing id (no-op failure),
//! so the port does not erase the distinction behind an opaque error.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Generic validation failure
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Invalid message status transition attempt (status only moves forward)
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        /// The current status
        from: String,
        /// The attempted target status
        to: String,
    },

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}

/// Errors raised by the local store port
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage layer itself failed (I/O, quota, corruption)
    #[error("Storage failure: {0}")]
    Storage(String),

    /// An update or status change referenced a nonexistent local id
    #[error("Record not found: {0}")]
    NotFound(String),

    /// An entity payload could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Returns true for storage-layer failures that require the caller to
    /// roll back optimistic state
    pub fn is_storage(&self) -> bool {
        matches!(self, StoreError::Storage(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::Validation("empty title".to_string());
        assert_eq!(err.to_string(), "Validation failed: empty title");

        let err = DomainError::InvalidStatusTransition {
            from: "read".to_string(),
            to: "sent".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid status transition from read to sent"
        );
    }

    #[test]
    fn test_store_error_classification() {
        assert!(StoreError::Storage("disk full".into()).is_storage());
        assert!(!StoreError::NotFound("abc".into()).is_storage());
        assert!(!StoreError::Serialization("bad json".into()).is_storage());
    }
}
