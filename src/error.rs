//! Error handling for the dispatch planning system
//!
//! This module provides idiomatic Rust error types using thiserror for
//! better error messages and proper error chain handling.

use thiserror::Error;

/// Main error type for the planning system
#[derive(Error, Debug)]
pub enum PlanningError {
    /// Malformed caller input, rejected before any lock or data access.
    #[error("{0}")]
    InvalidRequest(String),

    /// Another run holds the lock for an overlapping window. The caller
    /// must retry later; no partial state was created.
    #[error("Already running (lock exists)")]
    LockConflict,

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unexpected failure after lock acquisition; the lock is still
    /// released on this path.
    #[error("Planning run failed: {0}")]
    Internal(String),
}

impl PlanningError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::LockConflict)
    }
}
