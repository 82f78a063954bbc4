//! # AppError
//!
//! Centralized error handling for the thread board.
//! Maps domain-specific failures to actionable error types so callers
//! can branch on the kind instead of parsing messages.

use thiserror::Error;

/// The primary error type for all tb-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Thread, User)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., empty comment, page number 0)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// No identity on a request that writes
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A write was rejected by the store (constraint violation, locked database)
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store could not be reached (pool closed, timeout, I/O)
    #[error("connection error: {0}")]
    Connection(String),

    /// Anything else the infrastructure reports
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn thread_not_found(id: impl ToString) -> Self {
        AppError::NotFound("Thread".to_string(), id.to_string())
    }

    pub fn user_not_found(id: impl ToString) -> Self {
        AppError::NotFound("User".to_string(), id.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(..))
    }
}

/// A specialized Result type for thread board logic.
pub type Result<T> = std::result::Result<T, AppError>;
