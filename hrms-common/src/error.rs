//! Common error types for the HR management service
//!
//! Domain code in this crate reports failures through [`Error`]; the HTTP
//! layer maps each variant onto a status code.

use thiserror::Error;

/// Common result type for HRMS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by shared domain code
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller-supplied value failed a business rule
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Record would violate a uniqueness rule
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Credentials or session token rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated caller lacks the role for an action
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the underlying database error is a UNIQUE constraint violation
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}
