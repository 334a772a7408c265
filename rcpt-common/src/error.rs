//! Common error types shared by the receipt ingestion services
//!
//! Only infrastructure concerns live here: storage, filesystem, config, and
//! invariant violations. Domain failures (signatures, parsing, tenancy, rate
//! limits) belong to the service's own error type.

use thiserror::Error;

/// Common result type
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Broken internal invariant, e.g. a row that must exist after an upsert
    /// does not
    #[error("Internal error: {0}")]
    Internal(String),
}
