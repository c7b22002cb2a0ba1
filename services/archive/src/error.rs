//! services/archive/src/error.rs
//!
//! Defines the primary error type for the archive client.

use crate::config::ConfigError;
use book_archive_core::permissions::PermissionDenied;
use book_archive_core::ports::{PortError, StorageError};

/// The primary error type for the `archive` service.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error from the local key-value storage.
    #[error("Storage Error: {0}")]
    Storage(#[from] StorageError),

    /// The signed-in user may not perform the action.
    #[error("{0}")]
    Permission(#[from] PermissionDenied),

    /// No backing store is configured, so nothing can be read or written remotely.
    #[error("The archive is not connected to a database. Set DATABASE_URL to enable it.")]
    Unconfigured,

    /// Represents a standard Input/Output error (e.g., reading an import file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;
