//! crates/book_archive_core/src/ports.rs
//!
//! Defines the service contracts (traits) the archive depends on.
//! These traits form the boundary of the hexagonal architecture: the hosted
//! table store, the hosted authentication service and the local key-value
//! storage are all reached through them and never named directly by the core.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{AuthSession, Document, NewDocument};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all remote port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The service answered but refused the call. `status` is an HTTP-like code when known.
    #[error("{message}")]
    Rejected {
        message: String,
        status: Option<u16>,
    },
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    pub fn rejected(message: impl Into<String>) -> Self {
        PortError::Rejected {
            message: message.into(),
            status: None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            PortError::Rejected { status, .. } => *status,
            PortError::Unauthorized => Some(401),
            PortError::NotFound(_) => Some(404),
            PortError::Unexpected(_) => None,
        }
    }

    /// 403 responses mean the caller must sign in before retrying.
    pub fn requires_sign_in(&self) -> bool {
        matches!(self, PortError::Unauthorized) || self.status() == Some(403)
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Errors from the local key-value storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage data is malformed: {0}")]
    Malformed(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Options for listing documents. Results are always newest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: Option<i64>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_documents(&self, options: ListOptions) -> PortResult<Vec<Document>>;

    async fn get_document(&self, id: i64) -> PortResult<Document>;

    async fn insert_document(
        &self,
        document: NewDocument,
        owner_id: Option<Uuid>,
    ) -> PortResult<Document>;

    /// Replaces the editable columns and stamps `updated_at`.
    async fn update_document(&self, id: i64, document: NewDocument) -> PortResult<Document>;

    async fn delete_document(&self, id: i64) -> PortResult<()>;

    /// Inserts or overwrites rows, using `id` as the conflict key.
    async fn upsert_documents(&self, documents: &[Document]) -> PortResult<usize>;
}

/// A stream of auth-state changes. `None` means signed out.
/// Dropping the stream unsubscribes.
pub type AuthStateStream = Pin<Box<dyn Stream<Item = Option<AuthSession>> + Send>>;

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> PortResult<AuthSession>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> PortResult<AuthSession>;

    async fn sign_out(&self) -> PortResult<()>;

    async fn current_session(&self) -> PortResult<Option<AuthSession>>;

    fn subscribe(&self) -> AuthStateStream;
}

/// Synchronous string key-value storage, the shape of browser local storage.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    fn remove(&self, key: &str) -> StorageResult<()>;
}
