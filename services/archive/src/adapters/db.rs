//! services/archive/src/adapters/db.rs
//!
//! This module contains the table-store adapter, which is the concrete implementation
//! of the `DocumentStore` port from the `core` crate. It handles all interactions
//! with the `books` table in PostgreSQL using `sqlx`.

use async_trait::async_trait;
use book_archive_core::domain::{Document, NewDocument};
use book_archive_core::ports::{DocumentStore, ListOptions, PortError, PortResult};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

/// SQLSTATE raised when row-level security or grants refuse a statement.
const INSUFFICIENT_PRIVILEGE: &str = "42501";

const BOOK_COLUMNS: &str = "id, title, author, summary, content, created_at, updated_at, owner_id";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A table-store adapter that implements the `DocumentStore` port.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Creates a new `PgDocumentStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct BookRecord {
    id: i64,
    title: String,
    author: String,
    summary: Option<String>,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    owner_id: Option<Uuid>,
}
impl BookRecord {
    fn to_domain(self) -> Document {
        Document {
            id: self.id,
            title: self.title,
            author: self.author,
            summary: self.summary,
            content: self.content,
            created_at: self.created_at,
            updated_at: self.updated_at,
            owner_id: self.owner_id,
        }
    }
}

/// Translates a `sqlx` failure into the port's error vocabulary.
pub(crate) fn port_error(error: sqlx::Error, not_found: impl FnOnce() -> String) -> PortError {
    match error {
        sqlx::Error::RowNotFound => PortError::NotFound(not_found()),
        sqlx::Error::Database(db) => {
            let status = match db.code() {
                Some(code) if code == INSUFFICIENT_PRIVILEGE => Some(403),
                _ => None,
            };
            PortError::Rejected {
                message: db.message().to_string(),
                status,
            }
        }
        other => PortError::Unexpected(other.to_string()),
    }
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn list_documents(&self, options: ListOptions) -> PortResult<Vec<Document>> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY created_at DESC LIMIT $1");
        let records = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(options.limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| port_error(e, || "books".to_string()))?;

        debug!("Loaded {} books", records.len());
        Ok(records.into_iter().map(BookRecord::to_domain).collect())
    }

    async fn get_document(&self, id: i64) -> PortResult<Document> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1");
        let record = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| port_error(e, || format!("Book {} not found", id)))?;
        Ok(record.to_domain())
    }

    async fn insert_document(
        &self,
        document: NewDocument,
        owner_id: Option<Uuid>,
    ) -> PortResult<Document> {
        let sql = format!(
            "INSERT INTO books (title, author, summary, content, owner_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {BOOK_COLUMNS}"
        );
        let record = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(&document.title)
            .bind(&document.author)
            .bind(&document.summary)
            .bind(&document.content)
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| port_error(e, || "inserted book".to_string()))?;

        info!("Inserted book {} ({})", record.id, record.title);
        Ok(record.to_domain())
    }

    async fn update_document(&self, id: i64, document: NewDocument) -> PortResult<Document> {
        let sql = format!(
            "UPDATE books SET title = $1, author = $2, summary = $3, content = $4, \
             updated_at = now() WHERE id = $5 RETURNING {BOOK_COLUMNS}"
        );
        let record = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(&document.title)
            .bind(&document.author)
            .bind(&document.summary)
            .bind(&document.content)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| port_error(e, || format!("Book {} not found", id)))?;

        info!("Updated book {}", id);
        Ok(record.to_domain())
    }

    async fn delete_document(&self, id: i64) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| port_error(e, || format!("Book {} not found", id)))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Book {} not found", id)));
        }
        info!("Deleted book {}", id);
        Ok(())
    }

    async fn upsert_documents(&self, documents: &[Document]) -> PortResult<usize> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| port_error(e, || "transaction".to_string()))?;

        for document in documents {
            sqlx::query(
                "INSERT INTO books (id, title, author, summary, content, created_at, updated_at, owner_id) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 ON CONFLICT (id) DO UPDATE SET title = EXCLUDED.title, author = EXCLUDED.author, \
                 summary = EXCLUDED.summary, content = EXCLUDED.content, \
                 created_at = EXCLUDED.created_at, updated_at = EXCLUDED.updated_at, \
                 owner_id = EXCLUDED.owner_id",
            )
            .bind(document.id)
            .bind(&document.title)
            .bind(&document.author)
            .bind(&document.summary)
            .bind(&document.content)
            .bind(document.created_at)
            .bind(document.updated_at)
            .bind(document.owner_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| port_error(e, || format!("Book {}", document.id)))?;
        }

        // Explicit ids bypass the sequence; move it past them.
        sqlx::query(
            "SELECT setval(pg_get_serial_sequence('books', 'id'), \
             GREATEST((SELECT COALESCE(MAX(id), 0) FROM books), 1))",
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| port_error(e, || "books sequence".to_string()))?;

        tx.commit()
            .await
            .map_err(|e| port_error(e, || "transaction".to_string()))?;

        info!("Upserted {} books", documents.len());
        Ok(documents.len())
    }
}
