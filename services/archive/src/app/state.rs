//! services/archive/src/app/state.rs
//!
//! The application context, built once at startup and handed to everything
//! that needs the backend. There is no global client: when no database is
//! configured the context simply carries no `Backend`, and every consumer has
//! to handle that case through the `Option`.

use book_archive_core::ports::{AuthService, DocumentStore, KeyValueStorage};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::{FileStorage, MemoryStorage, PgAuthService, PgDocumentStore};
use crate::config::Config;
use crate::error::{AppError, AppResult};

/// Storage path that keeps local state in memory only.
pub const IN_MEMORY: &str = ":memory:";

/// The remote services, present only when the archive is configured.
#[derive(Clone)]
pub struct Backend {
    pub store: Arc<dyn DocumentStore>,
    pub auth: Arc<dyn AuthService>,
}

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub backend: Option<Backend>,
    pub storage: Arc<dyn KeyValueStorage>,
}

impl AppContext {
    /// Opens local storage and, when a database URL is configured, connects
    /// to the database and runs migrations.
    pub async fn connect(config: Config) -> AppResult<Self> {
        let config = Arc::new(config);
        let storage: Arc<dyn KeyValueStorage> = if config.storage_path.as_os_str() == IN_MEMORY {
            Arc::new(MemoryStorage::new())
        } else {
            Arc::new(FileStorage::open(&config.storage_path)?)
        };

        let Some(database_url) = config.database_url.as_deref() else {
            warn!("DATABASE_URL is not set; the archive runs unconfigured");
            return Ok(Self {
                config,
                backend: None,
                storage,
            });
        };

        info!("Connecting to database...");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let store = PgDocumentStore::new(pool.clone());
        info!("Running database migrations...");
        store.run_migrations().await?;
        info!("Database migrations complete.");

        let backend = Backend {
            store: Arc::new(store),
            auth: Arc::new(PgAuthService::new(pool, storage.clone())),
        };
        Ok(Self {
            config,
            backend: Some(backend),
            storage,
        })
    }

    /// Assembles a context from already-built parts.
    pub fn new(config: Config, backend: Option<Backend>, storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            config: Arc::new(config),
            backend,
            storage,
        }
    }

    pub fn backend(&self) -> AppResult<&Backend> {
        self.backend.as_ref().ok_or(AppError::Unconfigured)
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }
}
