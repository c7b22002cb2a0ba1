//! services/archive/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use book_archive_core::pagination::{PaginationMode, DEFAULT_PAGE_BUDGET};
use chrono::Duration;
use std::path::PathBuf;
use tracing::Level;
use url::Url;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// `None` leaves the archive unconfigured: read-only with a persistent notice.
    pub database_url: Option<String>,
    pub storage_path: PathBuf,
    pub log_level: Level,
    pub page_budget: usize,
    pub pagination_mode: PaginationMode,
    /// `None` disables the soft session expiry.
    pub session_ttl: Option<Duration>,
    pub base_url: Url,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let storage_path = lookup("ARCHIVE_STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./archive-storage.json"));

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let page_budget = match lookup("PAGE_BUDGET") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(budget) if budget >= 1 => budget,
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "PAGE_BUDGET".to_string(),
                        format!("'{}' is not a positive number", raw),
                    ))
                }
            },
            None => DEFAULT_PAGE_BUDGET,
        };

        let pagination_mode = match lookup("PAGINATION_MODE") {
            Some(raw) => PaginationMode::from_name(&raw).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "PAGINATION_MODE".to_string(),
                    format!("'{}' is not one of paragraphs, fixed", raw),
                )
            })?,
            None => PaginationMode::default(),
        };

        let session_ttl = match lookup("SESSION_TTL_MINUTES") {
            Some(raw) => {
                let minutes = raw.trim().parse::<i64>().map_err(|e| {
                    ConfigError::InvalidValue("SESSION_TTL_MINUTES".to_string(), e.to_string())
                })?;
                (minutes > 0).then(|| Duration::minutes(minutes))
            }
            None => Some(Duration::minutes(60)),
        };

        let base_url_str =
            lookup("ARCHIVE_BASE_URL").unwrap_or_else(|| "http://localhost:3000/".to_string());
        let base_url = Url::parse(&base_url_str).map_err(|e| {
            ConfigError::InvalidValue("ARCHIVE_BASE_URL".to_string(), e.to_string())
        })?;

        Ok(Self {
            database_url,
            storage_path,
            log_level,
            page_budget,
            pagination_mode,
            session_ttl,
            base_url,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.database_url.is_some()
    }
}
