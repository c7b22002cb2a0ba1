pub mod auth;
pub mod db;
pub mod storage;

pub use auth::PgAuthService;
pub use db::PgDocumentStore;
pub use storage::{FileStorage, MemoryStorage};
