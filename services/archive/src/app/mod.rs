pub mod archive;
pub mod debounce;
pub mod drafts;
pub mod favorites;
pub mod notice;
pub mod reader;
pub mod search;
pub mod session;
pub mod state;

// Re-export the pieces the binary wires together.
pub use archive::Archive;
pub use notice::{Notice, NoticeKind};
pub use session::SessionManager;
pub use state::{AppContext, Backend};
