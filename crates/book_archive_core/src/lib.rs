pub mod catalog;
pub mod domain;
pub mod genre;
pub mod links;
pub mod pagination;
pub mod permissions;
pub mod ports;

pub use catalog::{arrange, CatalogQuery, SortKey, SEARCH_DEBOUNCE};
pub use domain::{AuthSession, Document, DocumentDraft, NewDocument, Role, SessionUser};
pub use genre::{apply_tag, classify, extract_tag, strip_tag, Genre, GenreFilter};
pub use pagination::{paginate, slice_fixed, PaginationMode, DEFAULT_PAGE_BUDGET};
pub use permissions::{authorize, Action, PermissionDenied};
pub use ports::{
    AuthService, AuthStateStream, DocumentStore, KeyValueStorage, ListOptions, PortError,
    PortResult, StorageError, StorageResult,
};
