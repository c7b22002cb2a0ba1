//! services/archive/src/app/archive.rs
//!
//! The archive view-model. It holds the in-memory collection, runs the
//! browse pipeline, and performs every write through the backend after the
//! unconfigured, session-expiry and permission checks.
//!
//! Public operations never return raw errors: failures are turned into a
//! `Notice`, recorded, and handed back. Local state only changes after the
//! backend has confirmed a write.

use book_archive_core::catalog::{self, CatalogQuery};
use book_archive_core::domain::{Document, DocumentDraft, SessionUser};
use book_archive_core::genre;
use book_archive_core::links;
use book_archive_core::permissions::{self, Action};
use book_archive_core::ports::ListOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;

use crate::app::drafts::{DraftSlot, Drafts};
use crate::app::favorites::Favorites;
use crate::app::notice::{Notice, Notices};
use crate::app::reader::Reader;
use crate::app::session::SessionManager;
use crate::app::state::AppContext;
use crate::error::{AppError, AppResult};

const IMPORTABLE_EXTENSIONS: [&str; 3] = ["txt", "md", "markdown"];

pub struct Archive {
    context: AppContext,
    session: Arc<SessionManager>,
    favorites: Favorites,
    drafts: Drafts,
    documents: Vec<Document>,
    notices: Notices,
}

impl Archive {
    pub fn new(context: AppContext, session: Arc<SessionManager>) -> Self {
        let favorites = Favorites::load(context.storage.clone());
        let drafts = Drafts::new(context.storage.clone());
        let mut notices = Notices::default();
        if !context.is_configured() {
            notices.push(Notice::from(&AppError::Unconfigured));
        }
        Self {
            context,
            session,
            favorites,
            drafts,
            documents: Vec::new(),
            notices,
        }
    }

    //=====================================================================================
    // Read side
    //=====================================================================================

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn document(&self, id: i64) -> Option<&Document> {
        self.documents.iter().find(|doc| doc.id == id)
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub fn dismiss_notice(&mut self, index: usize) -> bool {
        self.notices.dismiss(index)
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn drafts(&self) -> &Drafts {
        &self.drafts
    }

    /// Starts the session manager. A failure to restore the previous session
    /// is reported as a notice and the archive carries on signed out.
    pub async fn resume_session(&mut self) -> Option<SessionUser> {
        match self.session.start().await {
            Ok(()) => self.session.current_user(),
            Err(AppError::Unconfigured) => None,
            Err(e) => {
                let _ = self.report::<()>(Err(e));
                None
            }
        }
    }

    pub fn is_favorite(&self, id: i64) -> bool {
        self.favorites.contains(id)
    }

    /// Reloads the collection. On failure the previous list is kept.
    pub async fn refresh(&mut self) -> Result<usize, Notice> {
        let result = self.load_documents().await;
        let documents = self.report(result)?;
        self.documents = documents;
        Ok(self.documents.len())
    }

    /// The display list for the current browse settings.
    pub fn visible(&self, query: &CatalogQuery) -> Vec<&Document> {
        catalog::arrange(&self.documents, self.favorites.ids(), query)
    }

    pub fn toggle_favorite(&mut self, id: i64) -> Result<bool, Notice> {
        let result = self.favorites.toggle(id).map_err(AppError::from);
        self.report(result)
    }

    //=====================================================================================
    // Write side
    //=====================================================================================

    pub async fn create(&mut self, draft: &DocumentDraft) -> Result<Document, Notice> {
        let result = self.try_create(draft).await;
        let created = self.report(result)?;
        self.documents.insert(0, created.clone());
        self.clear_draft(DraftSlot::Add);
        Ok(created)
    }

    pub async fn update(&mut self, id: i64, draft: &DocumentDraft) -> Result<Document, Notice> {
        let result = self.try_update(id, draft).await;
        let updated = self.report(result)?;
        match self.documents.iter_mut().find(|doc| doc.id == id) {
            Some(existing) => *existing = updated.clone(),
            None => self.documents.insert(0, updated.clone()),
        }
        self.clear_draft(DraftSlot::Edit(id));
        Ok(updated)
    }

    pub async fn delete(&mut self, id: i64) -> Result<(), Notice> {
        let result = self.try_delete(id).await;
        self.report(result)?;
        self.documents.retain(|doc| doc.id != id);
        self.clear_draft(DraftSlot::Edit(id));
        Ok(())
    }

    /// Upserts every book from a JSON backup. Administrators only.
    pub async fn restore(&mut self, path: &Path) -> Result<usize, Notice> {
        let result = self.try_restore(path).await;
        let count = self.report(result)?;
        self.refresh().await?;
        Ok(count)
    }

    //=====================================================================================
    // Files and links
    //=====================================================================================

    /// Turns a dropped `.txt`/`.md` file into the add-form draft.
    pub fn import_text_file(&mut self, path: &Path) -> Result<DocumentDraft, Notice> {
        let result = self.try_import(path);
        self.report(result)
    }

    /// Writes the book's raw content to `<dir>/<title>.txt`.
    pub fn export(&mut self, id: i64, dir: &Path) -> Result<PathBuf, Notice> {
        let result = self.try_export(id, dir);
        self.report(result)
    }

    /// Writes the whole collection as JSON.
    pub fn backup(&mut self, path: &Path) -> Result<usize, Notice> {
        let result = self.try_backup(path);
        self.report(result)
    }

    /// Opens a book in the reader and returns the shareable link for it.
    pub async fn open(&mut self, id: i64) -> Result<(Reader, Url), Notice> {
        let result = self.find_or_fetch(id).await;
        let document = self.report(result)?;
        let config = &self.context.config;
        let reader = Reader::open(
            &document,
            config.pagination_mode,
            config.page_budget,
            self.context.storage.clone(),
        );
        let link = links::with_document(&config.base_url, id);
        Ok((reader, link))
    }

    /// Opens the book a deep link points at, if it points at one.
    pub async fn open_link(&mut self, url: &Url) -> Option<Result<(Reader, Url), Notice>> {
        let id = links::document_id_from_url(url)?;
        Some(self.open(id).await)
    }

    /// The link to show once the reader is closed.
    pub fn closed_link(&self) -> Url {
        links::without_document(&self.context.config.base_url)
    }

    //=====================================================================================
    // Internals
    //=====================================================================================

    fn report<T>(&mut self, result: AppResult<T>) -> Result<T, Notice> {
        result.map_err(|e| {
            match &e {
                AppError::Permission(denied) => warn!("Blocked: {}", denied),
                AppError::Unconfigured => warn!("{}", e),
                other => error!("Archive operation failed: {}", other),
            }
            let notice = Notice::from(&e);
            self.notices.push(notice.clone());
            notice
        })
    }

    fn clear_draft(&mut self, slot: DraftSlot) {
        if let Err(e) = self.drafts.clear(slot) {
            warn!("Could not clear {}: {}", slot.key(), e);
        }
    }

    /// Checks expiry and the permission rules, returning the acting user.
    async fn authorize(
        &self,
        action: Action,
        document: Option<&Document>,
    ) -> AppResult<Option<SessionUser>> {
        let user = self.session.ensure_active().await?;
        permissions::authorize(action, user.as_ref(), document)?;
        Ok(user)
    }

    async fn load_documents(&self) -> AppResult<Vec<Document>> {
        let backend = self.context.backend()?;
        let documents = backend.store.list_documents(ListOptions::default()).await?;
        info!("Loaded {} books", documents.len());
        Ok(documents)
    }

    async fn find_or_fetch(&self, id: i64) -> AppResult<Document> {
        if let Some(document) = self.document(id) {
            return Ok(document.clone());
        }
        let backend = self.context.backend()?;
        Ok(backend.store.get_document(id).await?)
    }

    async fn try_create(&self, draft: &DocumentDraft) -> AppResult<Document> {
        let backend = self.context.backend()?;
        let user = self.authorize(Action::Create, None).await?;
        let owner_id = user.map(|user| user.id);
        Ok(backend
            .store
            .insert_document(draft.to_new_document(), owner_id)
            .await?)
    }

    async fn try_update(&self, id: i64, draft: &DocumentDraft) -> AppResult<Document> {
        let backend = self.context.backend()?;
        let existing = self.find_or_fetch(id).await?;
        self.authorize(Action::Edit, Some(&existing)).await?;
        Ok(backend
            .store
            .update_document(id, draft.to_new_document())
            .await?)
    }

    async fn try_delete(&self, id: i64) -> AppResult<()> {
        let backend = self.context.backend()?;
        let existing = self.find_or_fetch(id).await?;
        self.authorize(Action::Delete, Some(&existing)).await?;
        backend.store.delete_document(id).await?;
        Ok(())
    }

    async fn try_restore(&self, path: &Path) -> AppResult<usize> {
        let backend = self.context.backend()?;
        self.authorize(Action::Restore, None).await?;
        let raw = std::fs::read_to_string(path)?;
        let documents: Vec<Document> = serde_json::from_str(&raw)
            .map_err(|e| AppError::Internal(format!("{} is not a backup: {}", path.display(), e)))?;
        Ok(backend.store.upsert_documents(&documents).await?)
    }

    fn try_import(&self, path: &Path) -> AppResult<DocumentDraft> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !IMPORTABLE_EXTENSIONS.contains(&extension.as_str()) {
            return Err(AppError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Only .txt and .md files can be imported, not {}", path.display()),
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let title = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .trim()
            .to_string();
        let author = self
            .session
            .current_user()
            .map(|user| user.display_name)
            .unwrap_or_default();

        let draft = DocumentDraft {
            title,
            author,
            summary: String::new(),
            genre: genre::classify("", &content),
            content,
        };
        self.drafts.save(DraftSlot::Add, &draft)?;
        info!("Imported {} into the add draft", path.display());
        Ok(draft)
    }

    fn try_export(&self, id: i64, dir: &Path) -> AppResult<PathBuf> {
        let document = self
            .document(id)
            .ok_or_else(|| AppError::Internal(format!("Book {} is not loaded", id)))?;
        let path = dir.join(links::export_file_name(&document.title));
        std::fs::write(&path, document.content.as_bytes())?;
        info!("Exported book {} to {}", id, path.display());
        Ok(path)
    }

    fn try_backup(&self, path: &Path) -> AppResult<usize> {
        let json = serde_json::to_string_pretty(&self.documents)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(self.documents.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryStorage;
    use crate::app::notice::NoticeKind;
    use crate::app::state::Backend;
    use crate::config::Config;
    use crate::testing::{MemoryAuthService, MemoryDocumentStore};
    use book_archive_core::catalog::SortKey;
    use book_archive_core::domain::Role;
    use book_archive_core::genre::{Genre, GenreFilter};
    use book_archive_core::ports::{AuthService, PortError};
    use chrono::Duration;
    use tempfile::TempDir;

    struct Fixture {
        archive: Archive,
        store: Arc<MemoryDocumentStore>,
        auth: Arc<MemoryAuthService>,
    }

    fn config() -> Config {
        Config::from_lookup(|name| match name {
            "PAGE_BUDGET" => Some("20".to_string()),
            _ => None,
        })
        .unwrap()
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryDocumentStore::new());
        let auth = Arc::new(MemoryAuthService::new());
        let storage = Arc::new(MemoryStorage::new());
        let backend = Backend {
            store: store.clone(),
            auth: auth.clone(),
        };
        let context = AppContext::new(config(), Some(backend), storage.clone());
        let session = Arc::new(SessionManager::new(
            Some(auth.clone()),
            storage,
            Some(Duration::minutes(60)),
        ));
        Fixture {
            archive: Archive::new(context, session),
            store,
            auth,
        }
    }

    fn draft(title: &str, genre: Genre) -> DocumentDraft {
        DocumentDraft {
            title: title.into(),
            author: "Writer".into(),
            summary: "About it".into(),
            content: "Words on a page.".into(),
            genre,
        }
    }

    async fn sign_in(fx: &Fixture, role: Role) -> SessionUser {
        let email = format!("{}@example.com", role);
        fx.auth.add_user(&email, "pw", role);
        fx.archive.session().sign_in(&email, "pw").await.unwrap()
    }

    #[tokio::test]
    async fn unconfigured_archive_shows_a_persistent_notice() {
        let storage = Arc::new(MemoryStorage::new());
        let context = AppContext::new(config(), None, storage.clone());
        let session = Arc::new(SessionManager::new(None, storage, None));
        let mut archive = Archive::new(context, session);

        assert_eq!(archive.notices().items()[0].kind, NoticeKind::Unconfigured);
        let notice = archive.refresh().await.unwrap_err();
        assert_eq!(notice.kind, NoticeKind::Unconfigured);
        assert!(archive.documents().is_empty());
        assert!(!archive.dismiss_notice(0));
    }

    #[tokio::test]
    async fn refresh_loads_newest_first_and_keeps_old_list_on_failure() {
        let mut fx = fixture();
        fx.store.seed("Newest", "A", None, "x");
        fx.store.seed("Older", "B", None, "y");

        assert_eq!(fx.archive.refresh().await.unwrap(), 2);
        assert_eq!(fx.archive.documents()[0].title, "Newest");

        fx.store.fail_next(PortError::Unexpected("connection reset".into()));
        let notice = fx.archive.refresh().await.unwrap_err();
        assert_eq!(notice.kind, NoticeKind::Backend);
        assert_eq!(fx.archive.documents().len(), 2);
    }

    #[tokio::test]
    async fn members_are_blocked_before_any_request() {
        let mut fx = fixture();
        sign_in(&fx, Role::Member).await;
        let calls_before = fx.store.call_count();

        let notice = fx.archive.create(&draft("Nope", Genre::Misc)).await.unwrap_err();

        assert_eq!(notice.kind, NoticeKind::Forbidden);
        assert_eq!(fx.store.call_count(), calls_before);
        assert!(fx.archive.documents().is_empty());
    }

    #[tokio::test]
    async fn author_creates_a_tagged_book_owned_by_them() {
        let mut fx = fixture();
        let author = sign_in(&fx, Role::Author).await;
        fx.archive
            .drafts()
            .save(DraftSlot::Add, &draft("Draft", Genre::Misc))
            .unwrap();

        let created = fx.archive.create(&draft("Dragons", Genre::Fantasy)).await.unwrap();

        assert_eq!(created.owner_id, Some(author.id));
        assert_eq!(created.summary.as_deref(), Some("[genre: Fantasy]\n\nAbout it"));
        assert_eq!(created.genre(), Genre::Fantasy);
        assert_eq!(fx.archive.documents()[0].id, created.id);
        assert_eq!(fx.archive.drafts().load(DraftSlot::Add), None);
    }

    #[tokio::test]
    async fn authors_cannot_edit_someone_elses_book() {
        let mut fx = fixture();
        let other = fx.store.seed_owned("Theirs", "X", None, "text", Some(uuid::Uuid::new_v4()));
        sign_in(&fx, Role::Author).await;
        fx.archive.refresh().await.unwrap();

        let notice = fx
            .archive
            .update(other.id, &draft("Mine now", Genre::Misc))
            .await
            .unwrap_err();
        assert_eq!(notice.kind, NoticeKind::Forbidden);
        assert_eq!(fx.archive.document(other.id).unwrap().title, "Theirs");
    }

    #[tokio::test]
    async fn backend_rejection_leaves_state_unchanged() {
        let mut fx = fixture();
        let doc = fx.store.seed("Keep", "A", None, "text");
        sign_in(&fx, Role::Administrator).await;
        fx.archive.refresh().await.unwrap();

        fx.store.fail_next(PortError::Rejected {
            message: "permission denied for table books".into(),
            status: Some(403),
        });
        let notice = fx.archive.delete(doc.id).await.unwrap_err();

        assert_eq!(notice.kind, NoticeKind::SignInRequired);
        assert!(fx.archive.document(doc.id).is_some());
    }

    #[tokio::test]
    async fn admin_updates_and_deletes_any_book() {
        let mut fx = fixture();
        let doc = fx.store.seed("Old title", "A", None, "text");
        sign_in(&fx, Role::Administrator).await;
        fx.archive.refresh().await.unwrap();
        fx.archive
            .drafts()
            .save(DraftSlot::Edit(doc.id), &draft("pending", Genre::Misc))
            .unwrap();

        let updated = fx
            .archive
            .update(doc.id, &draft("New title", Genre::History))
            .await
            .unwrap();
        assert_eq!(updated.title, "New title");
        assert!(updated.updated_at.is_some());
        assert_eq!(fx.archive.document(doc.id).unwrap().genre(), Genre::History);
        assert_eq!(fx.archive.drafts().load(DraftSlot::Edit(doc.id)), None);

        fx.archive.delete(doc.id).await.unwrap();
        assert!(fx.archive.documents().is_empty());
        assert!(fx.store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn expired_session_blocks_writes() {
        let mut fx = fixture();
        sign_in(&fx, Role::Administrator).await;
        let long_ago = chrono::Utc::now() - Duration::hours(3);
        fx.archive
            .context
            .storage
            .set(crate::app::session::SESSION_STARTED_KEY, &long_ago.to_rfc3339())
            .unwrap();

        let notice = fx.archive.create(&draft("Late", Genre::Misc)).await.unwrap_err();
        assert_eq!(notice.kind, NoticeKind::Forbidden);
        assert_eq!(fx.archive.session().current_user(), None);
    }

    #[tokio::test]
    async fn visible_pins_favorites_and_filters() {
        let mut fx = fixture();
        let zeta = fx.store.seed("Zeta", "A", Some("[genre: Fantasy]"), "x");
        let alpha = fx.store.seed("Alpha", "B", Some("[genre: Fantasy]"), "y");
        fx.store.seed("Gamma", "C", Some("[genre: Science]"), "z");
        fx.archive.refresh().await.unwrap();
        assert!(fx.archive.toggle_favorite(zeta.id).unwrap());

        let query = CatalogQuery {
            genre: GenreFilter::Only(Genre::Fantasy),
            sort: SortKey::Title,
            ..Default::default()
        };
        let ids: Vec<i64> = fx.archive.visible(&query).iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![zeta.id, alpha.id]);
    }

    #[tokio::test]
    async fn open_paginates_and_links() {
        let mut fx = fixture();
        let doc = fx.store.seed("Long", "A", None, "first para\n\nsecond para\n\nthird para");

        // Not loaded locally: fetched from the store.
        let (reader, link) = fx.archive.open(doc.id).await.unwrap();
        assert_eq!(reader.page_count(), 3);
        assert_eq!(reader.page(), "first para");
        assert_eq!(link.as_str(), format!("http://localhost:3000/?book={}", doc.id));

        let (again, _) = fx.archive.open_link(&link).await.unwrap().unwrap();
        assert_eq!(again.document_id(), doc.id);
        assert_eq!(fx.archive.closed_link().as_str(), "http://localhost:3000/");

        let missing = fx.archive.open(999).await.unwrap_err();
        assert_eq!(missing.kind, NoticeKind::Backend);
    }

    #[tokio::test]
    async fn import_export_and_backup_use_the_filesystem() {
        let mut fx = fixture();
        let dir = TempDir::new().expect("Failed to create temp dir");

        let source = dir.path().join("Night Train.md");
        std::fs::write(&source, "A mystery unfolds between stations.").unwrap();
        let imported = fx.archive.import_text_file(&source).unwrap();
        assert_eq!(imported.title, "Night Train");
        assert_eq!(imported.genre, Genre::Mystery);
        assert_eq!(fx.archive.drafts().load(DraftSlot::Add), Some(imported));

        let pdf = dir.path().join("scan.pdf");
        std::fs::write(&pdf, "%PDF").unwrap();
        assert_eq!(fx.archive.import_text_file(&pdf).unwrap_err().kind, NoticeKind::Io);

        let doc = fx.store.seed("War: Peace?", "T", None, "raw content\n");
        fx.archive.refresh().await.unwrap();
        let exported = fx.archive.export(doc.id, dir.path()).unwrap();
        assert_eq!(exported.file_name().unwrap(), "War_ Peace_.txt");
        assert_eq!(std::fs::read(&exported).unwrap(), b"raw content\n");

        let backup = dir.path().join("backup.json");
        assert_eq!(fx.archive.backup(&backup).unwrap(), 1);
        let restored: Vec<Document> =
            serde_json::from_str(&std::fs::read_to_string(&backup).unwrap()).unwrap();
        assert_eq!(restored, fx.archive.documents());
    }

    #[tokio::test]
    async fn restore_requires_an_administrator() {
        let mut fx = fixture();
        let dir = TempDir::new().expect("Failed to create temp dir");
        let doc = fx.store.seed("Saved", "A", None, "text");
        fx.archive.refresh().await.unwrap();
        let backup = dir.path().join("backup.json");
        fx.archive.backup(&backup).unwrap();
        fx.archive.delete_locally_for_test(doc.id);

        sign_in(&fx, Role::Author).await;
        assert_eq!(
            fx.archive.restore(&backup).await.unwrap_err().kind,
            NoticeKind::Forbidden
        );

        fx.archive.session().sign_out().await.unwrap();
        sign_in(&fx, Role::Administrator).await;
        assert_eq!(fx.archive.restore(&backup).await.unwrap(), 1);
        assert!(fx.archive.document(doc.id).is_some());
    }

    #[tokio::test]
    async fn failed_session_restore_leaves_local_features_working() {
        let mut fx = fixture();
        fx.auth.fail_next_session(PortError::Unexpected("auth service down".into()));

        assert_eq!(fx.archive.resume_session().await, None);
        assert_eq!(fx.archive.notices().latest().unwrap().kind, NoticeKind::Backend);
        assert_eq!(fx.archive.session().current_user(), None);
        assert!(fx.archive.toggle_favorite(4).unwrap());
    }

    #[tokio::test]
    async fn resume_session_picks_up_an_existing_sign_in() {
        let mut fx = fixture();
        fx.auth.add_user("ada@example.com", "pw", Role::Author);
        fx.auth
            .sign_in_with_password("ada@example.com", "pw")
            .await
            .unwrap();

        let user = fx.archive.resume_session().await.unwrap();
        assert_eq!(user.display_name, "ada");
        assert!(fx.archive.notices().items().is_empty());
    }

    #[tokio::test]
    async fn typed_summary_tag_is_stored_once() {
        let mut fx = fixture();
        sign_in(&fx, Role::Author).await;
        let draft = DocumentDraft::compose(
            "A History of Rome",
            "Livy",
            "[genre: Horror] spooky",
            "plain words",
            None,
        );

        let created = fx.archive.create(&draft).await.unwrap();

        assert_eq!(created.summary.as_deref(), Some("[genre: Horror]\n\nspooky"));
        assert_eq!(created.genre(), Genre::Horror);

        let mut edit = DocumentDraft::from_document(&created);
        edit.set_summary("[genre: Fantasy]\n\nspookier");
        let updated = fx.archive.update(created.id, &edit).await.unwrap();
        assert_eq!(updated.summary.as_deref(), Some("[genre: Fantasy]\n\nspookier"));
        assert_eq!(updated.summary.unwrap().matches("[genre:").count(), 1);
    }

    impl Archive {
        fn delete_locally_for_test(&mut self, id: i64) {
            self.documents.retain(|doc| doc.id != id);
        }
    }
}
