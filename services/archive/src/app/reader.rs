//! services/archive/src/app/reader.rs
//!
//! The reader view: one open document, its pages and the current position.
//! Pages are computed fresh each time a document is opened.

use book_archive_core::domain::Document;
use book_archive_core::pagination::PaginationMode;
use book_archive_core::ports::{KeyValueStorage, StorageResult};
use std::sync::Arc;
use tracing::{debug, warn};

pub const FONT_SIZE_KEY: &str = "reader-font-size";
pub const DEFAULT_FONT_SIZE: u8 = 18;
pub const MIN_FONT_SIZE: u8 = 12;
pub const MAX_FONT_SIZE: u8 = 32;
const FONT_STEP: u8 = 2;

pub struct Reader {
    document_id: i64,
    title: String,
    pages: Vec<String>,
    index: usize,
    font_size: u8,
    mode: PaginationMode,
    storage: Arc<dyn KeyValueStorage>,
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("document_id", &self.document_id)
            .field("title", &self.title)
            .field("page", &self.index)
            .field("page_count", &self.pages.len())
            .field("font_size", &self.font_size)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Reader {
    pub fn open(
        document: &Document,
        mode: PaginationMode,
        budget: usize,
        storage: Arc<dyn KeyValueStorage>,
    ) -> Self {
        let pages = mode.paginate(&document.content, budget);
        debug!(
            "Opened book {} in {:?} mode: {} pages of at most {} chars",
            document.id,
            mode,
            pages.len(),
            budget
        );
        let font_size = stored_font_size(storage.as_ref());
        Self {
            document_id: document.id,
            title: document.title.clone(),
            pages,
            index: 0,
            font_size,
            mode,
            storage,
        }
    }

    pub fn document_id(&self) -> i64 {
        self.document_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn mode(&self) -> PaginationMode {
        self.mode
    }

    pub fn page(&self) -> &str {
        &self.pages[self.index]
    }

    pub fn page_index(&self) -> usize {
        self.index
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn next(&mut self) -> bool {
        if self.index + 1 < self.pages.len() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    pub fn previous(&mut self) -> bool {
        if self.index > 0 {
            self.index -= 1;
            true
        } else {
            false
        }
    }

    /// Jumps to a 0-based page, clamped to the last page.
    pub fn go_to(&mut self, page: usize) {
        self.index = page.min(self.pages.len() - 1);
    }

    pub fn font_size(&self) -> u8 {
        self.font_size
    }

    pub fn larger(&mut self) -> StorageResult<u8> {
        self.set_font_size(self.font_size.saturating_add(FONT_STEP))
    }

    pub fn smaller(&mut self) -> StorageResult<u8> {
        self.set_font_size(self.font_size.saturating_sub(FONT_STEP))
    }

    fn set_font_size(&mut self, size: u8) -> StorageResult<u8> {
        let size = size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
        self.storage.set(FONT_SIZE_KEY, &size.to_string())?;
        self.font_size = size;
        Ok(size)
    }
}

fn stored_font_size(storage: &dyn KeyValueStorage) -> u8 {
    match storage.get(FONT_SIZE_KEY) {
        Ok(Some(raw)) => raw
            .trim()
            .parse::<u8>()
            .map(|size| size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE))
            .unwrap_or(DEFAULT_FONT_SIZE),
        Ok(None) => DEFAULT_FONT_SIZE,
        Err(e) => {
            warn!("Could not read font size: {}", e);
            DEFAULT_FONT_SIZE
        }
    }
}
