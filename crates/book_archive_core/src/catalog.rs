//! crates/book_archive_core/src/catalog.rs
//!
//! The browse pipeline: filters the in-memory collection by favorites, genre
//! and free text, sorts it, and pins favorites to the top.

use std::collections::HashSet;
use std::time::Duration;

use crate::domain::Document;
use crate::genre::GenreFilter;

/// Delay applied to the search box before the pipeline reruns.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Newest first.
    #[default]
    Recent,
    Title,
    Author,
}

impl SortKey {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "recent" | "recency" | "newest" => Some(SortKey::Recent),
            "title" => Some(SortKey::Title),
            "author" => Some(SortKey::Author),
            _ => None,
        }
    }
}

/// Everything the browse view lets the user pick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    pub text: String,
    pub genre: GenreFilter,
    pub favorites_only: bool,
    pub sort: SortKey,
}

impl CatalogQuery {
    fn matches_text(&self, document: &Document) -> bool {
        let needle = self.text.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        let haystack = format!(
            "{} {} {} {}",
            document.title,
            document.author,
            document.summary.as_deref().unwrap_or(""),
            document.content
        )
        .to_lowercase();
        haystack.contains(&needle)
    }
}

/// Produces the ordered display list for `query`.
pub fn arrange<'a>(
    documents: &'a [Document],
    favorites: &HashSet<i64>,
    query: &CatalogQuery,
) -> Vec<&'a Document> {
    let mut visible: Vec<&Document> = documents
        .iter()
        .filter(|doc| !query.favorites_only || favorites.contains(&doc.id))
        .filter(|doc| query.genre.matches(doc.genre()))
        .filter(|doc| query.matches_text(doc))
        .collect();

    match query.sort {
        SortKey::Recent => visible.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortKey::Title => visible.sort_by_cached_key(|doc| doc.title.to_lowercase()),
        SortKey::Author => visible.sort_by_cached_key(|doc| doc.author.to_lowercase()),
    }

    // Stable partition: favorites first, each half keeps the order above.
    visible.sort_by_key(|doc| !favorites.contains(&doc.id));
    visible
}
