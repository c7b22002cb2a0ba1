//! crates/book_archive_core/src/links.rs
//!
//! Shareable links and export file names.

use url::Url;

/// Query parameter that carries the open document's id.
pub const DOCUMENT_PARAM: &str = "book";

/// The document id encoded in `url`, if any. Non-numeric values are ignored.
pub fn document_id_from_url(url: &Url) -> Option<i64> {
    url.query_pairs()
        .find(|(key, _)| key == DOCUMENT_PARAM)
        .and_then(|(_, value)| value.trim().parse().ok())
}

/// `url` with the document parameter set to `id`, other parameters untouched.
pub fn with_document(url: &Url, id: i64) -> Url {
    let mut link = without_document(url);
    link.query_pairs_mut()
        .append_pair(DOCUMENT_PARAM, &id.to_string());
    link
}

/// `url` with the document parameter removed.
pub fn without_document(url: &Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != DOCUMENT_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut link = url.clone();
    if kept.is_empty() {
        link.set_query(None);
    } else {
        link.query_pairs_mut().clear().extend_pairs(kept);
    }
    link
}

/// File name for a plain-text export of a book titled `title`.
pub fn export_file_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "book.txt".to_string()
    } else {
        format!("{cleaned}.txt")
    }
}
