//! services/archive/src/app/search.rs
//!
//! The search box: keystrokes go in immediately, the settled query comes out
//! after `SEARCH_DEBOUNCE` of quiet.

use book_archive_core::catalog::SEARCH_DEBOUNCE;
use tokio::sync::watch;

use crate::app::debounce::Debouncer;

pub struct SearchInput {
    debouncer: Debouncer<String>,
    settled: watch::Receiver<String>,
}

impl SearchInput {
    pub fn new() -> Self {
        let (sender, settled) = watch::channel(String::new());
        let debouncer = Debouncer::spawn(SEARCH_DEBOUNCE, move |query: String| {
            sender.send_if_modified(|current| {
                if *current == query {
                    false
                } else {
                    *current = query;
                    true
                }
            });
        });
        Self { debouncer, settled }
    }

    pub fn type_text(&self, text: impl Into<String>) {
        self.debouncer.push(text.into());
    }

    /// The query the catalog should currently filter by.
    pub fn settled(&self) -> String {
        self.settled.borrow().clone()
    }

    /// Waits until the settled query changes.
    pub async fn changed(&mut self) -> Option<String> {
        self.settled.changed().await.ok()?;
        Some(self.settled.borrow_and_update().clone())
    }
}

impl Default for SearchInput {
    fn default() -> Self {
        Self::new()
    }
}
