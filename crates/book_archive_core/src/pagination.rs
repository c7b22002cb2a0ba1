//! crates/book_archive_core/src/pagination.rs
//!
//! Splits a document's content into pages for the reader. Page sizes are
//! budgets in characters (not bytes), so multi-byte text is never cut inside
//! a code point.

use regex::Regex;
use std::sync::OnceLock;

/// Budget used by the paragraph-aware reader.
pub const DEFAULT_PAGE_BUDGET: usize = 1400;

/// Budget of the older fixed-width reader.
pub const LEGACY_PAGE_BUDGET: usize = 900;

/// Which pagination algorithm the reader uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaginationMode {
    /// Greedy paragraph packing, falling back to words for long paragraphs.
    #[default]
    Paragraphs,
    /// Consecutive slices of exactly `budget` characters. Compatibility only.
    FixedWidth,
}

impl PaginationMode {
    pub fn paginate(self, content: &str, budget: usize) -> Vec<String> {
        match self {
            PaginationMode::Paragraphs => paginate(content, budget),
            PaginationMode::FixedWidth => slice_fixed(content, budget),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "paragraphs" | "paragraph" => Some(PaginationMode::Paragraphs),
            "fixed" | "fixed-width" => Some(PaginationMode::FixedWidth),
            _ => None,
        }
    }
}

fn paragraph_break() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n\s*\n").expect("paragraph break pattern is valid"))
}

/// Accumulates pieces into pages without exceeding the budget.
struct PageBuilder {
    budget: usize,
    pages: Vec<String>,
    current: String,
    current_len: usize,
}

impl PageBuilder {
    fn new(budget: usize) -> Self {
        Self {
            budget,
            pages: Vec::new(),
            current: String::new(),
            current_len: 0,
        }
    }

    /// Appends `piece` joined by `separator`, closing the page first if the
    /// piece would not fit.
    fn push(&mut self, piece: &str, separator: &str) {
        let piece_len = piece.chars().count();
        let joined_len = if self.current.is_empty() {
            piece_len
        } else {
            self.current_len + separator.chars().count() + piece_len
        };

        if joined_len <= self.budget {
            if !self.current.is_empty() {
                self.current.push_str(separator);
            }
            self.current.push_str(piece);
            self.current_len = joined_len;
            return;
        }

        self.flush();
        self.current.push_str(piece);
        self.current_len = piece_len;
        if piece_len > self.budget {
            // An oversized word is a page of its own.
            self.flush();
        }
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.pages.push(std::mem::take(&mut self.current));
            self.current_len = 0;
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        if self.pages.is_empty() {
            self.pages.push(String::new());
        }
        self.pages
    }
}

/// Paragraph-aware pagination.
///
/// Paragraphs (separated by a blank line) are packed greedily, joined with a
/// blank line. A paragraph longer than the budget starts a fresh page and is
/// packed word by word, joined with single spaces; a single word longer than
/// the budget becomes its own page. Empty content gives one empty page.
pub fn paginate(content: &str, budget: usize) -> Vec<String> {
    let budget = budget.max(1);
    let mut builder = PageBuilder::new(budget);

    for paragraph in paragraph_break().split(content) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        if paragraph.chars().count() <= budget {
            builder.push(paragraph, "\n\n");
            continue;
        }

        builder.flush();
        for word in paragraph.split_whitespace() {
            builder.push(word, " ");
        }
    }

    builder.finish()
}

/// Fixed-width slicing: every page but the last is exactly `budget`
/// characters. Concatenating the pages gives back `content` unchanged.
pub fn slice_fixed(content: &str, budget: usize) -> Vec<String> {
    let budget = budget.max(1);
    let chars: Vec<char> = content.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(budget)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
