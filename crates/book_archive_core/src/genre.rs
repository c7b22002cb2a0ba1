//! crates/book_archive_core/src/genre.rs
//!
//! Genre derivation for documents. A genre is never stored as a column: it is
//! read from an inline `[genre: <name>]` tag when one is present, otherwise
//! guessed from keywords, otherwise the catch-all `Misc`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// The fixed set of categories a document can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Genre {
    Adventure,
    Fantasy,
    History,
    Science,
    Mystery,
    Horror,
    Poetry,
    Biography,
    #[default]
    Misc,
}

impl Genre {
    pub const ALL: [Genre; 9] = [
        Genre::Adventure,
        Genre::Fantasy,
        Genre::History,
        Genre::Science,
        Genre::Mystery,
        Genre::Horror,
        Genre::Poetry,
        Genre::Biography,
        Genre::Misc,
    ];

    /// The catch-all category; tagging with it writes nothing.
    pub const DEFAULT: Genre = Genre::Misc;

    pub fn name(&self) -> &'static str {
        match self {
            Genre::Adventure => "Adventure",
            Genre::Fantasy => "Fantasy",
            Genre::History => "History",
            Genre::Science => "Science",
            Genre::Mystery => "Mystery",
            Genre::Horror => "Horror",
            Genre::Poetry => "Poetry",
            Genre::Biography => "Biography",
            Genre::Misc => "Misc",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Genre> {
        let name = name.trim();
        Genre::ALL
            .into_iter()
            .find(|genre| genre.name().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for Genre {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A genre selection in the browse view. `All` is a wildcard and is never
/// produced by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenreFilter {
    #[default]
    All,
    Only(Genre),
}

impl GenreFilter {
    pub fn matches(&self, genre: Genre) -> bool {
        match self {
            GenreFilter::All => true,
            GenreFilter::Only(wanted) => *wanted == genre,
        }
    }

    /// Parses `"all"` or a genre name.
    pub fn from_name(name: &str) -> Option<GenreFilter> {
        if name.trim().eq_ignore_ascii_case("all") {
            return Some(GenreFilter::All);
        }
        Genre::from_name(name).map(GenreFilter::Only)
    }
}

// Keyword groups in priority order. Misc is the fallback and has none.
const KEYWORDS: [(Genre, &[&str]); 8] = [
    (Genre::Adventure, &["adventure"]),
    (Genre::Fantasy, &["fantasy"]),
    (Genre::History, &["history"]),
    (Genre::Science, &["science"]),
    (Genre::Mystery, &["mystery"]),
    (Genre::Horror, &["horror"]),
    (Genre::Poetry, &["poem", "poetry"]),
    (Genre::Biography, &["biography", "memoir"]),
];

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\[genre:\s*([a-z]+)\s*\]").expect("genre tag pattern is valid")
    })
}

fn strip_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\[genre:\s*([a-z]+)\s*\](?:[ \t]*\r?\n){0,2}")
            .expect("genre strip pattern is valid")
    })
}

/// Reads the first `[genre: ...]` tag in `text`. Only one tag is considered;
/// an unknown name yields `None`.
pub fn extract_tag(text: &str) -> Option<Genre> {
    let captures = tag_pattern().captures(text)?;
    Genre::from_name(captures.get(1)?.as_str())
}

/// Derives the genre of a document: summary tag, then content tag, then the
/// first keyword group found in either text, then `Misc`.
pub fn classify(summary: &str, content: &str) -> Genre {
    if let Some(genre) = extract_tag(summary).or_else(|| extract_tag(content)) {
        return genre;
    }

    let haystack = format!("{summary} {content}").to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|word| haystack.contains(word)))
        .map(|(genre, _)| *genre)
        .unwrap_or(Genre::DEFAULT)
}

/// Removes the first recognised tag, and the blank line right after it, then
/// trims trailing whitespace.
pub fn strip_tag(text: &str) -> String {
    let found = strip_pattern().captures_iter(text).find(|captures| {
        captures
            .get(1)
            .is_some_and(|name| Genre::from_name(name.as_str()).is_some())
    });

    let stripped = match found.and_then(|captures| captures.get(0)) {
        Some(tag) => format!("{}{}", &text[..tag.start()], &text[tag.end()..]),
        None => text.to_string(),
    };
    stripped.trim_end().to_string()
}

/// Prefixes `summary` with a tag for `genre`. `Misc` writes no tag.
pub fn apply_tag(summary: &str, genre: Genre) -> String {
    let body = summary.trim_end();
    if genre == Genre::DEFAULT {
        return body.to_string();
    }
    if body.is_empty() {
        format!("[genre: {}]", genre.name())
    } else {
        format!("[genre: {}]\n\n{}", genre.name(), body)
    }
}
