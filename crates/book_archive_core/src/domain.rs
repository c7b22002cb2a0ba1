//! crates/book_archive_core/src/domain.rs
//!
//! Defines the pure, core data structures for the archive.
//! These structs are independent of any database or storage format; the
//! serde derives only exist so drafts and backups can be written locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::genre::{self, Genre};

//=========================================================================================
// Documents
//=========================================================================================

/// A stored book. The identifier is generated by the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub author: String,
    /// Free text; may start with a `[genre: ...]` tag.
    pub summary: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub owner_id: Option<Uuid>,
}

impl Document {
    /// The document's genre, derived on demand and never stored.
    pub fn genre(&self) -> Genre {
        genre::classify(self.summary.as_deref().unwrap_or(""), &self.content)
    }
}

/// The column values written when a document is created or updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub title: String,
    pub author: String,
    pub summary: Option<String>,
    pub content: String,
}

/// The editable form of a document, also used for autosaved drafts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentDraft {
    pub title: String,
    pub author: String,
    /// Summary without any genre tag; the tag is derived from `genre`.
    pub summary: String,
    pub content: String,
    pub genre: Genre,
}

impl DocumentDraft {
    /// Loads an existing document into the editor, pulling its tag out of the summary.
    pub fn from_document(document: &Document) -> Self {
        let summary = document.summary.as_deref().unwrap_or("");
        Self {
            title: document.title.clone(),
            author: document.author.clone(),
            summary: genre::strip_tag(summary),
            content: document.content.clone(),
            genre: document.genre(),
        }
    }

    /// Builds a draft from fields typed by the user. A tag typed into the
    /// summary is lifted out of it; an explicit `genre` overrides that tag,
    /// and without either the summary and content are classified.
    pub fn compose(
        title: impl Into<String>,
        author: impl Into<String>,
        summary: &str,
        content: impl Into<String>,
        genre: Option<Genre>,
    ) -> Self {
        let content = content.into();
        let genre = genre.unwrap_or_else(|| genre::classify(summary, &content));
        Self {
            title: title.into(),
            author: author.into(),
            summary: untagged(summary),
            content,
            genre,
        }
    }

    /// Replaces the summary. A tag in the new text becomes the draft's genre.
    pub fn set_summary(&mut self, summary: &str) {
        if let Some(tagged) = genre::extract_tag(summary) {
            self.genre = tagged;
        }
        self.summary = untagged(summary);
    }

    /// Builds the row to persist. An empty summary with no tag is stored as `None`.
    pub fn to_new_document(&self) -> NewDocument {
        let summary = genre::apply_tag(&self.summary, self.genre);
        NewDocument {
            title: self.title.trim().to_string(),
            author: self.author.trim().to_string(),
            summary: if summary.is_empty() { None } else { Some(summary) },
            content: self.content.clone(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty()
            && self.author.trim().is_empty()
            && self.summary.trim().is_empty()
            && self.content.trim().is_empty()
    }
}

fn untagged(summary: &str) -> String {
    genre::strip_tag(summary).trim_start().to_string()
}

//=========================================================================================
// Users and Sessions
//=========================================================================================

/// Governs write and delete permission on documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Administrator,
    Author,
    Member,
}

impl Role {
    /// Parses a stored role name. Unknown names fall back to `Member`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "admin" | "administrator" => Role::Administrator,
            "author" => Role::Author,
            _ => Role::Member,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::Author => "author",
            Role::Member => "member",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The signed-in user as seen by the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
}

impl SessionUser {
    pub fn new(id: Uuid, email: impl Into<String>, role: Role) -> Self {
        let email = email.into();
        let display_name = display_name_from_email(&email);
        Self {
            id,
            email,
            display_name,
            role,
        }
    }
}

/// A session handed out by the authentication service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub id: String,
    pub user: SessionUser,
    pub issued_at: DateTime<Utc>,
}

/// `ada@example.com` becomes `ada`; text without an `@` is used as-is.
pub fn display_name_from_email(email: &str) -> String {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, _)) if !local.is_empty() => local.to_string(),
        _ => email.to_string(),
    }
}
