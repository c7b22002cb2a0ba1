//! services/archive/src/app/notice.rs
//!
//! User-facing notices. Every failure in the view-model ends up here instead
//! of propagating; the previous state is kept.

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// The backing store is not configured. Never dismissed.
    Unconfigured,
    /// Blocked client-side by the permission rules.
    Forbidden,
    /// The backend answered 403.
    SignInRequired,
    /// Any other backend or storage failure.
    Backend,
    /// File or clipboard access failed.
    Io,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_dismissible(&self) -> bool {
        self.kind != NoticeKind::Unconfigured
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<&AppError> for Notice {
    fn from(error: &AppError) -> Self {
        match error {
            AppError::Unconfigured => Notice::new(NoticeKind::Unconfigured, error.to_string()),
            AppError::Permission(denied) => Notice::new(NoticeKind::Forbidden, denied.to_string()),
            AppError::Port(port) if port.requires_sign_in() => Notice::new(
                NoticeKind::SignInRequired,
                "You must sign in to do that.",
            ),
            AppError::Port(port) => Notice::new(NoticeKind::Backend, port.to_string()),
            AppError::Io(io) => Notice::new(NoticeKind::Io, io.to_string()),
            other => Notice::new(NoticeKind::Backend, other.to_string()),
        }
    }
}

/// The notices currently on screen.
#[derive(Debug, Default)]
pub struct Notices {
    items: Vec<Notice>,
}

impl Notices {
    pub fn push(&mut self, notice: Notice) {
        if !self.items.contains(&notice) {
            self.items.push(notice);
        }
    }

    /// Removes the notice at `index` unless it is persistent.
    pub fn dismiss(&mut self, index: usize) -> bool {
        match self.items.get(index) {
            Some(notice) if notice.is_dismissible() => {
                self.items.remove(index);
                true
            }
            _ => false,
        }
    }

    pub fn items(&self) -> &[Notice] {
        &self.items
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.items.last()
    }
}
