//! crates/book_archive_core/src/permissions.rs
//!
//! Client-side write permissions. These checks run before any request is
//! issued; the backing store still enforces its own row-level rules.

use crate::domain::{Document, Role, SessionUser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Edit,
    Delete,
    Restore,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = match self {
            Action::Create => "add books",
            Action::Edit => "edit this book",
            Action::Delete => "delete this book",
            Action::Restore => "restore a backup",
        };
        f.write_str(verb)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionDenied {
    #[error("Sign in to {0}")]
    SignedOut(Action),
    #[error("Your role ({role}) is not allowed to {action}")]
    Role { role: Role, action: Action },
    #[error("Only the author who added this book can {0}")]
    NotOwner(Action),
}

fn owns(user: &SessionUser, document: &Document) -> bool {
    document.owner_id == Some(user.id)
}

pub fn can_create(user: Option<&SessionUser>) -> bool {
    authorize(Action::Create, user, None).is_ok()
}

pub fn can_edit(user: Option<&SessionUser>, document: &Document) -> bool {
    authorize(Action::Edit, user, Some(document)).is_ok()
}

pub fn can_delete(user: Option<&SessionUser>, document: &Document) -> bool {
    authorize(Action::Delete, user, Some(document)).is_ok()
}

/// Administrators may do anything. Authors may create, and edit or delete
/// their own books. Members and signed-out visitors are read-only.
pub fn authorize(
    action: Action,
    user: Option<&SessionUser>,
    document: Option<&Document>,
) -> Result<(), PermissionDenied> {
    let user = user.ok_or(PermissionDenied::SignedOut(action))?;

    match (user.role, action) {
        (Role::Administrator, _) => Ok(()),
        (Role::Author, Action::Create) => Ok(()),
        (Role::Author, Action::Edit | Action::Delete) => match document {
            Some(document) if owns(user, document) => Ok(()),
            _ => Err(PermissionDenied::NotOwner(action)),
        },
        (role, action) => Err(PermissionDenied::Role { role, action }),
    }
}
