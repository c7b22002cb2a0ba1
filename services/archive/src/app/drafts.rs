//! services/archive/src/app/drafts.rs
//!
//! Autosaved drafts for the add and edit forms, kept in local storage so an
//! interrupted edit survives a restart.

use book_archive_core::domain::DocumentDraft;
use book_archive_core::ports::{KeyValueStorage, StorageError, StorageResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::app::debounce::Debouncer;

/// Quiet period before a draft is autosaved.
pub const AUTOSAVE_DEBOUNCE: Duration = Duration::from_millis(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftSlot {
    Add,
    Edit(i64),
}

impl DraftSlot {
    pub fn key(&self) -> String {
        match self {
            DraftSlot::Add => "draft:add".to_string(),
            DraftSlot::Edit(id) => format!("draft:edit:{id}"),
        }
    }
}

#[derive(Clone)]
pub struct Drafts {
    storage: Arc<dyn KeyValueStorage>,
}

impl Drafts {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    pub fn save(&self, slot: DraftSlot, draft: &DocumentDraft) -> StorageResult<()> {
        let json =
            serde_json::to_string(draft).map_err(|e| StorageError::Malformed(e.to_string()))?;
        self.storage.set(&slot.key(), &json)
    }

    /// The saved draft, if any. A draft that no longer parses is discarded.
    pub fn load(&self, slot: DraftSlot) -> Option<DocumentDraft> {
        let raw = match self.storage.get(&slot.key()) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("Could not read draft {}: {}", slot.key(), e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(draft) => Some(draft),
            Err(e) => {
                warn!("Discarding unreadable draft {}: {}", slot.key(), e);
                let _ = self.storage.remove(&slot.key());
                None
            }
        }
    }

    pub fn clear(&self, slot: DraftSlot) -> StorageResult<()> {
        self.storage.remove(&slot.key())
    }

    /// A debouncer that saves the last draft pushed once typing pauses.
    pub fn autosaver(&self, slot: DraftSlot) -> Debouncer<DocumentDraft> {
        let drafts = self.clone();
        Debouncer::spawn(AUTOSAVE_DEBOUNCE, move |draft: DocumentDraft| {
            if draft.is_blank() {
                return;
            }
            match drafts.save(slot, &draft) {
                Ok(()) => debug!("Autosaved {}", slot.key()),
                Err(e) => warn!("Autosave of {} failed: {}", slot.key(), e),
            }
        })
    }
}
