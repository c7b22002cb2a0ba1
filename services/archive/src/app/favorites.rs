//! services/archive/src/app/favorites.rs
//!
//! The client-local favorite set. It never reaches the backend: it is read
//! once from storage and written back after every toggle.

use book_archive_core::ports::{KeyValueStorage, StorageError, StorageResult};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

pub const FAVORITES_KEY: &str = "favorites";

pub struct Favorites {
    storage: Arc<dyn KeyValueStorage>,
    ids: HashSet<i64>,
}

impl Favorites {
    /// Loads the set. Missing or malformed data gives an empty set.
    pub fn load(storage: Arc<dyn KeyValueStorage>) -> Self {
        let ids = match storage.get(FAVORITES_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<Vec<i64>>(&raw)
                .map(|ids| ids.into_iter().collect())
                .unwrap_or_else(|e| {
                    warn!("Ignoring malformed favorites '{}': {}", raw, e);
                    HashSet::new()
                }),
            Ok(None) => HashSet::new(),
            Err(e) => {
                warn!("Could not read favorites: {}", e);
                HashSet::new()
            }
        };
        Self { storage, ids }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> &HashSet<i64> {
        &self.ids
    }

    /// Flips `id` and persists. Returns whether it is now a favorite. On a
    /// storage failure the set is left as it was.
    pub fn toggle(&mut self, id: i64) -> StorageResult<bool> {
        let now_favorite = if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        };

        if let Err(e) = self.persist() {
            if now_favorite {
                self.ids.remove(&id);
            } else {
                self.ids.insert(id);
            }
            return Err(e);
        }
        Ok(now_favorite)
    }

    fn persist(&self) -> StorageResult<()> {
        let mut ids: Vec<i64> = self.ids.iter().copied().collect();
        ids.sort_unstable();
        let json = serde_json::to_string(&ids).map_err(|e| StorageError::Malformed(e.to_string()))?;
        self.storage.set(FAVORITES_KEY, &json)
    }
}
