use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::store::SharedHistoryStore;

pub const HISTORY_LIMIT: usize = 15;

/// Submitted queries, most recent first.
///
/// Entries are deduplicated by exact string match and capped at
/// [`HISTORY_LIMIT`]. Every change is written through to the store; a failed
/// write is logged and the in-memory list is kept.
pub struct SearchHistory {
    entries: Mutex<Vec<String>>,
    store: Option<SharedHistoryStore>,
}

impl SearchHistory {
    pub fn load(store: SharedHistoryStore) -> Self {
        let mut entries = store.load_history().unwrap_or_else(|e| {
            warn!("Failed to load search history: {}", e);
            Vec::new()
        });
        normalize(&mut entries);
        Self {
            entries: Mutex::new(entries),
            store: Some(store),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            store: None,
        }
    }

    /// Put `query` at the front. Blank queries are ignored.
    pub fn record(&self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }
        let mut entries = self.lock();
        entries.retain(|e| e != query);
        entries.insert(0, query.to_string());
        entries.truncate(HISTORY_LIMIT);
        self.persist(&entries);
    }

    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.clear();
        self.persist(&entries);
    }

    fn persist(&self, entries: &[String]) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save_history(entries) {
                warn!("Failed to save search history: {}", e);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drop duplicates and blanks from a stored list, keeping the first occurrence.
fn normalize(entries: &mut Vec<String>) {
    let mut seen = Vec::with_capacity(entries.len());
    entries.retain(|e| {
        let keep = !e.trim().is_empty() && !seen.contains(e);
        if keep {
            seen.push(e.clone());
        }
        keep
    });
    entries.truncate(HISTORY_LIMIT);
}
