use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::{ChapterContent, ChapterKey};

/// Chapter content keyed by `(version, book, chapter)`.
///
/// Entries never expire; they are dropped only by [`ContentCache::invalidate_version`]
/// or [`ContentCache::clear`].
#[derive(Default)]
pub struct ContentCache {
    entries: RwLock<HashMap<ChapterKey, Arc<ChapterContent>>>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ChapterKey) -> Option<Arc<ChapterContent>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Insert content, returning the shared handle. If another fetch for the
    /// same key already landed, the existing entry is kept.
    pub fn insert(&self, content: ChapterContent) -> Arc<ChapterContent> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(content.key())
            .or_insert_with(|| Arc::new(content))
            .clone()
    }

    pub fn contains(&self, key: &ChapterKey) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Drop every entry for one version. Returns the number removed.
    pub fn invalidate_version(&self, version_id: &str) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|key, _| key.version_id != version_id);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
