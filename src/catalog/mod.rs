//! Version catalog and chapter content cache.
//!
//! The catalog is the only path from the reader to the content provider:
//! every chapter request goes through the cache, every provider call is
//! bounded by the configured timeout, and version listing never fails.

mod cache;

pub use cache::ContentCache;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::app::{FetchError, Result};
use crate::config::ProviderConfig;
use crate::domain::version::fallback_versions;
use crate::domain::{ChapterContent, ChapterKey, VersionDescriptor};
use crate::provider::{ProviderResult, SharedProvider};
use crate::store::SharedProgressStore;

pub struct VersionCatalog {
    provider: SharedProvider,
    preferences: SharedProgressStore,
    cache: ContentCache,
    timeout: Duration,
}

impl VersionCatalog {
    pub fn new(provider: SharedProvider, preferences: SharedProgressStore, config: &ProviderConfig) -> Self {
        Self {
            provider,
            preferences,
            cache: ContentCache::new(),
            timeout: config.timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Versions available for `language`, with `is_default` set.
    ///
    /// Falls back to a built-in list when the provider fails or has nothing
    /// for the language, so there is always a selectable version.
    pub async fn list_versions(&self, language: &str) -> Vec<VersionDescriptor> {
        let fetched = tokio::time::timeout(self.timeout, self.provider.fetch_versions(language))
            .await
            .unwrap_or_else(|_| Err(FetchError::timeout(self.timeout)));

        let mut versions = match fetched {
            Ok(versions) if !versions.is_empty() => versions,
            Ok(_) => {
                warn!("Provider has no versions for {:?}; using fallback list", language);
                fallback_versions(language)
            }
            Err(e) => {
                warn!("Failed to list versions for {:?}: {}; using fallback list", language, e);
                fallback_versions(language)
            }
        };

        let default_id = self.stored_default();
        for v in &mut versions {
            v.is_default = default_id.as_deref() == Some(v.id.as_str());
        }
        versions
    }

    /// The persisted default version id, if one was chosen.
    pub fn default_version_id(&self) -> Result<Option<String>> {
        self.preferences.default_version()
    }

    pub fn set_default_version(&self, version_id: &str) -> Result<()> {
        self.preferences.set_default_version(version_id)?;
        info!("Default version set to {}", version_id);
        Ok(())
    }

    /// Resolve the version to open with: the stored default if it is listed,
    /// otherwise `preferred`, otherwise the first listed version.
    pub async fn default_version(&self, language: &str, preferred: &str) -> VersionDescriptor {
        let versions = self.list_versions(language).await;

        if let Some(v) = versions.iter().find(|v| v.is_default) {
            return v.clone();
        }
        if let Some(id) = self.stored_default() {
            // Chosen under another language; still honour it.
            return self.describe(&id, language, &versions, true);
        }
        if let Some(v) = versions.iter().find(|v| v.id == preferred) {
            return v.clone();
        }
        versions
            .into_iter()
            .next()
            .unwrap_or_else(|| VersionDescriptor::new(preferred, preferred, preferred, language))
    }

    /// Find a version by id in the listing for `language`.
    pub async fn find_version(&self, language: &str, version_id: &str) -> Option<VersionDescriptor> {
        self.list_versions(language)
            .await
            .into_iter()
            .find(|v| v.id.eq_ignore_ascii_case(version_id))
    }

    /// Chapter content from the cache, fetching it on a miss.
    pub async fn chapter(
        &self,
        version_id: &str,
        book: &str,
        chapter: u16,
    ) -> ProviderResult<Arc<ChapterContent>> {
        let key = ChapterKey::new(version_id, book, chapter);
        if let Some(content) = self.cache.get(&key) {
            debug!("Cache hit for {} {} ({})", key.book, key.chapter, key.version_id);
            return Ok(content);
        }

        let mut content = tokio::time::timeout(
            self.timeout,
            self.provider.fetch_chapter(version_id, &key.book, chapter),
        )
        .await
        .map_err(|_| FetchError::timeout(self.timeout))??;

        // Key the entry by what was asked for, whatever casing the provider used.
        content.version_id = key.version_id;
        content.book = key.book;
        content.chapter = key.chapter;
        Ok(self.cache.insert(content))
    }

    /// Warm the cache for several chapters concurrently. Returns how many are
    /// now cached; failures are only logged.
    pub async fn prefetch(&self, keys: Vec<ChapterKey>) -> usize {
        let missing: Vec<ChapterKey> = keys.into_iter().filter(|k| !self.cache.contains(k)).collect();
        let fetches = missing
            .iter()
            .map(|k| self.chapter(&k.version_id, &k.book, k.chapter));

        let mut loaded = 0;
        for (key, result) in missing.iter().zip(join_all(fetches).await) {
            match result {
                Ok(_) => loaded += 1,
                Err(e) => debug!("Prefetch of {} {} failed: {}", key.book, key.chapter, e),
            }
        }
        loaded
    }

    /// Drop cached chapters of a version that is no longer active.
    pub fn invalidate_version(&self, version_id: &str) -> usize {
        let removed = self.cache.invalidate_version(version_id);
        debug!("Invalidated {} cached chapters of {}", removed, version_id);
        removed
    }

    fn stored_default(&self) -> Option<String> {
        match self.preferences.default_version() {
            Ok(id) => id,
            Err(e) => {
                warn!("Failed to read default version: {}", e);
                None
            }
        }
    }

    fn describe(
        &self,
        version_id: &str,
        language: &str,
        listed: &[VersionDescriptor],
        is_default: bool,
    ) -> VersionDescriptor {
        let mut descriptor = listed
            .iter()
            .chain(fallback_versions(language).iter())
            .find(|v| v.id == version_id)
            .cloned()
            .unwrap_or_else(|| {
                VersionDescriptor::new(version_id, version_id, &version_id.to_uppercase(), language)
            });
        descriptor.is_default = is_default;
        descriptor
    }
}
