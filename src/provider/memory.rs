//! In-memory content provider.
//!
//! Holds chapters and versions in maps, can synthesize text for any canon
//! chapter, and lets callers inject failures and latency. Backs the test
//! suite through [`AppContext::in_memory`](crate::app::AppContext::in_memory).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::app::FetchError;
use crate::domain::{
    canon, ChapterContent, ChapterKey, MatchKind, SearchResult, Verse, VersionDescriptor,
};
use crate::normalizer::fold_query;
use crate::provider::{ContentProvider, ProviderResult};

#[derive(Default)]
pub struct MemoryProvider {
    chapters: RwLock<HashMap<ChapterKey, ChapterContent>>,
    versions: RwLock<Vec<VersionDescriptor>>,
    synthetic_versions: RwLock<Vec<String>>,
    chapter_failures: Mutex<VecDeque<FetchError>>,
    version_failures: RwLock<HashMap<String, FetchError>>,
    catalog_failure: RwLock<Option<FetchError>>,
    search_failure: RwLock<Option<FetchError>>,
    delays: RwLock<HashMap<(String, u16), Duration>>,
    chapter_fetches: AtomicUsize,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider that serves generated text for every canon chapter in each
    /// of `versions`.
    pub fn synthetic(versions: &[VersionDescriptor]) -> Self {
        let provider = Self::new();
        for v in versions {
            provider.add_version(v.clone());
            write(&provider.synthetic_versions).push(v.id.clone());
        }
        provider
    }

    pub fn add_version(&self, version: VersionDescriptor) {
        write(&self.versions).push(version);
    }

    pub fn insert_chapter(&self, content: ChapterContent) {
        write(&self.chapters).insert(content.key(), content);
    }

    /// The next chapter fetch fails with `error`. Queued failures are used in order.
    pub fn fail_next_chapter(&self, error: FetchError) {
        lock(&self.chapter_failures).push_back(error);
    }

    /// Every chapter fetch for `version_id` fails until cleared.
    pub fn fail_version(&self, version_id: &str, error: FetchError) {
        write(&self.version_failures).insert(version_id.to_string(), error);
    }

    pub fn clear_version_failure(&self, version_id: &str) {
        write(&self.version_failures).remove(version_id);
    }

    pub fn fail_catalog(&self, error: Option<FetchError>) {
        *write(&self.catalog_failure) = error;
    }

    pub fn fail_search(&self, error: Option<FetchError>) {
        *write(&self.search_failure) = error;
    }

    /// Delay responses for one chapter, in every version.
    pub fn set_delay(&self, book: &str, chapter: u16, delay: Duration) {
        write(&self.delays).insert((book.to_ascii_uppercase(), chapter), delay);
    }

    /// Number of chapter fetches that reached this provider.
    pub fn chapter_fetches(&self) -> usize {
        self.chapter_fetches.load(Ordering::SeqCst)
    }

    /// Verse count used for generated chapters.
    pub fn synthetic_verse_count(book: &str, chapter: u16) -> u16 {
        let seed = canon::ordinal(book, chapter).unwrap_or(0) as u16;
        10 + seed % 21
    }

    fn synthesize(&self, version_id: &str, book: &str, chapter: u16) -> Option<ChapterContent> {
        if !read(&self.synthetic_versions).iter().any(|v| v == version_id) {
            return None;
        }
        let b = canon::validate(book, chapter).ok()?;
        let verses = (1..=Self::synthetic_verse_count(b.code, chapter))
            .map(|n| Verse {
                number: n,
                text: format!("{} {}:{} ({})", b.name, chapter, n, version_id),
            })
            .collect();
        Some(ChapterContent {
            version_id: version_id.to_string(),
            book: b.code.to_string(),
            chapter,
            verses,
        })
    }
}

#[async_trait]
impl ContentProvider for MemoryProvider {
    async fn fetch_chapter(
        &self,
        version_id: &str,
        book: &str,
        chapter: u16,
    ) -> ProviderResult<ChapterContent> {
        self.chapter_fetches.fetch_add(1, Ordering::SeqCst);

        let delay = read(&self.delays)
            .get(&(book.to_ascii_uppercase(), chapter))
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = lock(&self.chapter_failures).pop_front() {
            return Err(err);
        }
        if let Some(err) = read(&self.version_failures).get(version_id) {
            return Err(err.clone());
        }

        let key = ChapterKey::new(version_id, book, chapter);
        if let Some(content) = read(&self.chapters).get(&key) {
            return Ok(content.clone());
        }
        self.synthesize(version_id, book, chapter)
            .ok_or_else(|| FetchError::not_found(format!("{} {} in {}", book, chapter, version_id)))
    }

    async fn fetch_versions(&self, language: &str) -> ProviderResult<Vec<VersionDescriptor>> {
        if let Some(err) = read(&self.catalog_failure).clone() {
            return Err(err);
        }
        Ok(read(&self.versions)
            .iter()
            .filter(|v| language.is_empty() || v.language == language)
            .cloned()
            .collect())
    }

    async fn search(&self, query: &str, limit: usize) -> ProviderResult<Vec<SearchResult>> {
        if let Some(err) = read(&self.search_failure).clone() {
            return Err(err);
        }
        let needle = fold_query(query);
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let chapters = read(&self.chapters);
        let mut ordered: Vec<&ChapterContent> = chapters.values().collect();
        ordered.sort_by_key(|c| (canon::ordinal(&c.book, c.chapter), c.version_id.clone()));

        let mut results = Vec::new();
        for content in ordered {
            for verse in &content.verses {
                let haystack = fold_query(&verse.text);
                if !haystack.contains(&needle) {
                    continue;
                }
                let match_kind = if contains_words(&haystack, &needle) {
                    MatchKind::Exact
                } else {
                    MatchKind::Partial
                };
                results.push(SearchResult {
                    book: content.book.clone(),
                    chapter: content.chapter,
                    verse: verse.number,
                    text: verse.text.clone(),
                    match_kind,
                });
                if results.len() >= limit {
                    return Ok(results);
                }
            }
        }
        Ok(results)
    }
}

/// Whole-word match of `needle` inside `haystack`, both already folded.
fn contains_words(haystack: &str, needle: &str) -> bool {
    let words: Vec<&str> = haystack
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let wanted: Vec<&str> = needle
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    !wanted.is_empty() && words.windows(wanted.len()).any(|w| w == wanted.as_slice())
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
