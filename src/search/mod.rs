//! Verse search with a bounded local history.

mod history;

pub use history::{SearchHistory, HISTORY_LIMIT};

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::app::{FetchError, LectioError, Result};
use crate::domain::SearchResult;
use crate::normalizer::fold_query;
use crate::provider::SharedProvider;
use crate::reader::{NavigationOutcome, ReadingController};

/// What the search screen shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    pub results: Vec<SearchResult>,
    pub is_searching: bool,
    pub error: Option<FetchError>,
    pub last_query: Option<String>,
}

pub struct SearchService {
    provider: SharedProvider,
    history: SearchHistory,
    timeout: Duration,
    generation: AtomicU64,
    state: watch::Sender<SearchState>,
}

impl SearchService {
    pub fn new(provider: SharedProvider, history: SearchHistory, timeout: Duration) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        Self {
            provider,
            history,
            timeout,
            generation: AtomicU64::new(0),
            state,
        }
    }

    /// Search for `query` and remember it in the history.
    ///
    /// Matching ignores case and diacritics. Results keep the provider's
    /// order and are cut to `max_results`. A blank query just clears the
    /// results.
    pub async fn search_verses(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            self.clear_search();
            return Ok(Vec::new());
        }
        self.history.record(query);
        self.run(query, max_results).await
    }

    /// Run a past query again without touching the history.
    pub async fn replay(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            self.clear_search();
            return Ok(Vec::new());
        }
        self.run(query, max_results).await
    }

    /// Forget the current results and error. Any search still running is
    /// discarded when it returns.
    pub fn clear_search(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(SearchState::default());
    }

    pub fn history(&self) -> Vec<String> {
        self.history.entries()
    }

    pub fn clear_history(&self) {
        self.history.clear();
    }

    /// Open the chapter of a result with its verse highlighted.
    pub async fn select_result(
        &self,
        result: &SearchResult,
        controller: &ReadingController,
    ) -> Result<NavigationOutcome> {
        controller.navigate_to_chapter(result.chapter_ref()).await
    }

    pub fn state(&self) -> SearchState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }

    async fn run(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|s| {
            s.is_searching = true;
            s.error = None;
            s.last_query = Some(query.to_string());
        });

        let folded = fold_query(query);
        let outcome = if max_results == 0 {
            Ok(Vec::new())
        } else {
            tokio::time::timeout(self.timeout, self.provider.search(&folded, max_results))
                .await
                .unwrap_or_else(|_| Err(FetchError::timeout(self.timeout)))
        };

        let outcome = outcome.map(|mut results| {
            results.truncate(max_results);
            results
        });

        let current = self.state.send_if_modified(|s| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            s.is_searching = false;
            match &outcome {
                Ok(results) => {
                    s.results = results.clone();
                    s.error = None;
                }
                Err(e) => {
                    s.results.clear();
                    s.error = Some(e.clone());
                }
            }
            true
        });
        if !current {
            debug!("Discarded results of superseded search {:?}", query);
        }

        match outcome {
            Ok(results) => {
                debug!("Search {:?} returned {} results", query, results.len());
                Ok(results)
            }
            Err(e) => {
                warn!("Search {:?} failed: {}", query, e);
                Err(LectioError::ContentFetch(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::FetchErrorKind;
    use crate::catalog::VersionCatalog;
    use crate::config::{ProviderConfig, ReaderConfig, SyncConfig};
    use crate::domain::{ChapterContent, MatchKind, Verse, VersionDescriptor};
    use crate::progress::{ProgressTracker, SystemClock};
    use crate::provider::{ContentProvider, MemoryProvider, ProviderResult};
    use crate::store::SqliteStore;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn verse(number: u16, text: &str) -> Verse {
        Verse {
            number,
            text: text.to_string(),
        }
    }

    fn provider() -> Arc<MemoryProvider> {
        let provider = Arc::new(MemoryProvider::new());
        provider.insert_chapter(ChapterContent {
            version_id: "rvr1960".into(),
            book: "PSA".into(),
            chapter: 23,
            verses: vec![
                verse(1, "Jehová es mi pastor; nada me faltará."),
                verse(6, "Ciertamente el bien y la misericordia me seguirán todos los días de mi vida, y en la casa de Jehová moraré por largos días."),
            ],
        });
        provider.insert_chapter(ChapterContent {
            version_id: "rvr1960".into(),
            book: "GEN".into(),
            chapter: 1,
            verses: vec![
                verse(1, "En el principio creó Dios los cielos y la tierra."),
                verse(3, "Y dijo Dios: Sea la luz; y fue la luz."),
            ],
        });
        provider
    }

    fn service(provider: Arc<MemoryProvider>) -> SearchService {
        SearchService::new(provider, SearchHistory::in_memory(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_search_ignores_case_and_accents() {
        let search = service(provider());

        let results = search.search_verses("  JEHOVA ", 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.book == "PSA"));
        assert_eq!(results[0].verse, 1);
        assert_eq!(results[0].match_kind, MatchKind::Exact);

        let state = search.state();
        assert!(!state.is_searching);
        assert_eq!(state.results, results);
        assert_eq!(state.last_query.as_deref(), Some("JEHOVA"));
        assert_eq!(search.history(), vec!["JEHOVA"]);
    }

    #[tokio::test]
    async fn test_results_keep_provider_order_and_limit() {
        let search = service(provider());

        let results = search.search_verses("dios", 10).await.unwrap();
        assert_eq!(
            results.iter().map(|r| r.verse).collect::<Vec<_>>(),
            vec![1, 3]
        );

        let results = search.search_verses("dios", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(search.search_verses("dios", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_query_clears_without_history() {
        let search = service(provider());
        assert_ok!(search.search_verses("luz", 10).await);

        assert!(search.search_verses("   ", 10).await.unwrap().is_empty());
        assert_eq!(search.state(), SearchState::default());
        assert_eq!(search.history(), vec!["luz"]);
    }

    #[tokio::test]
    async fn test_replay_does_not_touch_history() {
        let search = service(provider());
        search.search_verses("luz", 10).await.unwrap();
        search.search_verses("pastor", 10).await.unwrap();

        let results = search.replay("luz", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(search.history(), vec!["pastor", "luz"]);
    }

    #[tokio::test]
    async fn test_failure_is_published_and_history_kept() {
        let provider = provider();
        provider.fail_search(Some(FetchError::rate_limited(Some(Duration::from_secs(30)))));
        let search = service(provider.clone());

        let err = assert_err!(search.search_verses("luz", 10).await);
        assert!(matches!(
            err.fetch_error().map(|e| &e.kind),
            Some(FetchErrorKind::RateLimited { .. })
        ));
        let state = search.state();
        assert!(state.error.is_some());
        assert!(state.results.is_empty());
        assert_eq!(search.history(), vec!["luz"]);

        search.clear_search();
        assert_eq!(search.state().error, None);
        assert_eq!(search.history(), vec!["luz"]);
    }

    /// Answers "slow" after a delay and everything else immediately.
    struct SlowQueries;

    #[async_trait]
    impl ContentProvider for SlowQueries {
        async fn fetch_chapter(
            &self,
            version_id: &str,
            book: &str,
            chapter: u16,
        ) -> ProviderResult<ChapterContent> {
            Err(FetchError::not_found(format!("{} {} {}", version_id, book, chapter)))
        }

        async fn fetch_versions(&self, _language: &str) -> ProviderResult<Vec<VersionDescriptor>> {
            Ok(Vec::new())
        }

        async fn search(&self, query: &str, _limit: usize) -> ProviderResult<Vec<SearchResult>> {
            if query == "slow" {
                tokio::time::sleep(Duration::from_millis(150)).await;
            }
            Ok(vec![SearchResult {
                book: "GEN".into(),
                chapter: 1,
                verse: 1,
                text: query.to_string(),
                match_kind: MatchKind::Partial,
            }])
        }
    }

    #[tokio::test]
    async fn test_later_search_supersedes_earlier() {
        let search = Arc::new(SearchService::new(
            Arc::new(SlowQueries),
            SearchHistory::in_memory(),
            Duration::from_secs(5),
        ));

        let slow = {
            let search = search.clone();
            tokio::spawn(async move { search.search_verses("slow", 10).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        search.search_verses("fast", 10).await.unwrap();
        slow.await.unwrap().unwrap();

        let state = search.state();
        assert_eq!(state.results[0].text, "fast");
        assert_eq!(state.last_query.as_deref(), Some("fast"));
        assert_eq!(search.history(), vec!["fast", "slow"]);
    }

    #[tokio::test]
    async fn test_select_result_opens_chapter_at_verse() {
        let kjv = VersionDescriptor::new("kjv", "King James Version", "KJV", "en");
        let provider = Arc::new(MemoryProvider::synthetic(&[kjv.clone()]));
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let catalog = Arc::new(VersionCatalog::new(
            provider.clone(),
            store.clone(),
            &ProviderConfig::default(),
        ));
        let tracker = Arc::new(ProgressTracker::start(
            "u1",
            store,
            Arc::new(SystemClock),
            &SyncConfig::default(),
        ));
        let config = ReaderConfig {
            prefetch_adjacent: false,
            ..ReaderConfig::default()
        };
        let controller = ReadingController::new(catalog, tracker, &config, kjv);
        let search = service(provider);

        let result = SearchResult {
            book: "JHN".into(),
            chapter: 3,
            verse: 7,
            text: "Marvel not".into(),
            match_kind: MatchKind::Exact,
        };
        search.select_result(&result, &controller).await.unwrap();

        let position = controller.position().unwrap();
        assert_eq!(
            (position.book.as_str(), position.chapter, position.verse),
            ("JHN", 3, Some(7))
        );
        assert!(search.history().is_empty());
    }
}
