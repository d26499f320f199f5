//! Reading position controller.
//!
//! Owns the committed reading position and the chapter on screen. Requests
//! are numbered; a fetch result commits only if no newer request has been
//! issued since, so a slow response can never overwrite a faster later one.
//! The commit happens inside the watch channel's update closure, which is
//! also the only place the progress tracker is told about chapter changes.
//! Relative steps (next, previous, swipes) queue behind each other, so two
//! quick swipes turn two chapters.

pub mod gesture;
pub mod highlight;
pub mod state;

pub use gesture::{SwipeDirection, SwipeEvent, SwipeThresholds};
pub use highlight::{Keyframe, VerseHighlight, HIGHLIGHT_KEYFRAMES};
pub use state::{PendingRequest, ReaderFailure, ReaderState, ReaderStatus, ScrollTarget, Viewport};

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::app::{FetchError, LectioError, Result};
use crate::catalog::VersionCatalog;
use crate::config::ReaderConfig;
use crate::domain::{canon, ChapterContent, ChapterKey, ChapterRef, ReadingPosition, VersionDescriptor};
use crate::progress::ProgressTracker;
use crate::store::SharedPositionStore;

/// What became of a navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Committed(ReadingPosition),
    /// A newer request was issued before this one finished.
    Superseded,
    /// Already at the first or last chapter of the canon.
    AtBoundary,
    /// Nothing to do.
    Unchanged,
}

pub struct ReadingController {
    catalog: Arc<VersionCatalog>,
    tracker: Arc<ProgressTracker>,
    positions: Option<SharedPositionStore>,
    thresholds: SwipeThresholds,
    prefetch_adjacent: bool,
    state: watch::Sender<ReaderState>,
    steps: Mutex<()>,
}

impl ReadingController {
    pub fn new(
        catalog: Arc<VersionCatalog>,
        tracker: Arc<ProgressTracker>,
        config: &ReaderConfig,
        version: VersionDescriptor,
    ) -> Self {
        let (state, _) = watch::channel(ReaderState::new(version));
        Self {
            catalog,
            tracker,
            positions: None,
            thresholds: SwipeThresholds::from(config),
            prefetch_adjacent: config.prefetch_adjacent,
            state,
            steps: Mutex::new(()),
        }
    }

    /// Remember every committed position so the next run can resume.
    pub fn with_position_store(mut self, store: SharedPositionStore) -> Self {
        self.positions = Some(store);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<ReaderState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ReaderState {
        self.state.borrow().clone()
    }

    pub fn current_version(&self) -> VersionDescriptor {
        self.state.borrow().version.clone()
    }

    pub fn position(&self) -> Option<ReadingPosition> {
        self.state.borrow().position.clone()
    }

    /// Load `target` and make it the current position.
    ///
    /// An unknown book or chapter is rejected without touching any state. A
    /// verse beyond the chapter's last verse is dropped.
    pub async fn navigate_to_chapter(&self, target: ChapterRef) -> Result<NavigationOutcome> {
        let book = canon::validate(&target.book, target.chapter)?;
        let target = ChapterRef {
            book: book.code.to_string(),
            ..target
        };

        let (generation, version) = self.begin(PendingRequest::Navigate(target.clone()));
        debug!("Loading {} in {} (request {})", target, version.id, generation);

        match self.catalog.chapter(&version.id, &target.book, target.chapter).await {
            Ok(content) => Ok(self.commit(generation, &target, content, None)),
            Err(e) => self.fail(generation, e, PendingRequest::Navigate(target)),
        }
    }

    /// Complete the current chapter and move to the next one.
    ///
    /// At the last chapter of the canon nothing happens and nothing is
    /// marked as read. A step issued while another is loading waits for it
    /// and moves on from where it landed.
    pub async fn go_to_next_chapter(&self) -> Result<NavigationOutcome> {
        let _step = self.steps.lock().await;
        let mut next = None;
        // Read the committed position and record completion under the
        // commit lock so it is ordered with other transitions.
        self.state.send_if_modified(|s| {
            let (Some(position), Some(content)) = (&s.position, &s.content) else {
                return false;
            };
            next = canon::next_chapter(&position.book, position.chapter);
            if next.is_some() {
                if let Err(e) =
                    self.tracker
                        .complete_chapter(&position.book, position.chapter, content.verse_count())
                {
                    warn!("Failed to record completion of {}: {}", position.chapter_id(), e);
                }
            }
            false
        });

        match next {
            Some(id) => self.navigate_to_chapter(id.into()).await,
            None => Ok(NavigationOutcome::AtBoundary),
        }
    }

    /// Move to the previous chapter. Never marks anything as read.
    pub async fn go_to_previous_chapter(&self) -> Result<NavigationOutcome> {
        let _step = self.steps.lock().await;
        let previous = self
            .state
            .borrow()
            .position
            .as_ref()
            .and_then(|p| canon::previous_chapter(&p.book, p.chapter));

        match previous {
            Some(id) => self.navigate_to_chapter(id.into()).await,
            None => Ok(NavigationOutcome::AtBoundary),
        }
    }

    /// Follow the finger while a swipe is in progress.
    pub fn drag(&self, translation_x: f64) {
        self.state.send_modify(|s| s.viewport.drag_offset = translation_x);
    }

    /// End a swipe: the view always snaps back, and a swipe past either
    /// threshold turns exactly one chapter.
    pub async fn release_swipe(&self, event: SwipeEvent) -> Result<NavigationOutcome> {
        self.state.send_if_modified(|s| {
            let moved = s.viewport.drag_offset != 0.0;
            s.viewport.drag_offset = 0.0;
            moved
        });

        match event.classify(&self.thresholds) {
            Some(SwipeDirection::Next) => self.go_to_next_chapter().await,
            Some(SwipeDirection::Previous) => self.go_to_previous_chapter().await,
            None => Ok(NavigationOutcome::Unchanged),
        }
    }

    /// Scroll to `verse` and play the highlight cue. Returns `false` if the
    /// loaded chapter has no such verse.
    pub fn highlight_verse(&self, verse: u16) -> bool {
        self.state.send_if_modified(|s| {
            let Some(index) = s.content.as_ref().and_then(|c| c.verse_index(verse)) else {
                return false;
            };
            focus_verse(s, verse, index);
            true
        })
    }

    /// Drop the highlight once its cue has played out.
    pub fn clear_finished_highlight(&self, now: Instant) -> bool {
        self.state.send_if_modified(|s| match s.viewport.highlight {
            Some(h) if h.is_finished(now) => {
                s.viewport.highlight = None;
                true
            }
            _ => false,
        })
    }

    /// Show the current chapter in another version.
    ///
    /// The chapter is fetched in the new version before anything changes. If
    /// that fails, version, position and content stay exactly as they were.
    pub async fn set_current_version(&self, version: VersionDescriptor) -> Result<NavigationOutcome> {
        let (current, position) = {
            let s = self.state.borrow();
            (s.version.clone(), s.position.clone())
        };
        if current.id == version.id {
            self.state.send_if_modified(|s| {
                let changed = s.version != version;
                s.version = version.clone();
                changed
            });
            return Ok(NavigationOutcome::Unchanged);
        }

        let Some(position) = position else {
            // Nothing loaded yet; the next navigation uses the new version.
            self.state.send_modify(|s| {
                s.generation += 1;
                s.version = version.clone();
            });
            info!("Switched version to {}", version.id);
            return Ok(NavigationOutcome::Unchanged);
        };

        let (generation, _) = self.begin(PendingRequest::SwitchVersion(version.clone()));
        let target = position.chapter_ref();

        match self.catalog.chapter(&version.id, &target.book, target.chapter).await {
            Ok(content) => {
                let outcome = self.commit(generation, &target, content, Some(version.clone()));
                if matches!(outcome, NavigationOutcome::Committed(_)) {
                    info!("Switched version {} -> {}", current.id, version.id);
                    self.catalog.invalidate_version(&current.id);
                }
                Ok(outcome)
            }
            Err(source) => {
                let request = PendingRequest::SwitchVersion(version.clone());
                match self.fail(generation, source.clone(), request) {
                    Ok(outcome) => Ok(outcome),
                    Err(_) => Err(LectioError::VersionSwitch {
                        version_id: version.id,
                        source,
                    }),
                }
            }
        }
    }

    /// Re-issue the request that failed last.
    pub async fn retry(&self) -> Result<NavigationOutcome> {
        let request = self.state.borrow().failure().map(|f| f.request.clone());
        match request {
            Some(PendingRequest::Navigate(target)) => self.navigate_to_chapter(target).await,
            Some(PendingRequest::SwitchVersion(version)) => self.set_current_version(version).await,
            None => Ok(NavigationOutcome::Unchanged),
        }
    }

    /// Start a request: it becomes the latest and the reader shows loading.
    fn begin(&self, request: PendingRequest) -> (u64, VersionDescriptor) {
        let mut started = (0, self.current_version());
        self.state.send_modify(|s| {
            s.generation += 1;
            s.status = ReaderStatus::Loading;
            s.pending = Some(request);
            started = (s.generation, s.version.clone());
        });
        started
    }

    fn commit(
        &self,
        generation: u64,
        target: &ChapterRef,
        content: Arc<ChapterContent>,
        version: Option<VersionDescriptor>,
    ) -> NavigationOutcome {
        let mut outcome = NavigationOutcome::Superseded;

        self.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            let verse = target.verse.filter(|v| content.verse(*v).is_some());
            let position = ReadingPosition {
                version_id: content.version_id.clone(),
                book: target.book.clone(),
                chapter: target.chapter,
                verse,
            };

            if let Some(version) = &version {
                s.version = version.clone();
            }
            s.position = Some(position.clone());
            s.content = Some(content.clone());
            s.status = ReaderStatus::Ready;
            s.pending = None;
            s.viewport = Viewport::default();
            if let Some((v, index)) = verse.and_then(|v| content.verse_index(v).map(|i| (v, i))) {
                focus_verse(s, v, index);
            }

            if let Err(e) = self.tracker.switch_to(&position.book, position.chapter) {
                warn!("Failed to start reading session: {}", e);
            }
            outcome = NavigationOutcome::Committed(position);
            true
        });

        match &outcome {
            NavigationOutcome::Committed(position) => {
                info!("Now reading {} ({})", position.chapter_ref(), position.version_id);
                self.remember(position);
                self.prefetch_around(position);
            }
            _ => debug!("Discarded stale result for {} (request {})", target, generation),
        }
        outcome
    }

    fn fail(
        &self,
        generation: u64,
        error: FetchError,
        request: PendingRequest,
    ) -> Result<NavigationOutcome> {
        let current = self.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            s.status = ReaderStatus::Error(ReaderFailure {
                error: error.clone(),
                request: request.clone(),
            });
            s.pending = None;
            true
        });

        if !current {
            debug!("Discarded stale failure (request {}): {}", generation, error);
            return Ok(NavigationOutcome::Superseded);
        }
        warn!("Request {} failed: {}", generation, error);
        Err(LectioError::ContentFetch(error))
    }

    fn remember(&self, position: &ReadingPosition) {
        if let Some(store) = &self.positions {
            if let Err(e) = store.save_position(self.tracker.user_id(), position) {
                warn!("Failed to save reading position: {}", e);
            }
        }
    }

    fn prefetch_around(&self, position: &ReadingPosition) {
        if !self.prefetch_adjacent {
            return;
        }
        let keys: Vec<ChapterKey> = [
            canon::next_chapter(&position.book, position.chapter),
            canon::previous_chapter(&position.book, position.chapter),
        ]
        .into_iter()
        .flatten()
        .map(|id| ChapterKey::new(&position.version_id, &id.book, id.chapter))
        .collect();

        let catalog = self.catalog.clone();
        tokio::spawn(async move {
            let loaded = catalog.prefetch(keys).await;
            debug!("Prefetched {} adjacent chapters", loaded);
        });
    }
}

fn focus_verse(state: &mut ReaderState, verse: u16, index: usize) {
    state.viewport.scroll = ScrollTarget::Verse { verse, index };
    state.viewport.highlight = Some(VerseHighlight::start(verse));
    if let Some(position) = &mut state.position {
        position.verse = Some(verse);
    }
}
