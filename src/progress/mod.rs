//! Reading session and progress tracking.
//!
//! [`ProgressTracker`] owns the in-memory [`ProgressStats`] of one user. It is
//! created when reading starts and shut down when the user leaves; there is no
//! global instance. Every transition runs under a single lock so fast
//! successive navigations are applied in order. Persistence happens in a
//! background [`StatsSync`] task and never reports failures to callers.

pub mod clock;
pub mod session;
pub mod sync;

pub use clock::{Clock, ManualClock, SystemClock};
pub use session::ReadingSession;
pub use sync::{spawn_stats_sync, StatsSync, StatsSyncHandle};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::Result;
use crate::config::SyncConfig;
use crate::domain::{canon, ChapterId, ProgressStats};
use crate::store::SharedProgressStore;

struct TrackerState {
    stats: ProgressStats,
    session: Option<ReadingSession>,
}

pub struct ProgressTracker {
    user_id: String,
    clock: Arc<dyn Clock>,
    state: Mutex<TrackerState>,
    sync: StatsSyncHandle,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ProgressTracker {
    /// Load the user's stats and start the background writer.
    ///
    /// Must be called from within a tokio runtime. A failed read starts from
    /// empty stats; the next successful write merges with whatever is stored.
    pub fn start(
        user_id: &str,
        store: SharedProgressStore,
        clock: Arc<dyn Clock>,
        config: &SyncConfig,
    ) -> Self {
        let stats = match store.read_stats(user_id) {
            Ok(Some(stats)) => stats,
            Ok(None) => ProgressStats::default(),
            Err(e) => {
                warn!("Failed to load progress for {}: {}", user_id, e);
                ProgressStats::default()
            }
        };
        info!(
            "Progress tracker started for {} ({} chapters read)",
            user_id,
            stats.chapters_read.len()
        );

        let (sync, worker) = spawn_stats_sync(user_id, store, config.clone(), stats.clone());
        Self {
            user_id: user_id.to_string(),
            clock,
            state: Mutex::new(TrackerState {
                stats,
                session: None,
            }),
            sync,
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Make `(book, chapter)` the chapter being read.
    ///
    /// Time spent on the previous chapter is added to its total. Switching to
    /// the chapter already being read does nothing.
    pub fn switch_to(&self, book: &str, chapter: u16) -> Result<()> {
        let book = canon::validate(book, chapter)?;
        let now = self.clock.now();
        let mut state = self.lock();

        if let Some(session) = &state.session {
            if session.is_for(book.code, chapter) {
                return Ok(());
            }
        }

        let previous = state.session.replace(ReadingSession::start(
            ChapterId::new(book.code, chapter),
            now,
        ));
        if let Some(previous) = previous {
            let elapsed = previous.elapsed(now);
            debug!("Read {} for {:?}", previous.chapter, elapsed);
            state.stats.add_reading_time(previous.chapter, elapsed);
            state.stats.updated_at = Some(now);
            self.sync.persist(state.stats.clone());
        }
        Ok(())
    }

    /// Mark a chapter as read. Returns `true` the first time only.
    ///
    /// Repeated calls never double count verses, but every call counts as
    /// activity for the day streak.
    pub fn complete_chapter(&self, book: &str, chapter: u16, verse_count: usize) -> Result<bool> {
        let book = canon::validate(book, chapter)?;
        let now = self.clock.now();
        let today = self.clock.today();
        let mut state = self.lock();

        let first = state
            .stats
            .record_completion(ChapterId::new(book.code, chapter), verse_count);
        state.stats.touch_day(today);
        state.stats.updated_at = Some(now);
        if first {
            info!(
                "Completed {} {} ({:.1}% of canon)",
                book.code, chapter, state.stats.progress_percentage
            );
        }
        self.sync.persist(state.stats.clone());
        Ok(first)
    }

    pub fn record_meditation(&self) {
        self.bump(|stats| stats.meditations_count += 1);
    }

    pub fn complete_learning_module(&self) {
        self.bump(|stats| stats.learning_modules_completed += 1);
    }

    /// Total time on a chapter, including the session in progress.
    pub fn reading_time(&self, book: &str, chapter: u16) -> Duration {
        let id = ChapterId::new(book, chapter);
        let state = self.lock();
        let live = match &state.session {
            Some(s) if s.chapter == id => s.elapsed(self.clock.now()),
            _ => Duration::ZERO,
        };
        state.stats.reading_time(&id) + live
    }

    pub fn current_chapter(&self) -> Option<ChapterId> {
        self.lock().session.as_ref().map(|s| s.chapter.clone())
    }

    pub fn snapshot(&self) -> ProgressStats {
        self.lock().stats.clone()
    }

    /// Close the active session, adding its time to the chapter total.
    pub fn end_session(&self) {
        let now = self.clock.now();
        let mut state = self.lock();
        if let Some(session) = state.session.take() {
            let elapsed = session.elapsed(now);
            state.stats.add_reading_time(session.chapter, elapsed);
            state.stats.updated_at = Some(now);
            self.sync.persist(state.stats.clone());
        }
    }

    /// Wait for pending writes. Returns `false` if a write is still failing.
    pub async fn flush(&self) -> bool {
        self.sync.flush().await
    }

    /// End the session, write what is left and stop the background writer.
    pub async fn shutdown(&self) {
        self.end_session();
        self.sync.shutdown();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!("Stats sync task failed: {}", e);
            }
        }
        info!("Progress tracker stopped for {}", self.user_id);
    }

    fn bump(&self, f: impl FnOnce(&mut ProgressStats)) {
        let now = self.clock.now();
        let mut state = self.lock();
        f(&mut state.stats);
        state.stats.updated_at = Some(now);
        self.sync.persist(state.stats.clone());
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
