use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::domain::ProgressStats;
use crate::store::SharedProgressStore;

/// Message type for the background stats writer
#[derive(Debug)]
pub enum SyncMessage {
    /// Latest stats snapshot to persist
    Persist(ProgressStats),
    /// Try to write now; replies `true` once nothing is pending
    Flush(oneshot::Sender<bool>),
    /// Write what is pending and stop
    Shutdown,
}

/// Handle to send snapshots to the background writer
#[derive(Clone)]
pub struct StatsSyncHandle {
    tx: mpsc::UnboundedSender<SyncMessage>,
}

impl StatsSyncHandle {
    /// Queue a snapshot. Never blocks.
    pub fn persist(&self, stats: ProgressStats) {
        if self.tx.send(SyncMessage::Persist(stats)).is_err() {
            debug!("Stats writer has stopped; snapshot dropped");
        }
    }

    /// Ask the writer to persist immediately. Returns `false` if a snapshot is
    /// still waiting for a retry or the writer is gone.
    pub async fn flush(&self) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(SyncMessage::Flush(reply)).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(SyncMessage::Shutdown);
    }
}

/// Persists progress snapshots off the navigation path.
///
/// Snapshots that arrive while a write is failing replace the pending one,
/// so only the newest state is retried. Each write sends what changed since
/// the last successful one through
/// [`ProgressStore::merge_stats`](crate::store::ProgressStore::merge_stats),
/// so other writers for the same user keep their progress.
pub struct StatsSync {
    user_id: String,
    store: SharedProgressStore,
    config: SyncConfig,
    rx: mpsc::UnboundedReceiver<SyncMessage>,
    pending: Option<ProgressStats>,
    written: ProgressStats,
    backoff: Duration,
    retry_at: Option<Instant>,
}

impl StatsSync {
    /// `written` is the state already in the store, usually what was loaded
    /// at start-up.
    pub fn new(
        user_id: &str,
        store: SharedProgressStore,
        config: SyncConfig,
        written: ProgressStats,
    ) -> (Self, StatsSyncHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let backoff = config.initial_backoff();
        let sync = Self {
            user_id: user_id.to_string(),
            store,
            config,
            rx,
            pending: None,
            written,
            backoff,
            retry_at: None,
        };
        (sync, StatsSyncHandle { tx })
    }

    pub async fn run(mut self) {
        info!("Stats sync started for {}", self.user_id);

        loop {
            let msg = match self.retry_at {
                Some(deadline) => match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                    Ok(msg) => msg,
                    Err(_) => {
                        self.write_pending();
                        continue;
                    }
                },
                None => self.rx.recv().await,
            };

            match msg {
                Some(SyncMessage::Persist(stats)) => {
                    self.pending = Some(stats);
                    // While backing off, the new snapshot waits for the retry.
                    if self.retry_at.is_none() {
                        self.write_pending();
                    }
                }
                Some(SyncMessage::Flush(reply)) => {
                    self.write_pending();
                    let _ = reply.send(self.pending.is_none());
                }
                Some(SyncMessage::Shutdown) | None => {
                    self.write_pending();
                    if self.pending.is_some() {
                        warn!("Stats sync stopping with unsaved progress for {}", self.user_id);
                    }
                    info!("Stats sync shutting down");
                    break;
                }
            }
        }
    }

    fn write_pending(&mut self) {
        let Some(stats) = self.pending.take() else {
            self.retry_at = None;
            return;
        };

        let change = stats.since(&self.written);
        match self.store.merge_stats(&self.user_id, &change) {
            Ok(merged) => {
                debug!(
                    "Saved progress for {} ({} chapters)",
                    self.user_id,
                    merged.chapters_read.len()
                );
                self.written = stats;
                self.retry_at = None;
                self.backoff = self.config.initial_backoff();
            }
            Err(e) => {
                warn!(
                    "Failed to save progress for {}: {}; retrying in {:?}",
                    self.user_id, e, self.backoff
                );
                self.pending = Some(stats);
                self.retry_at = Some(Instant::now() + self.backoff);
                self.backoff = (self.backoff * 2).min(self.config.max_backoff());
            }
        }
    }
}

/// Spawn the stats writer as a tokio task
pub fn spawn_stats_sync(
    user_id: &str,
    store: SharedProgressStore,
    config: SyncConfig,
    written: ProgressStats,
) -> (StatsSyncHandle, tokio::task::JoinHandle<()>) {
    let (sync, handle) = StatsSync::new(user_id, store, config, written);
    let task = tokio::spawn(sync.run());
    (handle, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChapterId;
    use crate::store::{ProgressStore, SqliteStore};
    use std::sync::Arc;

    fn fast_retries() -> SyncConfig {
        SyncConfig {
            retry_initial_ms: 5,
            retry_max_ms: 20,
        }
    }

    #[tokio::test]
    async fn test_flush_writes_latest_snapshot() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let (handle, task) = spawn_stats_sync("u1", store.clone(), fast_retries(), ProgressStats::default());

        let mut stats = ProgressStats::default();
        stats.record_completion(ChapterId::new("GEN", 1), 31);
        handle.persist(stats.clone());
        stats.record_completion(ChapterId::new("GEN", 2), 25);
        handle.persist(stats);

        assert!(handle.flush().await);
        let saved = store.read_stats("u1").unwrap().unwrap();
        assert_eq!(saved.chapters_read.len(), 2);

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_flush_after_shutdown_reports_failure() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let (handle, task) = spawn_stats_sync("u1", store, fast_retries(), ProgressStats::default());
        handle.shutdown();
        task.await.unwrap();
        assert!(!handle.flush().await);
    }

    #[tokio::test]
    async fn test_writes_add_to_progress_stored_by_another_writer() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let gen1 = ChapterId::new("GEN", 1);

        let mut start = ProgressStats::default();
        start.meditations_count = 1;
        start.add_reading_time(gen1.clone(), Duration::from_secs(10));
        store.write_stats("u1", &start).unwrap();

        let (handle, task) =
            spawn_stats_sync("u1", store.clone(), fast_retries(), start.clone());

        // Another process records progress for the same user meanwhile.
        let mut other = store.read_stats("u1").unwrap().unwrap();
        other.meditations_count += 2;
        other.record_completion(ChapterId::new("EXO", 1), 22);
        store.write_stats("u1", &other).unwrap();

        let mut local = start;
        local.meditations_count += 1;
        local.add_reading_time(gen1.clone(), Duration::from_secs(5));
        local.record_completion(gen1.clone(), 31);
        handle.persist(local);
        assert!(handle.flush().await);

        let saved = store.read_stats("u1").unwrap().unwrap();
        assert_eq!(saved.meditations_count, 4);
        assert_eq!(saved.reading_time(&gen1), Duration::from_secs(15));
        assert_eq!(saved.chapters_read.len(), 2);
        assert_eq!(saved.verses_read, 53);

        handle.shutdown();
        task.await.unwrap();
    }
}
