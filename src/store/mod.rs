pub mod sqlite;

use std::sync::Arc;

use crate::app::Result;
use crate::domain::{ProgressStats, ReadingPosition};

pub use sqlite::SqliteStore;

pub type SharedProgressStore = Arc<dyn ProgressStore + Send + Sync>;
pub type SharedHistoryStore = Arc<dyn HistoryStore + Send + Sync>;
pub type SharedPositionStore = Arc<dyn PositionStore + Send + Sync>;

/// Durable per-user statistics and the preferred default version.
pub trait ProgressStore {
    fn read_stats(&self, user_id: &str) -> Result<Option<ProgressStats>>;
    fn write_stats(&self, user_id: &str, stats: &ProgressStats) -> Result<()>;

    /// Apply `change` (see [`ProgressStats::since`]) on top of what is
    /// stored for the user and write the result.
    fn merge_stats(&self, user_id: &str, change: &ProgressStats) -> Result<ProgressStats> {
        let mut merged = self.read_stats(user_id)?.unwrap_or_default();
        merged.merge(change);
        self.write_stats(user_id, &merged)?;
        Ok(merged)
    }

    fn default_version(&self) -> Result<Option<String>>;
    fn set_default_version(&self, version_id: &str) -> Result<()>;
}

/// Device-local search history, most recent first.
pub trait HistoryStore {
    fn load_history(&self) -> Result<Vec<String>>;
    fn save_history(&self, entries: &[String]) -> Result<()>;
}

/// Last committed reading position, used to resume.
pub trait PositionStore {
    fn last_position(&self, user_id: &str) -> Result<Option<ReadingPosition>>;
    fn save_position(&self, user_id: &str, position: &ReadingPosition) -> Result<()>;
}
