use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};

use crate::app::{LectioError, Result};
use crate::domain::{ProgressStats, ReadingPosition};
use crate::store::{HistoryStore, PositionStore, ProgressStore};

const DEFAULT_VERSION_KEY: &str = "default_version";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        migrations
            .to_latest(&mut conn)
            .map_err(|e| LectioError::Persistence(format!("Migration failed: {}", e)))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            LectioError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }
}

impl ProgressStore for SqliteStore {
    fn read_stats(&self, user_id: &str) -> Result<Option<ProgressStats>> {
        let conn = self.conn()?;

        let json: Option<String> = conn
            .query_row(
                "SELECT stats_json FROM progress_stats WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => {
                let mut stats: ProgressStats = serde_json::from_str(&json)?;
                stats.recompute();
                Ok(Some(stats))
            }
            None => Ok(None),
        }
    }

    fn write_stats(&self, user_id: &str, stats: &ProgressStats) -> Result<()> {
        let json = serde_json::to_string(stats)?;
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO progress_stats (user_id, stats_json, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET stats_json = ?2, updated_at = ?3",
            params![user_id, json, Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }

    fn default_version(&self) -> Result<Option<String>> {
        let conn = self.conn()?;

        let value = conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![DEFAULT_VERSION_KEY],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value)
    }

    fn set_default_version(&self, version_id: &str) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO preferences (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![DEFAULT_VERSION_KEY, version_id],
        )?;

        Ok(())
    }
}

impl HistoryStore for SqliteStore {
    fn load_history(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare("SELECT query FROM search_history ORDER BY position")?;
        let entries = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(entries)
    }

    fn save_history(&self, entries: &[String]) -> Result<()> {
        let mut conn = self.conn()?;

        let tx = conn.transaction()?;
        tx.execute("DELETE FROM search_history", [])?;
        let now = Utc::now().to_rfc3339();
        for (position, query) in entries.iter().enumerate() {
            tx.execute(
                "INSERT OR IGNORE INTO search_history (position, query, searched_at)
                 VALUES (?1, ?2, ?3)",
                params![position as i64, query, now],
            )?;
        }
        tx.commit()?;

        Ok(())
    }
}

impl PositionStore for SqliteStore {
    fn last_position(&self, user_id: &str) -> Result<Option<ReadingPosition>> {
        let conn = self.conn()?;

        let position = conn
            .query_row(
                "SELECT version_id, book, chapter, verse FROM reading_position WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(ReadingPosition {
                        version_id: row.get(0)?,
                        book: row.get(1)?,
                        chapter: row.get(2)?,
                        verse: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(position)
    }

    fn save_position(&self, user_id: &str, position: &ReadingPosition) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO reading_position (user_id, version_id, book, chapter, verse, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id) DO UPDATE SET
                version_id = ?2, book = ?3, chapter = ?4, verse = ?5, updated_at = ?6",
            params![
                user_id,
                position.version_id,
                position.book,
                position.chapter,
                position.verse,
                Utc::now().to_rfc3339()
            ],
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChapterId;

    #[test]
    fn test_read_stats_missing_user() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.read_stats("nobody").unwrap().is_none());
    }

    #[test]
    fn test_write_and_read_stats() {
        let store = SqliteStore::in_memory().unwrap();
        let mut stats = ProgressStats::default();
        stats.record_completion(ChapterId::new("GEN", 1), 31);
        stats.meditations_count = 2;

        store.write_stats("user-1", &stats).unwrap();
        let loaded = store.read_stats("user-1").unwrap().unwrap();
        assert_eq!(loaded, stats);

        // Overwrite
        stats.record_completion(ChapterId::new("GEN", 2), 25);
        store.write_stats("user-1", &stats).unwrap();
        let loaded = store.read_stats("user-1").unwrap().unwrap();
        assert_eq!(loaded.chapters_read.len(), 2);
        assert_eq!(loaded.verses_read, 56);
    }

    #[test]
    fn test_stats_are_per_user() {
        let store = SqliteStore::in_memory().unwrap();
        let mut stats = ProgressStats::default();
        stats.record_completion(ChapterId::new("GEN", 1), 31);
        store.write_stats("user-1", &stats).unwrap();

        assert!(store.read_stats("user-2").unwrap().is_none());
    }

    #[test]
    fn test_merge_stats_unions_with_stored() {
        let store = SqliteStore::in_memory().unwrap();
        let mut device_a = ProgressStats::default();
        device_a.record_completion(ChapterId::new("GEN", 1), 31);
        store.write_stats("user-1", &device_a).unwrap();

        let mut device_b = ProgressStats::default();
        device_b.record_completion(ChapterId::new("EXO", 1), 22);
        let merged = store.merge_stats("user-1", &device_b).unwrap();

        assert_eq!(merged.chapters_read.len(), 2);
        assert_eq!(merged.verses_read, 53);
        assert_eq!(store.read_stats("user-1").unwrap().unwrap(), merged);
    }

    #[test]
    fn test_default_version_preference() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.default_version().unwrap().is_none());

        store.set_default_version("kjv").unwrap();
        assert_eq!(store.default_version().unwrap(), Some("kjv".into()));

        store.set_default_version("rvr1960").unwrap();
        assert_eq!(store.default_version().unwrap(), Some("rvr1960".into()));
    }

    #[test]
    fn test_history_round_trip_preserves_order() {
        let store = SqliteStore::in_memory().unwrap();
        let entries = vec!["love".to_string(), "faith".to_string(), "hope".to_string()];
        store.save_history(&entries).unwrap();
        assert_eq!(store.load_history().unwrap(), entries);

        store.save_history(&[]).unwrap();
        assert!(store.load_history().unwrap().is_empty());
    }

    #[test]
    fn test_position_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.last_position("user-1").unwrap().is_none());

        let position = ReadingPosition {
            version_id: "kjv".into(),
            book: "JHN".into(),
            chapter: 3,
            verse: Some(16),
        };
        store.save_position("user-1", &position).unwrap();
        assert_eq!(store.last_position("user-1").unwrap(), Some(position));
    }

    #[test]
    fn test_on_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lectio.db");
        {
            let store = SqliteStore::new(&path).unwrap();
            store.set_default_version("web").unwrap();
            store.save_history(&["grace".to_string()]).unwrap();
        }
        let store = SqliteStore::new(&path).unwrap();
        assert_eq!(store.default_version().unwrap(), Some("web".into()));
        assert_eq!(store.load_history().unwrap(), vec!["grace".to_string()]);
    }
}
