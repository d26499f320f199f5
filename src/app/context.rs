use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use crate::app::error::{LectioError, Result};
use crate::catalog::VersionCatalog;
use crate::config::Config;
use crate::progress::{Clock, ProgressTracker, SystemClock};
use crate::provider::{HttpProvider, SharedProvider};
use crate::reader::{NavigationOutcome, ReadingController};
use crate::search::{SearchHistory, SearchService};
use crate::store::{PositionStore, SqliteStore};

pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub provider: SharedProvider,
    pub catalog: Arc<VersionCatalog>,
    pub tracker: Arc<ProgressTracker>,
    pub reader: Arc<ReadingController>,
    pub search: Arc<SearchService>,
}

impl AppContext {
    pub async fn new(config: Config, db_path: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_path {
            Some(p) => p,
            None => Self::default_db_path()?,
        };

        let store = Arc::new(SqliteStore::new(&db_path)?);
        let provider: SharedProvider = Arc::new(HttpProvider::new(&config.provider)?);
        Ok(Self::with_parts(config, store, provider, Arc::new(SystemClock)).await)
    }

    pub async fn in_memory(config: Config, provider: SharedProvider) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Ok(Self::with_parts(config, store, provider, Arc::new(SystemClock)).await)
    }

    /// Wire the engine around an existing store and provider.
    ///
    /// Starts in the version of the last saved position, falling back to the
    /// stored default and then to `reader.default_version`.
    pub async fn with_parts(
        config: Config,
        store: Arc<SqliteStore>,
        provider: SharedProvider,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let user_id = config.reader.user_id.clone();
        let language = config.provider.language.clone();

        let catalog = Arc::new(VersionCatalog::new(
            provider.clone(),
            store.clone(),
            &config.provider,
        ));
        let tracker = Arc::new(ProgressTracker::start(
            &user_id,
            store.clone(),
            clock,
            &config.sync,
        ));

        let last_version = match store.last_position(&user_id) {
            Ok(p) => p.map(|p| p.version_id),
            Err(e) => {
                warn!("Failed to read last position: {}", e);
                None
            }
        };
        let resumed = match last_version {
            Some(id) => catalog.find_version(&language, &id).await,
            None => None,
        };
        let version = match resumed {
            Some(v) => v,
            None => {
                catalog
                    .default_version(&language, &config.reader.default_version)
                    .await
            }
        };

        let reader = Arc::new(
            ReadingController::new(catalog.clone(), tracker.clone(), &config.reader, version)
                .with_position_store(store.clone()),
        );
        let search = Arc::new(SearchService::new(
            provider.clone(),
            SearchHistory::load(store.clone()),
            config.provider.timeout(),
        ));

        Self {
            config,
            store,
            provider,
            catalog,
            tracker,
            reader,
            search,
        }
    }

    /// Reopen the last saved position, if there is one.
    pub async fn resume(&self) -> Result<Option<NavigationOutcome>> {
        let position = self.store.last_position(&self.config.reader.user_id)?;
        match position {
            Some(p) => Ok(Some(self.reader.navigate_to_chapter(p.chapter_ref()).await?)),
            None => Ok(None),
        }
    }

    /// End the reading session and wait for progress to be written.
    pub async fn shutdown(&self) {
        self.tracker.shutdown().await;
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| LectioError::Config("Could not find data directory".into()))?;
        let lectio_dir = data_dir.join("lectio");
        std::fs::create_dir_all(&lectio_dir)?;
        Ok(lectio_dir.join("lectio.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChapterRef, VersionDescriptor};
    use crate::provider::MemoryProvider;
    use crate::store::ProgressStore;

    fn provider() -> SharedProvider {
        Arc::new(MemoryProvider::synthetic(&[
            VersionDescriptor::new("kjv", "King James Version", "KJV", "en"),
            VersionDescriptor::new("web", "World English Bible", "WEB", "en"),
        ]))
    }

    async fn context(store: Arc<SqliteStore>) -> AppContext {
        let mut config = Config::default();
        config.reader.prefetch_adjacent = false;
        AppContext::with_parts(config, store, provider(), Arc::new(SystemClock)).await
    }

    #[tokio::test]
    async fn test_fresh_context_uses_configured_version() {
        let ctx = AppContext::in_memory(Config::default(), provider()).await.unwrap();
        assert_eq!(ctx.reader.current_version().id, "kjv");
        assert!(ctx.resume().await.unwrap().is_none());
        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_stored_default_wins_over_config() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store.set_default_version("web").unwrap();

        let ctx = context(store).await;
        assert_eq!(ctx.reader.current_version().id, "web");
        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_resume_reopens_last_position_and_version() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        {
            let ctx = context(store.clone()).await;
            let web = ctx.catalog.find_version("en", "web").await.unwrap();
            ctx.reader
                .navigate_to_chapter(ChapterRef::new("ACT", 2))
                .await
                .unwrap();
            ctx.reader.set_current_version(web).await.unwrap();
            ctx.reader.go_to_next_chapter().await.unwrap();
            ctx.shutdown().await;
        }

        let ctx = context(store.clone()).await;
        assert_eq!(ctx.reader.current_version().id, "web");
        assert!(ctx.resume().await.unwrap().is_some());
        let position = ctx.reader.position().unwrap();
        assert_eq!((position.book.as_str(), position.chapter), ("ACT", 3));

        let stats = store.read_stats("local").unwrap().unwrap();
        assert!(stats.is_chapter_read("ACT", 2));
        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_saves_the_open_session() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let ctx = context(store.clone()).await;
        ctx.reader
            .navigate_to_chapter(ChapterRef::new("MRK", 4))
            .await
            .unwrap();
        assert!(store.read_stats("local").unwrap().is_none());

        ctx.shutdown().await;
        let stats = store.read_stats("local").unwrap().unwrap();
        assert!(stats
            .reading_time_ms
            .contains_key(&crate::domain::ChapterId::new("MRK", 4)));
    }
}
