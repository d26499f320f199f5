pub mod http_provider;
pub mod memory;

use async_trait::async_trait;

use crate::app::FetchError;
use crate::domain::{ChapterContent, SearchResult, VersionDescriptor};

pub use http_provider::HttpProvider;
pub use memory::MemoryProvider;

pub type ProviderResult<T> = std::result::Result<T, FetchError>;

/// Source of Bible text, version catalogs and verse search.
#[async_trait]
pub trait ContentProvider {
    async fn fetch_chapter(
        &self,
        version_id: &str,
        book: &str,
        chapter: u16,
    ) -> ProviderResult<ChapterContent>;

    async fn fetch_versions(&self, language: &str) -> ProviderResult<Vec<VersionDescriptor>>;

    /// Search verse text. `query` is already folded for case and diacritics;
    /// results come back in provider order.
    async fn search(&self, query: &str, limit: usize) -> ProviderResult<Vec<SearchResult>>;
}

pub type SharedProvider = std::sync::Arc<dyn ContentProvider + Send + Sync>;
