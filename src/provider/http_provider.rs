use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use url::Url;

use crate::app::{FetchError, LectioError, Result};
use crate::config::ProviderConfig;
use crate::domain::{ChapterContent, SearchResult, VersionDescriptor};
use crate::normalizer::Normalizer;
use crate::provider::{ContentProvider, ProviderResult};

/// Content provider backed by a JSON REST API.
///
/// Endpoints, relative to the configured base URL:
/// - `versions?language=xx`
/// - `versions/{id}/chapters/{BOOK}.{chapter}`
/// - `search?query=...&limit=N`
pub struct HttpProvider {
    client: Client,
    base_url: Url,
    normalizer: Normalizer,
}

impl HttpProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(ref key) = config.api_key {
            let value = HeaderValue::from_str(key)
                .map_err(|_| LectioError::Config("API key is not a valid header value".into()))?;
            headers.insert("api-key", value);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true)
            .user_agent(concat!("lectio/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| LectioError::Other(format!("Failed to build HTTP client: {}", e)))?;

        // A trailing slash keeps `join` from dropping the last path segment.
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| LectioError::Config(format!("Invalid provider base_url: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            normalizer: Normalizer::new(),
        })
    }

    fn endpoint(&self, path: &str) -> ProviderResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| FetchError::connectivity(format!("Invalid request URL: {}", e)))
    }

    async fn get(&self, url: Url) -> ProviderResult<Vec<u8>> {
        tracing::debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let response = check_status(response)?;
        Ok(response.bytes().await?.to_vec())
    }
}

fn check_status(response: Response) -> ProviderResult<Response> {
    match response.status() {
        StatusCode::NOT_FOUND => Err(FetchError::not_found(response.url().path().to_string())),
        StatusCode::TOO_MANY_REQUESTS => Err(FetchError::rate_limited(retry_after(&response))),
        _ => Ok(response.error_for_status()?),
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[async_trait]
impl ContentProvider for HttpProvider {
    async fn fetch_chapter(
        &self,
        version_id: &str,
        book: &str,
        chapter: u16,
    ) -> ProviderResult<ChapterContent> {
        let url = self.endpoint(&format!(
            "versions/{}/chapters/{}.{}",
            version_id,
            book.to_ascii_uppercase(),
            chapter
        ))?;
        let body = self.get(url).await?;
        self.normalizer.chapter(version_id, book, chapter, &body)
    }

    async fn fetch_versions(&self, language: &str) -> ProviderResult<Vec<VersionDescriptor>> {
        let mut url = self.endpoint("versions")?;
        url.query_pairs_mut().append_pair("language", language);
        let body = self.get(url).await?;
        self.normalizer.versions(language, &body)
    }

    async fn search(&self, query: &str, limit: usize) -> ProviderResult<Vec<SearchResult>> {
        let mut url = self.endpoint("search")?;
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("limit", &limit.to_string());
        let body = self.get(url).await?;
        let mut results = self.normalizer.search_results(&body)?;
        results.truncate(limit);
        Ok(results)
    }
}
