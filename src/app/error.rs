use std::fmt;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LectioError {
    #[error("Invalid reference: {book} {chapter}")]
    InvalidReference { book: String, chapter: u16 },

    #[error("Content fetch failed: {0}")]
    ContentFetch(#[from] FetchError),

    #[error("Could not switch to version {version_id}: {source}")]
    VersionSwitch {
        version_id: String,
        source: FetchError,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl LectioError {
    pub fn invalid_reference(book: &str, chapter: u16) -> Self {
        Self::InvalidReference {
            book: book.to_string(),
            chapter,
        }
    }

    /// The underlying provider failure, for fetch and version-switch errors.
    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            Self::ContentFetch(e) => Some(e),
            Self::VersionSwitch { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.fetch_error().is_some_and(FetchError::is_retryable)
    }
}

pub type Result<T> = std::result::Result<T, LectioError>;

/// Failure classes reported by a content provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Network unreachable, timeout, or a server-side error.
    Connectivity,
    /// The provider asked us to slow down.
    RateLimited { retry_after: Option<Duration> },
    /// The version, book or chapter does not exist on the provider.
    NotFound,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connectivity => write!(f, "connectivity"),
            Self::RateLimited { .. } => write!(f, "rate limited"),
            Self::NotFound => write!(f, "not found"),
        }
    }
}

/// What the UI should offer after a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    RetryNow,
    RetryAfter(Duration),
    ChooseAnother,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Connectivity,
            message: message.into(),
        }
    }

    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self {
            kind: FetchErrorKind::RateLimited { retry_after },
            message: "too many requests".to_string(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::NotFound,
            message: message.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::connectivity(format!("request timed out after {}s", after.as_secs()))
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self.kind, FetchErrorKind::NotFound)
    }

    pub fn retry_action(&self) -> RetryAction {
        match self.kind {
            FetchErrorKind::Connectivity => RetryAction::RetryNow,
            FetchErrorKind::RateLimited {
                retry_after: Some(after),
            } => RetryAction::RetryAfter(after),
            FetchErrorKind::RateLimited { retry_after: None } => {
                RetryAction::RetryAfter(Duration::from_secs(30))
            }
            FetchErrorKind::NotFound => RetryAction::ChooseAnother,
        }
    }

    /// Message suitable for a status bar or dialog.
    pub fn user_message(&self) -> String {
        match &self.kind {
            FetchErrorKind::Connectivity => {
                "Could not reach the Bible service. Check your connection and try again.".into()
            }
            FetchErrorKind::RateLimited {
                retry_after: Some(after),
            } => format!(
                "Too many requests. Please wait {}s before trying again.",
                after.as_secs()
            ),
            FetchErrorKind::RateLimited { retry_after: None } => {
                "Too many requests. Please wait a moment before trying again.".into()
            }
            FetchErrorKind::NotFound => {
                "This text is not available in the selected version. Choose another version."
                    .into()
            }
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            if status == reqwest::StatusCode::NOT_FOUND {
                return Self::not_found(e.to_string());
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Self::rate_limited(None);
            }
        }
        Self::connectivity(e.to_string())
    }
}
