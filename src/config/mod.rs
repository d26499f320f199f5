//! Configuration management for Lectio.
//!
//! Configuration is read from `~/.config/lectio/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

pub mod colors;
pub mod keybindings;

pub use colors::ColorConfig;
pub use keybindings::KeybindingConfig;

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub reader: ReaderConfig,
    pub search: SearchConfig,
    pub sync: SyncConfig,
    pub colors: ColorConfig,
    pub keybindings: KeybindingConfig,
}

/// Content provider connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the Bible content API
    pub base_url: String,
    /// Sent as the `api-key` header when set
    pub api_key: Option<String>,
    /// Language used when listing versions
    pub language: String,
    /// Upper bound for any single provider request, in seconds (default: 15)
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.lectio.example/v1/".to_string(),
            api_key: None,
            language: "en".to_string(),
            timeout_secs: 15,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Reading behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Key under which progress is stored
    pub user_id: String,
    /// Version used when no default has been chosen yet
    pub default_version: String,
    /// Horizontal drag distance that turns a chapter (default: 100)
    pub swipe_distance_threshold: f64,
    /// Release velocity that turns a chapter, units per second (default: 500)
    pub swipe_velocity_threshold: f64,
    /// Warm the cache with the neighbouring chapters after each load
    pub prefetch_adjacent: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            user_id: "local".to_string(),
            default_version: "kjv".to_string(),
            swipe_distance_threshold: 100.0,
            swipe_velocity_threshold: 500.0,
            prefetch_adjacent: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of results per query (default: 50)
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { max_results: 50 }
    }
}

/// Background persistence of progress statistics.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// First retry delay after a failed write, in milliseconds (default: 1000)
    pub retry_initial_ms: u64,
    /// Upper bound for the retry delay, in milliseconds (default: 60000)
    pub retry_max_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_initial_ms: 1_000,
            retry_max_ms: 60_000,
        }
    }
}

impl SyncConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_initial_ms.max(1))
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_max_ms.max(self.retry_initial_ms).max(1))
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.clone(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/lectio/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("lectio").join("config.toml"))
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.clone(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# Lectio Configuration

[provider]
# Bible content API
base_url = "https://api.lectio.example/v1/"
# api_key = "your-key"

# Language used when listing versions
language = "en"

# Request timeout in seconds
timeout_secs = 15

[reader]
# Progress is stored under this id
user_id = "local"

# Version used until a default is chosen with `lectio default-version`
default_version = "kjv"

# A horizontal swipe turns the chapter past either threshold
swipe_distance_threshold = 100.0
swipe_velocity_threshold = 500.0

# Load the next and previous chapters in the background
prefetch_adjacent = true

[search]
max_results = 50

[sync]
# Retry delays for saving progress, in milliseconds
retry_initial_ms = 1000
retry_max_ms = 60000

[colors]
active_border = "Cyan"
inactive_border = "DarkGray"
selection_bg = "Cyan"
selection_fg = "Black"
verse_number = "Yellow"
highlight_bg = "LightYellow"
highlight_fg = "Black"
read_marker = "Green"
error_fg = "LightRed"
status_fg = "White"
status_bg = "DarkGray"

[keybindings]
quit = ["q", "Ctrl+c"]
next_chapter = ["n", "Right"]
prev_chapter = ["p", "Left"]
scroll_down = ["j", "Down"]
scroll_up = ["k", "Up"]
page_down = ["PageDown", "Space"]
page_up = ["PageUp"]
search = ["/"]
versions = ["v"]
stats = ["s"]
retry = ["r"]
set_default_version = ["d"]
select = ["Enter"]
cancel = ["Esc"]
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_deserializes() {
        let content = Config::default_config_content();
        let config: Config = toml::from_str(&content).expect("Default config should be valid TOML");

        assert_eq!(config.provider.timeout_secs, 15);
        assert_eq!(config.reader.swipe_distance_threshold, 100.0);
        assert_eq!(config.colors.active_border, ratatui::style::Color::Cyan);
        assert_eq!(config.keybindings.quit, vec!["q", "Ctrl+c"]);
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[provider]
base_url = "https://bible.example.org/"
timeout_secs = 5

[reader]
prefetch_adjacent = false
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        assert_eq!(config.provider.base_url, "https://bible.example.org/");
        assert_eq!(config.provider.timeout(), Duration::from_secs(5));
        assert_eq!(config.provider.language, "en");
        assert!(!config.reader.prefetch_adjacent);
        assert_eq!(config.reader.swipe_velocity_threshold, 500.0);
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");

        assert_eq!(config.reader.user_id, "local");
        assert_eq!(config.search.max_results, 50);
        assert_eq!(config.sync.initial_backoff(), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_bounds_are_sane() {
        let sync = SyncConfig {
            retry_initial_ms: 5_000,
            retry_max_ms: 10,
        };
        assert!(sync.max_backoff() >= sync.initial_backoff());
    }

    #[test]
    fn test_load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[reader\nuser_id = 1").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
