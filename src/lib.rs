//! # Lectio
//!
//! A Bible reading engine: keeps track of where you are in the text, turns
//! chapters on gestures, times each chapter and keeps reading statistics.
//!
//! ## Architecture
//!
//! ```text
//! Provider → Catalog (cache) → Reader → Progress → Store
//!                    ↑
//!                  Search
//! ```
//!
//! - [`reader`]: committed position, stale-response guard, swipe and highlight
//! - [`progress`]: reading sessions, completion stats, background persistence
//! - [`catalog`]: version listing with fallback, chapter cache
//! - [`search`]: verse search and search history
//!
//! ## Quick Start
//!
//! ```bash
//! # Read a chapter
//! lectio read JHN 3 --verse 16
//!
//! # Finish it and move on
//! lectio next
//!
//! # Launch TUI
//! lectio tui
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together all components:
/// store, provider, catalog, tracker, reader and search.
pub mod app;

/// Version catalog and chapter content cache.
pub mod catalog;

/// Command-line interface using clap.
///
/// Defines the CLI structure and subcommands:
/// - `read <book> <chapter>` - Print a chapter
/// - `next` / `prev` - Move from the last position
/// - `versions`, `default-version <id>` - Version catalog
/// - `search <query>`, `history` - Verse search
/// - `stats`, `books` - Progress
/// - `tui` - Launch the TUI
pub mod cli;

/// Configuration management.
///
/// Loads from `~/.config/lectio/config.toml`, supporting provider settings,
/// reader thresholds, sync backoff, colors and keybindings.
pub mod config;

/// Core domain models.
///
/// - [`canon`](domain::canon): the 66 books and their chapter counts
/// - [`ReadingPosition`](domain::ReadingPosition), [`ChapterContent`](domain::ChapterContent)
/// - [`ProgressStats`](domain::ProgressStats): completion and time statistics
pub mod domain;

/// Provider payload parsing and text folding.
pub mod normalizer;

/// Reading sessions and progress statistics.
pub mod progress;

/// Content providers.
///
/// - [`ContentProvider`](provider::ContentProvider): Async trait for text, versions and search
/// - [`HttpProvider`](provider::HttpProvider): reqwest-based implementation
/// - [`MemoryProvider`](provider::MemoryProvider): in-memory implementation
pub mod provider;

/// Reading position controller.
pub mod reader;

/// Verse search and history.
pub mod search;

/// SQLite persistence layer.
///
/// - [`ProgressStore`](store::ProgressStore), [`HistoryStore`](store::HistoryStore),
///   [`PositionStore`](store::PositionStore): storage ports
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;

/// Terminal user interface.
///
/// A single reading pane with search, version and stats overlays.
/// Keybindings: n/p turn chapters, j/k scroll, / searches, v picks a
/// version, s shows stats, r retries a failed load, q quits. Dragging with
/// the mouse swipes between chapters.
pub mod tui;
