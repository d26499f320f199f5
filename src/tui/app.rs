use std::time::Instant;

use ratatui::widgets::ListState;

use crate::domain::{ProgressStats, SearchResult, VersionDescriptor};
use crate::reader::{ReaderState, ScrollTarget, SwipeEvent};
use crate::search::SearchState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Reading,
    Search,
    Versions,
    Stats,
}

pub const PAGE_SIZE: u16 = 10;

/// Swipe units per terminal column dragged.
pub const UNITS_PER_COLUMN: f64 = 10.0;

/// A mouse drag in progress, turned into swipe translation and velocity.
#[derive(Debug, Clone, Copy)]
pub struct PointerDrag {
    pub start_column: u16,
    pub started_at: Instant,
}

impl PointerDrag {
    pub fn start(column: u16, now: Instant) -> Self {
        Self {
            start_column: column,
            started_at: now,
        }
    }

    pub fn translation(&self, column: u16) -> f64 {
        (column as f64 - self.start_column as f64) * UNITS_PER_COLUMN
    }

    pub fn finish(&self, column: u16, now: Instant) -> SwipeEvent {
        let translation_x = self.translation(column);
        let secs = now.saturating_duration_since(self.started_at).as_secs_f64();
        let velocity_x = if secs > 0.0 { translation_x / secs } else { 0.0 };
        SwipeEvent::new(translation_x, velocity_x)
    }
}

pub struct TuiApp {
    pub mode: Mode,
    pub reader: ReaderState,
    pub stats: ProgressStats,
    pub scroll: u16,
    pub viewport_height: u16,
    pub should_quit: bool,
    pub status_message: Option<String>,
    pub drag: Option<PointerDrag>,
    // Search overlay
    pub search_input: String,
    pub search_editing: bool,
    pub search: SearchState,
    pub history: Vec<String>,
    pub search_list_state: ListState,
    // Version picker
    pub versions: Vec<VersionDescriptor>,
    pub version_list_state: ListState,
}

impl TuiApp {
    pub fn new(reader: ReaderState, stats: ProgressStats) -> Self {
        Self {
            mode: Mode::Reading,
            reader,
            stats,
            scroll: 0,
            viewport_height: 20,
            should_quit: false,
            status_message: None,
            drag: None,
            search_input: String::new(),
            search_editing: false,
            search: SearchState::default(),
            history: Vec::new(),
            search_list_state: ListState::default(),
            versions: Vec::new(),
            version_list_state: ListState::default(),
        }
    }

    /// Take a new reader state, jumping the scroll when its target moved.
    pub fn update_reader(&mut self, state: ReaderState) {
        let jumped = state.viewport.scroll != self.reader.viewport.scroll
            || state.position != self.reader.position
            || !same_content(&state, &self.reader);
        if jumped {
            self.scroll = match state.viewport.scroll {
                ScrollTarget::Top => 0,
                ScrollTarget::Verse { index, .. } => {
                    (index as u16).saturating_sub(self.viewport_height / 2)
                }
            };
        }
        self.reader = state;
    }

    pub fn scroll_down(&mut self, by: u16) {
        let max = self.reader.verse_count().saturating_sub(1) as u16;
        self.scroll = self.scroll.saturating_add(by).min(max);
    }

    pub fn scroll_up(&mut self, by: u16) {
        self.scroll = self.scroll.saturating_sub(by);
    }

    /// Entries shown in the search list: results, or history before a search.
    pub fn search_entries_len(&self) -> usize {
        if self.search.results.is_empty() && self.search.last_query.is_none() {
            self.history.len()
        } else {
            self.search.results.len()
        }
    }

    pub fn showing_history(&self) -> bool {
        self.search.results.is_empty() && self.search.last_query.is_none()
    }

    pub fn selected_result(&self) -> Option<&SearchResult> {
        self.search_list_state
            .selected()
            .and_then(|i| self.search.results.get(i))
    }

    pub fn selected_history(&self) -> Option<&String> {
        self.search_list_state
            .selected()
            .and_then(|i| self.history.get(i))
    }

    pub fn selected_version(&self) -> Option<&VersionDescriptor> {
        self.version_list_state
            .selected()
            .and_then(|i| self.versions.get(i))
    }

    pub fn move_selection(&mut self, delta: isize) {
        let (len, state) = match self.mode {
            Mode::Search => (self.search_entries_len(), &mut self.search_list_state),
            Mode::Versions => (self.versions.len(), &mut self.version_list_state),
            _ => return,
        };
        if len == 0 {
            state.select(None);
            return;
        }
        let current = state.selected().unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, len as isize - 1);
        state.select(Some(next as usize));
    }

    pub fn open_search(&mut self, history: Vec<String>) {
        self.mode = Mode::Search;
        self.search_editing = true;
        self.history = history;
        let selected = (self.search_entries_len() > 0).then_some(0);
        self.search_list_state.select(selected);
    }

    pub fn set_search(&mut self, search: SearchState) {
        self.search = search;
        let selected = (self.search_entries_len() > 0).then_some(0);
        self.search_list_state.select(selected);
    }

    pub fn open_versions(&mut self, versions: Vec<VersionDescriptor>) {
        let current = versions
            .iter()
            .position(|v| v.id == self.reader.version.id)
            .or(if versions.is_empty() { None } else { Some(0) });
        self.versions = versions;
        self.version_list_state.select(current);
        self.mode = Mode::Versions;
    }

    pub fn close_overlay(&mut self) {
        self.mode = Mode::Reading;
        self.search_editing = false;
    }

    pub fn set_status(&mut self, message: String) {
        self.status_message = Some(message);
    }

    pub fn clear_status(&mut self) {
        self.status_message = None;
    }
}

fn same_content(a: &ReaderState, b: &ReaderState) -> bool {
    match (&a.content, &b.content) {
        (Some(x), Some(y)) => std::sync::Arc::ptr_eq(x, y),
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChapterContent, ReadingPosition, Verse};
    use std::sync::Arc;
    use std::time::Duration;

    fn reader_with_verses(n: u16) -> ReaderState {
        let mut state = ReaderState::new(VersionDescriptor::new("kjv", "King James", "KJV", "en"));
        state.content = Some(Arc::new(ChapterContent {
            version_id: "kjv".into(),
            book: "PSA".into(),
            chapter: 119,
            verses: (1..=n)
                .map(|number| Verse {
                    number,
                    text: format!("verse {}", number),
                })
                .collect(),
        }));
        state.position = Some(ReadingPosition {
            version_id: "kjv".into(),
            book: "PSA".into(),
            chapter: 119,
            verse: None,
        });
        state
    }

    #[test]
    fn test_pointer_drag_builds_swipe() {
        let start = Instant::now();
        let drag = PointerDrag::start(50, start);
        assert_eq!(drag.translation(35), -150.0);

        let swipe = drag.finish(35, start + Duration::from_millis(500));
        assert_eq!(swipe.translation_x, -150.0);
        assert_eq!(swipe.velocity_x, -300.0);
    }

    #[test]
    fn test_scroll_jumps_to_verse_target() {
        let mut app = TuiApp::new(reader_with_verses(1), ProgressStats::default());
        app.viewport_height = 10;

        let mut state = reader_with_verses(176);
        state.viewport.scroll = ScrollTarget::Verse {
            verse: 105,
            index: 104,
        };
        app.update_reader(state.clone());
        assert_eq!(app.scroll, 99);

        app.scroll_down(3);
        app.update_reader(state);
        assert_eq!(app.scroll, 102);
    }

    #[test]
    fn test_scroll_is_bounded() {
        let mut app = TuiApp::new(reader_with_verses(5), ProgressStats::default());
        app.scroll_down(PAGE_SIZE);
        assert_eq!(app.scroll, 4);
        app.scroll_up(PAGE_SIZE);
        assert_eq!(app.scroll, 0);
    }

    #[test]
    fn test_selection_moves_within_bounds() {
        let mut app = TuiApp::new(reader_with_verses(1), ProgressStats::default());
        app.open_versions(vec![
            VersionDescriptor::new("web", "World English Bible", "WEB", "en"),
            VersionDescriptor::new("kjv", "King James", "KJV", "en"),
        ]);
        assert_eq!(app.selected_version().unwrap().id, "kjv");

        app.move_selection(5);
        assert_eq!(app.version_list_state.selected(), Some(1));
        app.move_selection(-5);
        assert_eq!(app.selected_version().unwrap().id, "web");
    }

    #[test]
    fn test_search_list_shows_history_until_a_search_runs() {
        let mut app = TuiApp::new(reader_with_verses(1), ProgressStats::default());
        app.open_search(vec!["grace".into(), "hope".into()]);
        assert!(app.showing_history());
        assert_eq!(app.selected_history().map(String::as_str), Some("grace"));

        app.set_search(SearchState {
            last_query: Some("grace".into()),
            ..SearchState::default()
        });
        assert!(!app.showing_history());
        assert_eq!(app.search_entries_len(), 0);
    }
}
