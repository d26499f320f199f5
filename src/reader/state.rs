use std::sync::Arc;

use crate::app::FetchError;
use crate::domain::{ChapterContent, ChapterRef, ReadingPosition, VersionDescriptor};
use crate::reader::highlight::VerseHighlight;

/// A request the controller is working on, kept so it can be retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingRequest {
    Navigate(ChapterRef),
    SwitchVersion(VersionDescriptor),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderFailure {
    pub error: FetchError,
    pub request: PendingRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReaderStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    /// The last request failed; the previous content is still shown.
    Error(ReaderFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollTarget {
    #[default]
    Top,
    /// Centre the verse at render position `index`
    Verse { verse: u16, index: usize },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Viewport {
    pub scroll: ScrollTarget,
    pub drag_offset: f64,
    pub highlight: Option<VerseHighlight>,
}

/// Everything the UI needs to draw the reader.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderState {
    pub status: ReaderStatus,
    pub version: VersionDescriptor,
    pub position: Option<ReadingPosition>,
    pub content: Option<Arc<ChapterContent>>,
    pub viewport: Viewport,
    pub pending: Option<PendingRequest>,
    /// Bumped by every request; only the latest may commit.
    pub generation: u64,
}

impl ReaderState {
    pub fn new(version: VersionDescriptor) -> Self {
        Self {
            status: ReaderStatus::Idle,
            version,
            position: None,
            content: None,
            viewport: Viewport::default(),
            pending: None,
            generation: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == ReaderStatus::Loading
    }

    pub fn failure(&self) -> Option<&ReaderFailure> {
        match &self.status {
            ReaderStatus::Error(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn verse_count(&self) -> usize {
        self.content.as_ref().map_or(0, |c| c.verse_count())
    }

    pub fn title(&self) -> String {
        match &self.position {
            Some(p) => format!("{} ({})", p.chapter_ref(), self.version.abbreviation),
            None => self.version.display_name(),
        }
    }
}
