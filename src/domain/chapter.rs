use serde::{Deserialize, Serialize};

use crate::domain::position::ChapterId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verse {
    pub number: u16,
    pub text: String,
}

/// Cache key for chapter content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChapterKey {
    pub version_id: String,
    pub book: String,
    pub chapter: u16,
}

impl ChapterKey {
    pub fn new(version_id: &str, book: &str, chapter: u16) -> Self {
        Self {
            version_id: version_id.to_string(),
            book: book.to_ascii_uppercase(),
            chapter,
        }
    }
}

/// The text of one chapter in one version. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterContent {
    pub version_id: String,
    pub book: String,
    pub chapter: u16,
    pub verses: Vec<Verse>,
}

impl ChapterContent {
    pub fn key(&self) -> ChapterKey {
        ChapterKey::new(&self.version_id, &self.book, self.chapter)
    }

    pub fn chapter_id(&self) -> ChapterId {
        ChapterId::new(&self.book, self.chapter)
    }

    pub fn verse_count(&self) -> usize {
        self.verses.len()
    }

    pub fn verse(&self, number: u16) -> Option<&Verse> {
        self.verses.iter().find(|v| v.number == number)
    }

    /// Render index of a verse: its position in the ordered verse list.
    pub fn verse_index(&self, number: u16) -> Option<usize> {
        self.verses.iter().position(|v| v.number == number)
    }
}
