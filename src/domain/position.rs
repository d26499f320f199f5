use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A `(book, chapter)` pair, serialized as `"GEN.1"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ChapterId {
    pub book: String,
    pub chapter: u16,
}

impl ChapterId {
    pub fn new(book: &str, chapter: u16) -> Self {
        Self {
            book: book.to_ascii_uppercase(),
            chapter,
        }
    }

    pub fn matches(&self, book: &str, chapter: u16) -> bool {
        self.chapter == chapter && self.book.eq_ignore_ascii_case(book)
    }
}

impl fmt::Display for ChapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.book, self.chapter)
    }
}

impl FromStr for ChapterId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (book, chapter) = s
            .split_once('.')
            .ok_or_else(|| format!("Invalid chapter id: {}", s))?;
        let chapter = chapter
            .parse::<u16>()
            .map_err(|_| format!("Invalid chapter number in {}", s))?;
        Ok(Self::new(book, chapter))
    }
}

impl From<ChapterId> for String {
    fn from(id: ChapterId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ChapterId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A navigation request: a chapter and an optional verse to target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRef {
    pub book: String,
    pub chapter: u16,
    pub verse: Option<u16>,
}

impl ChapterRef {
    pub fn new(book: &str, chapter: u16) -> Self {
        Self {
            book: book.to_ascii_uppercase(),
            chapter,
            verse: None,
        }
    }

    pub fn with_verse(mut self, verse: u16) -> Self {
        self.verse = Some(verse);
        self
    }

    pub fn chapter_id(&self) -> ChapterId {
        ChapterId::new(&self.book, self.chapter)
    }
}

impl From<ChapterId> for ChapterRef {
    fn from(id: ChapterId) -> Self {
        Self {
            book: id.book,
            chapter: id.chapter,
            verse: None,
        }
    }
}

impl fmt::Display for ChapterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.verse {
            Some(v) => write!(f, "{} {}:{}", self.book, self.chapter, v),
            None => write!(f, "{} {}", self.book, self.chapter),
        }
    }
}

/// The committed cursor of the reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingPosition {
    pub version_id: String,
    pub book: String,
    pub chapter: u16,
    pub verse: Option<u16>,
}

impl ReadingPosition {
    pub fn chapter_id(&self) -> ChapterId {
        ChapterId::new(&self.book, self.chapter)
    }

    pub fn chapter_ref(&self) -> ChapterRef {
        ChapterRef {
            book: self.book.clone(),
            chapter: self.chapter,
            verse: self.verse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_id_round_trips_through_string() {
        let id = ChapterId::new("gen", 3);
        assert_eq!(id.to_string(), "GEN.3");
        assert_eq!("GEN.3".parse::<ChapterId>().unwrap(), id);
        assert!("GEN".parse::<ChapterId>().is_err());
        assert!("GEN.x".parse::<ChapterId>().is_err());
    }

    #[test]
    fn test_chapter_id_serializes_as_map_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(ChapterId::new("JHN", 3), 42u64);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"JHN.3":42}"#);
    }

    #[test]
    fn test_chapter_ref_display() {
        assert_eq!(ChapterRef::new("jhn", 3).to_string(), "JHN 3");
        assert_eq!(ChapterRef::new("JHN", 3).with_verse(16).to_string(), "JHN 3:16");
    }
}
