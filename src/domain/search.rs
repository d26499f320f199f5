use serde::{Deserialize, Serialize};

use crate::domain::position::ChapterRef;

/// How a result matched the query. Display only; never used for ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Partial,
    Reference,
}

impl MatchKind {
    pub fn label(self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Partial => "partial",
            MatchKind::Reference => "reference",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub book: String,
    pub chapter: u16,
    pub verse: u16,
    pub text: String,
    pub match_kind: MatchKind,
}

impl SearchResult {
    pub fn chapter_ref(&self) -> ChapterRef {
        ChapterRef::new(&self.book, self.chapter).with_verse(self.verse)
    }

    pub fn display_reference(&self) -> String {
        let name = crate::domain::canon::find(&self.book)
            .map(|b| b.name)
            .unwrap_or(self.book.as_str());
        format!("{} {}:{}", name, self.chapter, self.verse)
    }
}
