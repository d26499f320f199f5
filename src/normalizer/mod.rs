use html_escape::decode_html_entities;
use serde::Deserialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::app::FetchError;
use crate::domain::{ChapterContent, MatchKind, SearchResult, Verse, VersionDescriptor};

/// Every provider payload is wrapped in a `data` envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ChapterPayload {
    verses: Vec<VersePayload>,
}

#[derive(Debug, Deserialize)]
struct VersePayload {
    number: u16,
    text: String,
}

#[derive(Debug, Deserialize)]
struct VersionPayload {
    id: String,
    name: String,
    #[serde(default)]
    abbreviation: Option<String>,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    results: Vec<SearchHitPayload>,
}

#[derive(Debug, Deserialize)]
struct SearchHitPayload {
    book: String,
    chapter: u16,
    verse: u16,
    text: String,
    #[serde(default, rename = "match")]
    match_kind: Option<MatchKind>,
}

/// Converts raw provider payloads into domain values.
#[derive(Clone)]
pub struct Normalizer;

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn chapter(
        &self,
        version_id: &str,
        book: &str,
        chapter: u16,
        body: &[u8],
    ) -> Result<ChapterContent, FetchError> {
        let payload: Envelope<ChapterPayload> = parse(body)?;

        let mut verses: Vec<Verse> = payload
            .data
            .verses
            .into_iter()
            .filter(|v| v.number > 0)
            .map(|v| Verse {
                number: v.number,
                text: clean_text(&v.text),
            })
            .collect();
        verses.sort_by_key(|v| v.number);
        verses.dedup_by_key(|v| v.number);

        if verses.is_empty() {
            return Err(FetchError::not_found(format!(
                "{} {} has no verses in {}",
                book, chapter, version_id
            )));
        }

        Ok(ChapterContent {
            version_id: version_id.to_string(),
            book: book.to_ascii_uppercase(),
            chapter,
            verses,
        })
    }

    pub fn versions(&self, language: &str, body: &[u8]) -> Result<Vec<VersionDescriptor>, FetchError> {
        let payload: Envelope<Vec<VersionPayload>> = parse(body)?;

        Ok(payload
            .data
            .into_iter()
            .map(|v| {
                let name = decode_html_entities(&v.name).to_string();
                VersionDescriptor {
                    abbreviation: v.abbreviation.unwrap_or_else(|| v.id.to_uppercase()),
                    language: v.language.unwrap_or_else(|| language.to_string()),
                    id: v.id,
                    name,
                    is_default: false,
                }
            })
            .collect())
    }

    pub fn search_results(&self, body: &[u8]) -> Result<Vec<SearchResult>, FetchError> {
        let payload: Envelope<SearchPayload> = parse(body)?;

        Ok(payload
            .data
            .results
            .into_iter()
            .map(|hit| SearchResult {
                book: hit.book.to_ascii_uppercase(),
                chapter: hit.chapter,
                verse: hit.verse,
                text: clean_text(&hit.text),
                match_kind: hit.match_kind.unwrap_or(MatchKind::Partial),
            })
            .collect())
    }
}

fn parse<'a, T: Deserialize<'a>>(body: &'a [u8]) -> Result<T, FetchError> {
    serde_json::from_slice(body)
        .map_err(|e| FetchError::connectivity(format!("malformed provider response: {}", e)))
}

/// Strip markup, decode entities and collapse whitespace in verse text.
pub fn clean_text(raw: &str) -> String {
    let mut stripped = String::with_capacity(raw.len());
    let mut in_tag = false;
    for c in raw.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => stripped.push(c),
            _ => {}
        }
    }
    let decoded = decode_html_entities(&stripped);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fold a query or text for case- and diacritic-insensitive matching.
pub fn fold_query(s: &str) -> String {
    s.trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAPTER_SAMPLE: &str = r#"{
  "data": {
    "verses": [
      {"number": 2, "text": "And the earth was without form, and void;"},
      {"number": 1, "text": "In the <span class=\"wj\">beginning</span> God created the heaven and the earth."},
      {"number": 3, "text": "And God said, Let there be light: &amp; there was light."}
    ]
  }
}"#;

    const VERSIONS_SAMPLE: &str = r#"{
  "data": [
    {"id": "de4e12af7f28f599-02", "name": "King James (Authorised) Version", "abbreviation": "KJV", "language": "en"},
    {"id": "web", "name": "World English Bible"}
  ]
}"#;

    const SEARCH_SAMPLE: &str = r#"{
  "data": {
    "results": [
      {"book": "jhn", "chapter": 3, "verse": 16, "text": "For God so loved the world", "match": "exact"},
      {"book": "ROM", "chapter": 5, "verse": 8, "text": "But God commendeth his love"}
    ]
  }
}"#;

    #[test]
    fn test_parse_chapter_orders_and_cleans_verses() {
        let normalizer = Normalizer::new();
        let content = normalizer
            .chapter("kjv", "gen", 1, CHAPTER_SAMPLE.as_bytes())
            .unwrap();

        assert_eq!(content.book, "GEN");
        assert_eq!(content.verse_count(), 3);
        assert_eq!(content.verses[0].number, 1);
        assert_eq!(
            content.verses[0].text,
            "In the beginning God created the heaven and the earth."
        );
        assert_eq!(
            content.verses[2].text,
            "And God said, Let there be light: & there was light."
        );
    }

    #[test]
    fn test_empty_chapter_is_not_found() {
        let normalizer = Normalizer::new();
        let err = normalizer
            .chapter("kjv", "GEN", 1, br#"{"data": {"verses": []}}"#)
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_malformed_payload_is_retryable() {
        let normalizer = Normalizer::new();
        let err = normalizer
            .chapter("kjv", "GEN", 1, b"<html>gateway timeout</html>")
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_versions_fills_missing_fields() {
        let normalizer = Normalizer::new();
        let versions = normalizer.versions("en", VERSIONS_SAMPLE.as_bytes()).unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].abbreviation, "KJV");
        assert_eq!(versions[1].abbreviation, "WEB");
        assert_eq!(versions[1].language, "en");
    }

    #[test]
    fn test_parse_search_results_keeps_order() {
        let normalizer = Normalizer::new();
        let results = normalizer.search_results(SEARCH_SAMPLE.as_bytes()).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].book, "JHN");
        assert_eq!(results[0].match_kind, MatchKind::Exact);
        assert_eq!(results[1].match_kind, MatchKind::Partial);
    }

    #[test]
    fn test_fold_query() {
        assert_eq!(fold_query("  Jesús   LLORÓ "), "jesus lloro");
        assert_eq!(fold_query("Coração"), "coracao");
        assert_eq!(fold_query("   "), "");
    }
}
