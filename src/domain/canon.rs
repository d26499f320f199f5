//! The fixed, ordered canon of 66 books.
//!
//! Book codes follow the three-character USFM/OSIS style (`GEN`, `1SA`, `REV`)
//! and are independent of display language.

use serde::{Deserialize, Serialize};

use crate::app::{LectioError, Result};
use crate::domain::position::ChapterId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Testament {
    Old,
    New,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonBook {
    pub code: &'static str,
    pub name: &'static str,
    pub chapters: u16,
    pub testament: Testament,
}

const fn book(code: &'static str, name: &'static str, chapters: u16, testament: Testament) -> CanonBook {
    CanonBook {
        code,
        name,
        chapters,
        testament,
    }
}

use Testament::{New, Old};

pub static CANON: [CanonBook; 66] = [
    book("GEN", "Genesis", 50, Old),
    book("EXO", "Exodus", 40, Old),
    book("LEV", "Leviticus", 27, Old),
    book("NUM", "Numbers", 36, Old),
    book("DEU", "Deuteronomy", 34, Old),
    book("JOS", "Joshua", 24, Old),
    book("JDG", "Judges", 21, Old),
    book("RUT", "Ruth", 4, Old),
    book("1SA", "1 Samuel", 31, Old),
    book("2SA", "2 Samuel", 24, Old),
    book("1KI", "1 Kings", 22, Old),
    book("2KI", "2 Kings", 25, Old),
    book("1CH", "1 Chronicles", 29, Old),
    book("2CH", "2 Chronicles", 36, Old),
    book("EZR", "Ezra", 10, Old),
    book("NEH", "Nehemiah", 13, Old),
    book("EST", "Esther", 10, Old),
    book("JOB", "Job", 42, Old),
    book("PSA", "Psalms", 150, Old),
    book("PRO", "Proverbs", 31, Old),
    book("ECC", "Ecclesiastes", 12, Old),
    book("SNG", "Song of Songs", 8, Old),
    book("ISA", "Isaiah", 66, Old),
    book("JER", "Jeremiah", 52, Old),
    book("LAM", "Lamentations", 5, Old),
    book("EZK", "Ezekiel", 48, Old),
    book("DAN", "Daniel", 12, Old),
    book("HOS", "Hosea", 14, Old),
    book("JOL", "Joel", 3, Old),
    book("AMO", "Amos", 9, Old),
    book("OBA", "Obadiah", 1, Old),
    book("JON", "Jonah", 4, Old),
    book("MIC", "Micah", 7, Old),
    book("NAM", "Nahum", 3, Old),
    book("HAB", "Habakkuk", 3, Old),
    book("ZEP", "Zephaniah", 3, Old),
    book("HAG", "Haggai", 2, Old),
    book("ZEC", "Zechariah", 14, Old),
    book("MAL", "Malachi", 4, Old),
    book("MAT", "Matthew", 28, New),
    book("MRK", "Mark", 16, New),
    book("LUK", "Luke", 24, New),
    book("JHN", "John", 21, New),
    book("ACT", "Acts", 28, New),
    book("ROM", "Romans", 16, New),
    book("1CO", "1 Corinthians", 16, New),
    book("2CO", "2 Corinthians", 13, New),
    book("GAL", "Galatians", 6, New),
    book("EPH", "Ephesians", 6, New),
    book("PHP", "Philippians", 4, New),
    book("COL", "Colossians", 4, New),
    book("1TH", "1 Thessalonians", 5, New),
    book("2TH", "2 Thessalonians", 3, New),
    book("1TI", "1 Timothy", 6, New),
    book("2TI", "2 Timothy", 4, New),
    book("TIT", "Titus", 3, New),
    book("PHM", "Philemon", 1, New),
    book("HEB", "Hebrews", 13, New),
    book("JAS", "James", 5, New),
    book("1PE", "1 Peter", 5, New),
    book("2PE", "2 Peter", 3, New),
    book("1JN", "1 John", 5, New),
    book("2JN", "2 John", 1, New),
    book("3JN", "3 John", 1, New),
    book("JUD", "Jude", 1, New),
    book("REV", "Revelation", 22, New),
];

/// Look up a book by code, ignoring ASCII case.
pub fn find(code: &str) -> Option<&'static CanonBook> {
    CANON.iter().find(|b| b.code.eq_ignore_ascii_case(code.trim()))
}

pub fn index_of(code: &str) -> Option<usize> {
    CANON
        .iter()
        .position(|b| b.code.eq_ignore_ascii_case(code.trim()))
}

pub fn books(testament: Testament) -> impl Iterator<Item = &'static CanonBook> {
    CANON.iter().filter(move |b| b.testament == testament)
}

pub fn total_chapters() -> usize {
    CANON.iter().map(|b| b.chapters as usize).sum()
}

/// Resolve `(book, chapter)` against the canon.
pub fn validate(book: &str, chapter: u16) -> Result<&'static CanonBook> {
    match find(book) {
        Some(b) if (1..=b.chapters).contains(&chapter) => Ok(b),
        _ => Err(LectioError::invalid_reference(book, chapter)),
    }
}

pub fn first_chapter() -> ChapterId {
    ChapterId::new(CANON[0].code, 1)
}

/// The chapter after `(book, chapter)` in canonical order, or `None` at the
/// end of Revelation.
pub fn next_chapter(book: &str, chapter: u16) -> Option<ChapterId> {
    let idx = index_of(book)?;
    let current = &CANON[idx];
    if chapter < current.chapters {
        return Some(ChapterId::new(current.code, chapter + 1));
    }
    CANON.get(idx + 1).map(|next| ChapterId::new(next.code, 1))
}

/// The chapter before `(book, chapter)` in canonical order, or `None` at
/// Genesis 1.
pub fn previous_chapter(book: &str, chapter: u16) -> Option<ChapterId> {
    let idx = index_of(book)?;
    let current = &CANON[idx];
    if chapter > 1 {
        return Some(ChapterId::new(current.code, (chapter - 1).min(current.chapters)));
    }
    idx.checked_sub(1)
        .map(|prev| ChapterId::new(CANON[prev].code, CANON[prev].chapters))
}

/// Iterate every chapter of the canon in order.
pub fn all_chapters() -> impl Iterator<Item = ChapterId> {
    CANON
        .iter()
        .flat_map(|b| (1..=b.chapters).map(move |c| ChapterId::new(b.code, c)))
}

/// Position of a chapter in canonical order, used for sorting.
pub fn ordinal(book: &str, chapter: u16) -> Option<usize> {
    let idx = index_of(book)?;
    let before: usize = CANON[..idx].iter().map(|b| b.chapters as usize).sum();
    Some(before + chapter as usize)
}
