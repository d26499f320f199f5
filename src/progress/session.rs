use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::ChapterId;

/// The chapter currently being read and when reading started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingSession {
    pub chapter: ChapterId,
    pub started_at: DateTime<Utc>,
}

impl ReadingSession {
    pub fn start(chapter: ChapterId, now: DateTime<Utc>) -> Self {
        Self {
            chapter,
            started_at: now,
        }
    }

    /// Time spent so far. Zero if the clock went backwards.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        (now - self.started_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_for(&self, book: &str, chapter: u16) -> bool {
        self.chapter.matches(book, chapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_elapsed_never_negative() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let session = ReadingSession::start(ChapterId::new("GEN", 1), start);

        assert_eq!(
            session.elapsed(start + chrono::Duration::seconds(90)),
            Duration::from_secs(90)
        );
        assert_eq!(session.elapsed(start - chrono::Duration::seconds(5)), Duration::ZERO);
        assert!(session.is_for("gen", 1));
    }
}
