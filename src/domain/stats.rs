use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::canon::{self, CANON};
use crate::domain::position::ChapterId;

/// Aggregated reading statistics for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressStats {
    pub chapters_read: BTreeSet<ChapterId>,
    /// Verse count of each completed chapter; `verses_read` is their sum.
    pub chapter_verses: BTreeMap<ChapterId, u32>,
    pub verses_read: u64,
    pub books_read: u32,
    pub consecutive_days: u32,
    pub last_active_date: Option<NaiveDate>,
    pub progress_percentage: f64,
    pub meditations_count: u32,
    pub learning_modules_completed: u32,
    pub reading_time_ms: BTreeMap<ChapterId, u64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProgressStats {
    /// Mark a chapter as read. Returns `true` only on first insertion.
    pub fn record_completion(&mut self, id: ChapterId, verse_count: usize) -> bool {
        if !self.chapters_read.insert(id.clone()) {
            return false;
        }
        self.chapter_verses.insert(id, verse_count as u32);
        self.recompute();
        true
    }

    /// Recompute the derived fields from `chapters_read` and `chapter_verses`.
    pub fn recompute(&mut self) {
        self.verses_read = self
            .chapters_read
            .iter()
            .filter_map(|id| self.chapter_verses.get(id))
            .map(|&n| n as u64)
            .sum();
        self.books_read = CANON
            .iter()
            .filter(|b| {
                (1..=b.chapters).all(|c| self.chapters_read.contains(&ChapterId::new(b.code, c)))
            })
            .count() as u32;
        self.progress_percentage =
            self.chapters_read.len() as f64 / canon::total_chapters() as f64 * 100.0;
    }

    /// Register activity on `today` for the streak counter.
    pub fn touch_day(&mut self, today: NaiveDate) {
        match self.last_active_date {
            None => self.consecutive_days = 1,
            Some(last) if last == today => {
                if self.consecutive_days == 0 {
                    self.consecutive_days = 1;
                }
            }
            Some(last) if last.succ_opt() == Some(today) => self.consecutive_days += 1,
            Some(last) if last < today => self.consecutive_days = 1,
            // Clock moved backwards; keep the newer date.
            Some(_) => return,
        }
        self.last_active_date = Some(today);
    }

    pub fn add_reading_time(&mut self, id: ChapterId, elapsed: Duration) {
        *self.reading_time_ms.entry(id).or_default() += elapsed.as_millis() as u64;
    }

    pub fn reading_time(&self, id: &ChapterId) -> Duration {
        Duration::from_millis(self.reading_time_ms.get(id).copied().unwrap_or(0))
    }

    pub fn total_reading_time(&self) -> Duration {
        Duration::from_millis(self.reading_time_ms.values().sum())
    }

    pub fn is_chapter_read(&self, book: &str, chapter: u16) -> bool {
        self.chapters_read.contains(&ChapterId::new(book, chapter))
    }

    /// What was recorded on top of `baseline`.
    ///
    /// Counters and reading times hold only the increase; completed chapters,
    /// their verse counts and the streak are carried whole.
    pub fn since(&self, baseline: &ProgressStats) -> ProgressStats {
        let reading_time_ms = self
            .reading_time_ms
            .iter()
            .filter_map(|(id, &ms)| {
                let before = baseline.reading_time_ms.get(id).copied().unwrap_or(0);
                (ms > before).then(|| (id.clone(), ms - before))
            })
            .collect();

        let mut delta = ProgressStats {
            chapters_read: self.chapters_read.clone(),
            chapter_verses: self.chapter_verses.clone(),
            consecutive_days: self.consecutive_days,
            last_active_date: self.last_active_date,
            meditations_count: self
                .meditations_count
                .saturating_sub(baseline.meditations_count),
            learning_modules_completed: self
                .learning_modules_completed
                .saturating_sub(baseline.learning_modules_completed),
            reading_time_ms,
            updated_at: self.updated_at,
            ..ProgressStats::default()
        };
        delta.recompute();
        delta
    }

    /// Apply a change produced by [`since`](Self::since) to these stats.
    ///
    /// Completed chapters are unioned, counters and reading times are added,
    /// and the streak comes from whichever side was active last.
    pub fn merge(&mut self, delta: &ProgressStats) {
        self.chapters_read.extend(delta.chapters_read.iter().cloned());
        for (id, &verses) in &delta.chapter_verses {
            self.chapter_verses.entry(id.clone()).or_insert(verses);
        }
        self.meditations_count += delta.meditations_count;
        self.learning_modules_completed += delta.learning_modules_completed;
        for (id, ms) in &delta.reading_time_ms {
            *self.reading_time_ms.entry(id.clone()).or_default() += ms;
        }
        if delta.last_active_date > self.last_active_date {
            self.last_active_date = delta.last_active_date;
            self.consecutive_days = delta.consecutive_days;
        } else if delta.last_active_date == self.last_active_date {
            self.consecutive_days = self.consecutive_days.max(delta.consecutive_days);
        }
        self.updated_at = self.updated_at.max(delta.updated_at);
        self.recompute();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_completion_is_idempotent() {
        let mut stats = ProgressStats::default();
        assert!(stats.record_completion(ChapterId::new("GEN", 1), 31));
        assert!(!stats.record_completion(ChapterId::new("GEN", 1), 31));
        assert_eq!(stats.chapters_read.len(), 1);
        assert_eq!(stats.verses_read, 31);
    }

    #[test]
    fn test_books_read_requires_every_chapter() {
        let mut stats = ProgressStats::default();
        stats.record_completion(ChapterId::new("OBA", 1), 21);
        assert_eq!(stats.books_read, 1);
        stats.record_completion(ChapterId::new("RUT", 1), 22);
        stats.record_completion(ChapterId::new("RUT", 2), 23);
        stats.record_completion(ChapterId::new("RUT", 3), 18);
        assert_eq!(stats.books_read, 1);
        stats.record_completion(ChapterId::new("RUT", 4), 22);
        assert_eq!(stats.books_read, 2);
    }

    #[test]
    fn test_percentage_reaches_100_only_when_complete() {
        let mut stats = ProgressStats::default();
        let mut last = 0.0;
        let all: Vec<_> = canon::all_chapters().collect();
        for (i, id) in all.iter().enumerate() {
            stats.record_completion(id.clone(), 10);
            assert!(stats.progress_percentage >= last);
            last = stats.progress_percentage;
            if i + 1 < all.len() {
                assert!(stats.progress_percentage < 100.0);
            }
        }
        assert_eq!(stats.progress_percentage, 100.0);
        assert_eq!(stats.books_read, 66);
    }

    #[test]
    fn test_streak_rules() {
        let mut stats = ProgressStats::default();
        stats.touch_day(date(2026, 3, 1));
        assert_eq!(stats.consecutive_days, 1);

        stats.touch_day(date(2026, 3, 1));
        assert_eq!(stats.consecutive_days, 1);

        stats.touch_day(date(2026, 3, 2));
        assert_eq!(stats.consecutive_days, 2);

        stats.touch_day(date(2026, 3, 5));
        assert_eq!(stats.consecutive_days, 1);
        assert_eq!(stats.last_active_date, Some(date(2026, 3, 5)));

        stats.touch_day(date(2026, 3, 4));
        assert_eq!(stats.last_active_date, Some(date(2026, 3, 5)));
    }

    #[test]
    fn test_reading_time_accumulates() {
        let mut stats = ProgressStats::default();
        let id = ChapterId::new("JHN", 1);
        stats.add_reading_time(id.clone(), Duration::from_secs(30));
        stats.add_reading_time(id.clone(), Duration::from_secs(15));
        assert_eq!(stats.reading_time(&id), Duration::from_secs(45));
        assert_eq!(stats.total_reading_time(), Duration::from_secs(45));
    }

    #[test]
    fn test_merge_unions_progress() {
        let mut stored = ProgressStats::default();
        stored.record_completion(ChapterId::new("GEN", 1), 31);
        stored.touch_day(date(2026, 3, 2));

        let mut other = ProgressStats::default();
        other.record_completion(ChapterId::new("GEN", 2), 25);
        other.add_reading_time(ChapterId::new("GEN", 2), Duration::from_secs(60));
        other.meditations_count = 3;
        other.touch_day(date(2026, 3, 1));

        stored.merge(&other.since(&ProgressStats::default()));
        assert_eq!(stored.chapters_read.len(), 2);
        assert_eq!(stored.verses_read, 56);
        assert_eq!(stored.meditations_count, 3);
        assert_eq!(stored.last_active_date, Some(date(2026, 3, 2)));
        assert_eq!(
            stored.reading_time(&ChapterId::new("GEN", 2)),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_merge_keeps_verse_total_in_step_with_chapters() {
        let mut a = ProgressStats::default();
        a.record_completion(ChapterId::new("GEN", 1), 31);
        let mut b = ProgressStats::default();
        b.record_completion(ChapterId::new("EXO", 1), 22);
        b.record_completion(ChapterId::new("GEN", 1), 31);

        a.merge(&b);
        assert_eq!(a.chapters_read.len(), 2);
        assert_eq!(a.verses_read, 53);
    }

    #[test]
    fn test_merge_adds_increments_from_two_writers() {
        let gen1 = ChapterId::new("GEN", 1);
        let mut stored = ProgressStats::default();
        stored.meditations_count = 2;
        stored.add_reading_time(gen1.clone(), Duration::from_secs(100));

        // Two sessions start from the same stored stats and each add some.
        let baseline = stored.clone();
        let mut first = baseline.clone();
        first.meditations_count += 1;
        first.add_reading_time(gen1.clone(), Duration::from_secs(30));
        let mut second = baseline.clone();
        second.meditations_count += 2;
        second.add_reading_time(gen1.clone(), Duration::from_secs(20));

        stored.merge(&first.since(&baseline));
        stored.merge(&second.since(&baseline));
        assert_eq!(stored.meditations_count, 5);
        assert_eq!(stored.reading_time(&gen1), Duration::from_secs(150));
    }

    #[test]
    fn test_since_holds_only_the_increase() {
        let gen1 = ChapterId::new("GEN", 1);
        let mut baseline = ProgressStats::default();
        baseline.record_completion(gen1.clone(), 31);
        baseline.add_reading_time(gen1.clone(), Duration::from_secs(40));
        baseline.learning_modules_completed = 4;

        let mut now = baseline.clone();
        now.add_reading_time(gen1.clone(), Duration::from_secs(5));
        now.learning_modules_completed = 5;

        let delta = now.since(&baseline);
        assert_eq!(delta.reading_time(&gen1), Duration::from_secs(5));
        assert_eq!(delta.learning_modules_completed, 1);
        assert_eq!(delta.meditations_count, 0);
        assert_eq!(delta.verses_read, 31);
        assert!(now.since(&now).reading_time_ms.is_empty());
    }

    #[test]
    fn test_stats_json_round_trip_keeps_sets() {
        let mut stats = ProgressStats::default();
        stats.record_completion(ChapterId::new("PSA", 23), 6);
        stats.add_reading_time(ChapterId::new("PSA", 23), Duration::from_millis(1500));
        let json = serde_json::to_string(&stats).unwrap();
        let back: ProgressStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back.chapters_read, stats.chapters_read);
        assert_eq!(back.reading_time_ms, stats.reading_time_ms);
        assert_eq!(back.verses_read, 6);
    }
}
