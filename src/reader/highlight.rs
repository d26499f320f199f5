use std::time::{Duration, Instant};

/// Target opacity reached linearly over `duration_ms` from the previous frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub opacity: f32,
    pub duration_ms: u64,
}

const fn frame(opacity: f32, duration_ms: u64) -> Keyframe {
    Keyframe {
        opacity,
        duration_ms,
    }
}

/// Fade in, pulse twice, fade out.
pub const HIGHLIGHT_KEYFRAMES: [Keyframe; 7] = [
    frame(0.0, 0),
    frame(1.0, 400),
    frame(0.1, 500),
    frame(1.0, 500),
    frame(0.1, 500),
    frame(1.0, 500),
    frame(0.0, 1000),
];

pub fn total_duration() -> Duration {
    Duration::from_millis(HIGHLIGHT_KEYFRAMES.iter().map(|k| k.duration_ms).sum())
}

/// Opacity `elapsed` into the cue, or `None` once it has finished.
pub fn opacity_at(elapsed: Duration) -> Option<f32> {
    let mut t = elapsed.as_millis() as u64;
    let mut from = HIGHLIGHT_KEYFRAMES[0].opacity;

    for k in &HIGHLIGHT_KEYFRAMES {
        if t < k.duration_ms {
            let progress = t as f32 / k.duration_ms as f32;
            return Some(from + (k.opacity - from) * progress);
        }
        t -= k.duration_ms;
        from = k.opacity;
    }
    None
}

/// A highlight cue on one verse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerseHighlight {
    pub verse: u16,
    pub started_at: Instant,
}

impl VerseHighlight {
    pub fn start(verse: u16) -> Self {
        Self {
            verse,
            started_at: Instant::now(),
        }
    }

    pub fn opacity(&self, now: Instant) -> Option<f32> {
        opacity_at(now.saturating_duration_since(self.started_at))
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        self.opacity(now).is_none()
    }
}
