use crate::config::ReaderConfig;

/// A completed horizontal swipe: total translation and release velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwipeEvent {
    pub translation_x: f64,
    pub velocity_x: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    /// Leftward swipe
    Next,
    /// Rightward swipe
    Previous,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwipeThresholds {
    pub distance: f64,
    pub velocity: f64,
}

impl Default for SwipeThresholds {
    fn default() -> Self {
        Self {
            distance: 100.0,
            velocity: 500.0,
        }
    }
}

impl From<&ReaderConfig> for SwipeThresholds {
    fn from(config: &ReaderConfig) -> Self {
        Self {
            distance: config.swipe_distance_threshold,
            velocity: config.swipe_velocity_threshold,
        }
    }
}

impl SwipeEvent {
    pub fn new(translation_x: f64, velocity_x: f64) -> Self {
        Self {
            translation_x,
            velocity_x,
        }
    }

    /// Which chapter turn this swipe asks for, if any.
    ///
    /// Distance decides first; a short but fast flick falls back to the
    /// sign of the velocity.
    pub fn classify(&self, thresholds: &SwipeThresholds) -> Option<SwipeDirection> {
        let signal = if self.translation_x.abs() > thresholds.distance {
            self.translation_x
        } else if self.velocity_x.abs() > thresholds.velocity {
            self.velocity_x
        } else {
            return None;
        };

        if signal < 0.0 {
            Some(SwipeDirection::Next)
        } else if signal > 0.0 {
            Some(SwipeDirection::Previous)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(tx: f64, vx: f64) -> Option<SwipeDirection> {
        SwipeEvent::new(tx, vx).classify(&SwipeThresholds::default())
    }

    #[test]
    fn test_distance_threshold() {
        assert_eq!(classify(-150.0, 0.0), Some(SwipeDirection::Next));
        assert_eq!(classify(150.0, 0.0), Some(SwipeDirection::Previous));
        assert_eq!(classify(40.0, 0.0), None);
        assert_eq!(classify(-100.0, 0.0), None);
    }

    #[test]
    fn test_velocity_threshold() {
        assert_eq!(classify(-20.0, -800.0), Some(SwipeDirection::Next));
        assert_eq!(classify(10.0, 600.0), Some(SwipeDirection::Previous));
        assert_eq!(classify(10.0, 500.0), None);
    }

    #[test]
    fn test_distance_wins_over_velocity() {
        assert_eq!(classify(-150.0, 900.0), Some(SwipeDirection::Next));
    }

    #[test]
    fn test_nan_is_ignored() {
        assert_eq!(classify(f64::NAN, f64::NAN), None);
    }

    #[test]
    fn test_thresholds_from_config() {
        let config = ReaderConfig {
            swipe_distance_threshold: 30.0,
            ..ReaderConfig::default()
        };
        let thresholds = SwipeThresholds::from(&config);
        assert_eq!(
            SwipeEvent::new(40.0, 0.0).classify(&thresholds),
            Some(SwipeDirection::Previous)
        );
    }
}
