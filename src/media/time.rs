//! Rational media time
//!
//! Presentation timestamps are carried as a rational value over a timescale,
//! the way container formats store them, so that mixed-rate streams (e.g.
//! 30fps video against 44.1kHz audio) compare without rounding.

use serde::{Deserialize, Serialize};

/// A rational point in media time: `value / timescale` seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MediaTime {
    /// Number of timescale units
    pub value: i64,

    /// Units per second
    pub timescale: u32,
}

impl MediaTime {
    /// Time zero (in a 1Hz timescale; equal to zero in any timescale)
    pub const ZERO: MediaTime = MediaTime {
        value: 0,
        timescale: 1,
    };

    /// Create a time from a raw value and timescale
    pub fn new(value: i64, timescale: u32) -> Self {
        debug_assert!(timescale > 0, "timescale must be non-zero");
        Self { value, timescale }
    }

    /// Create a time from whole seconds (1Hz timescale)
    pub fn from_seconds(seconds: i64) -> Self {
        Self::new(seconds, 1)
    }

    /// Create a time from milliseconds (1kHz timescale)
    pub fn from_millis(millis: i64) -> Self {
        Self::new(millis, 1_000)
    }

    /// Convert to floating-point seconds (for display/logging only)
    pub fn as_seconds(&self) -> f64 {
        self.value as f64 / self.timescale as f64
    }
}

impl PartialEq for MediaTime {
    fn eq(&self, other: &Self) -> bool {
        // Cross-multiply in i128 so differing timescales compare exactly
        (self.value as i128) * (other.timescale as i128)
            == (other.value as i128) * (self.timescale as i128)
    }
}

impl Eq for MediaTime {}

impl PartialOrd for MediaTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaTime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let lhs = (self.value as i128) * (other.timescale as i128);
        let rhs = (other.value as i128) * (self.timescale as i128);
        lhs.cmp(&rhs)
    }
}

impl std::fmt::Display for MediaTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}s", self.value, self.timescale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_timescale_equality() {
        assert_eq!(MediaTime::new(1, 30), MediaTime::new(1000, 30_000));
        assert_eq!(MediaTime::ZERO, MediaTime::new(0, 44_100));
    }

    #[test]
    fn test_cross_timescale_ordering() {
        // 1/30s < 441/44100s (= 10ms < 33.3ms is false; check real values)
        let frame = MediaTime::new(1, 30); // ~33.3ms
        let audio = MediaTime::new(441, 44_100); // 10ms
        assert!(audio < frame);
        assert!(frame > MediaTime::ZERO);
    }

    #[test]
    fn test_no_overflow_on_large_values() {
        let a = MediaTime::new(i64::MAX / 2, 90_000);
        let b = MediaTime::new(i64::MAX / 2 - 1, 90_000);
        assert!(b < a);
    }

    #[test]
    fn test_as_seconds() {
        assert!((MediaTime::new(441, 44_100).as_seconds() - 0.01).abs() < 1e-9);
    }
}
