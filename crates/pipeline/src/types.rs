//! Shared value types for the captionflow domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (sub-scores are in `[0.0, 1.0]`, totals and
//! trend fit are in `[0.0, 100.0]`) and participate in domain computations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Score types
// ---------------------------------------------------------------------------

/// A sub-score in the range `[0.0, 1.0]`.
///
/// Used for the format, hashtag-count, repetition and media-fit components of
/// a score breakdown.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct UnitScore(f64);

impl UnitScore {
    /// Creates a [`UnitScore`], returning `None` if `value` is outside
    /// the valid range `[0.0, 1.0]`.
    #[must_use]
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Creates a [`UnitScore`], clamping `value` into range. NaN maps to zero.
    pub fn saturating(value: f64) -> Self {
        if value.is_nan() {
            Self(0.0)
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    /// Returns the score as an `f64` in `[0.0, 1.0]`.
    pub fn as_f64(self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for UnitScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

// ---------------------------------------------------------------------------

/// A percentage-scaled score in the range `[0.0, 100.0]`.
///
/// Used for trend fit and for the weighted total of a score breakdown.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct PercentScore(f64);

impl PercentScore {
    /// The neutral midpoint reported when there is no signal to measure.
    pub const NEUTRAL: PercentScore = PercentScore(50.0);

    /// Creates a [`PercentScore`], returning `None` if `value` is outside
    /// the valid range `[0.0, 100.0]`.
    #[must_use]
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && (0.0..=100.0).contains(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Creates a [`PercentScore`], clamping `value` into range. NaN maps to zero.
    pub fn saturating(value: f64) -> Self {
        if value.is_nan() {
            Self(0.0)
        } else {
            Self(value.clamp(0.0, 100.0))
        }
    }

    /// Returns the score as an `f64` in `[0.0, 100.0]`.
    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// Rounds to one decimal place, the precision scores are stored and
    /// compared at.
    #[must_use]
    pub fn rounded(self) -> Self {
        Self((self.0 * 10.0).round() / 10.0)
    }
}

impl std::fmt::Display for PercentScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

/// Properties of the source media as reported by the media probe.
///
/// Every field is zero when the probe could not determine it. Zero means
/// "unknown", never "failing".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetrics {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Container duration in seconds.
    pub duration_seconds: f64,
    /// Video stream bitrate in bits per second.
    pub bitrate: u64,
}

impl MediaMetrics {
    /// Returns `true` if the probe produced no information at all.
    pub fn is_unknown(&self) -> bool {
        self.width == 0 && self.height == 0 && self.duration_seconds == 0.0 && self.bitrate == 0
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_score_rejects_out_of_range() {
        assert!(UnitScore::new(1.01).is_none());
        assert!(UnitScore::new(-0.1).is_none());
        assert!(UnitScore::new(f64::NAN).is_none());
        assert_eq!(UnitScore::saturating(3.0).as_f64(), 1.0);
    }

    #[test]
    fn percent_score_saturates() {
        assert_eq!(PercentScore::saturating(120.0).as_f64(), 100.0);
        assert_eq!(PercentScore::saturating(-4.0).as_f64(), 0.0);
        assert_eq!(PercentScore::NEUTRAL.as_f64(), 50.0);
    }

    #[test]
    fn percent_score_rounds_to_one_decimal() {
        assert_eq!(PercentScore::saturating(74.96).rounded().as_f64(), 75.0);
        assert_eq!(PercentScore::saturating(59.94).rounded().as_f64(), 59.9);
        assert_eq!(PercentScore::saturating(100.0).rounded().as_f64(), 100.0);
    }

    #[test]
    fn zeroed_metrics_are_unknown() {
        assert!(MediaMetrics::default().is_unknown());
        let m = MediaMetrics {
            width: 1080,
            ..MediaMetrics::default()
        };
        assert!(!m.is_unknown());
    }
}
