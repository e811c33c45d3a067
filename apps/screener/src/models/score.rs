use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A 0–10 fitness rating with one decimal place.
///
/// Every way of building a `Score` (constructor, serde, database row) clamps the
/// value into `[0, 10]` and rounds it half away from zero after scaling by ten,
/// so `7.35` becomes `7.4` and `7.25` becomes `7.3`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Score(f64);

#[derive(Debug, Error)]
#[error("score {0} is not a finite number")]
pub struct NonFiniteScore(pub f64);

impl Score {
    pub const MIN: f64 = 0.0;
    pub const MAX: f64 = 10.0;
    /// Used when the model reply carries no score at all.
    pub const FALLBACK: f64 = 5.0;

    pub fn new(raw: f64) -> Result<Self, NonFiniteScore> {
        if !raw.is_finite() {
            return Err(NonFiniteScore(raw));
        }
        Ok(Self(round_one_decimal(raw.clamp(Self::MIN, Self::MAX))))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Descending order helper for ranking candidates.
    pub fn rank_desc(a: &Self, b: &Self) -> std::cmp::Ordering {
        b.0.total_cmp(&a.0)
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl TryFrom<f64> for Score {
    type Error = NonFiniteScore;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Score::new(value)
    }
}

impl From<Score> for f64 {
    fn from(score: Score) -> Self {
        score.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}
