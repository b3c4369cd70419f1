//! Derived Indicators
//!
//! Confidence and trend readouts shown next to the prediction. Both are
//! descriptive summaries of past rounds; neither feeds the target draw.

use serde::{Serialize, Deserialize};

use crate::game::history::{mean_of, CrashHistory};
use crate::predict::stats::PredictionStats;

/// Lowest confidence reported.
pub const MIN_CONFIDENCE: f64 = 50.0;
/// Highest confidence reported.
pub const MAX_CONFIDENCE: f64 = 99.0;
/// Relative change in mean crash point needed to call a trend.
pub const TREND_THRESHOLD: f64 = 0.10;
/// Crash points needed before any trend is called.
pub const MIN_TREND_SAMPLES: usize = 4;

/// Direction of recent crash points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    /// Recent rounds crash higher than older ones.
    Bullish,
    /// Recent rounds crash lower than older ones.
    Bearish,
    /// No clear movement, or too little data.
    Neutral,
}

impl Trend {
    /// Compare the newer half of `history` against the older half.
    ///
    /// With an odd count the middle entry goes to the older half.
    pub fn from_history(history: &CrashHistory) -> Self {
        let points = history.to_vec();
        if points.len() < MIN_TREND_SAMPLES {
            return Trend::Neutral;
        }

        let (newer, older) = points.split_at(points.len() / 2);
        let (Some(newer_mean), Some(older_mean)) = (mean_of(newer), mean_of(older)) else {
            return Trend::Neutral;
        };
        let change = (newer_mean - older_mean) / older_mean;

        if change > TREND_THRESHOLD {
            Trend::Bullish
        } else if change < -TREND_THRESHOLD {
            Trend::Bearish
        } else {
            Trend::Neutral
        }
    }
}

/// Accuracy squeezed into the displayed confidence band.
pub fn confidence(stats: &PredictionStats) -> Option<f64> {
    stats
        .accuracy()
        .map(|a| a.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE))
}

/// Indicator bundle for presentation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Indicators {
    /// Confidence percentage, absent before the first resolution.
    pub confidence: Option<f64>,
    /// Crash point trend.
    pub trend: Trend,
}

impl Indicators {
    /// Derive from statistics and history.
    pub fn derive(stats: &PredictionStats, history: &CrashHistory) -> Self {
        Self {
            confidence: confidence(stats),
            trend: Trend::from_history(history),
        }
    }
}
