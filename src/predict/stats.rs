//! Prediction Statistics
//!
//! Running tally of resolved predictions.

use std::collections::VecDeque;

use serde::{Serialize, Deserialize};

use crate::game::history::DEFAULT_HISTORY_LEN;
use crate::predict::tracker::{Outcome, Resolution};

/// Aggregated prediction performance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionStats {
    /// Resolved predictions.
    pub total: u32,
    /// Rounds that crashed at or above the target.
    pub successful: u32,
    /// Rounds that crashed below the target.
    pub failed: u32,
    /// Consecutive successes up to the latest resolution.
    pub current_streak: u32,
    /// Longest run of consecutive successes.
    pub best_streak: u32,
    recent: VecDeque<Resolution>,
    recent_len: usize,
}

impl Default for PredictionStats {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

impl PredictionStats {
    /// Empty statistics keeping the last `recent_len` resolutions.
    pub fn new(recent_len: usize) -> Self {
        Self {
            total: 0,
            successful: 0,
            failed: 0,
            current_streak: 0,
            best_streak: 0,
            recent: VecDeque::new(),
            recent_len,
        }
    }

    /// Fold in one resolution.
    pub fn record(&mut self, resolution: Resolution) {
        self.total += 1;
        match resolution.outcome {
            Outcome::Success => {
                self.successful += 1;
                self.current_streak += 1;
                self.best_streak = self.best_streak.max(self.current_streak);
            }
            Outcome::Failed => {
                self.failed += 1;
                self.current_streak = 0;
            }
        }

        self.recent.push_front(resolution);
        self.recent.truncate(self.recent_len);
    }

    /// Success percentage, absent before the first resolution.
    pub fn accuracy(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.successful as f64 * 100.0 / self.total as f64)
        }
    }

    /// Most recent resolutions, newest first.
    pub fn recent(&self) -> impl Iterator<Item = &Resolution> + '_ {
        self.recent.iter()
    }

    /// Most recent resolution.
    pub fn last(&self) -> Option<&Resolution> {
        self.recent.front()
    }
}
