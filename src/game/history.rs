//! Crash History
//!
//! Bounded, most-recent-first record of past crash points.

use std::collections::VecDeque;

use serde::{Serialize, Deserialize};

/// Default number of crash points kept.
pub const DEFAULT_HISTORY_LEN: usize = 11;

/// Largest history a config may ask for.
pub const MAX_HISTORY_LEN: usize = 1024;

/// Crash points below this are shown as low rounds.
pub const LOW_CRASH_THRESHOLD: f64 = 2.0;

/// Coarse classification of a crash point for display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrashTier {
    /// Crashed below 2.00x.
    Low,
    /// Crashed at 2.00x or above.
    High,
}

impl CrashTier {
    /// Classify a crash point.
    pub fn of(crash_point: f64) -> Self {
        if crash_point < LOW_CRASH_THRESHOLD {
            CrashTier::Low
        } else {
            CrashTier::High
        }
    }
}

/// Bounded crash history, newest first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrashHistory {
    entries: VecDeque<f64>,
    capacity: usize,
}

impl Default for CrashHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

impl CrashHistory {
    /// Create an empty history keeping at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Prepend a crash point, dropping the oldest entries past capacity.
    pub fn record(&mut self, crash_point: f64) {
        self.entries.push_front(crash_point);
        self.entries.truncate(self.capacity);
    }

    /// Most recent crash point.
    pub fn latest(&self) -> Option<f64> {
        self.entries.front().copied()
    }

    /// Iterate newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().copied()
    }

    /// Iterate with display tiers, newest to oldest.
    pub fn tiers(&self) -> impl Iterator<Item = (f64, CrashTier)> + '_ {
        self.iter().map(|c| (c, CrashTier::of(c)))
    }

    /// Copy out as a vector, newest first.
    pub fn to_vec(&self) -> Vec<f64> {
        self.entries.iter().copied().collect()
    }

    /// Mean crash point, if any.
    pub fn mean(&self) -> Option<f64> {
        mean_of(&self.to_vec())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the history empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Arithmetic mean of `points`, `None` when empty.
pub fn mean_of(points: &[f64]) -> Option<f64> {
    if points.is_empty() {
        None
    } else {
        Some(points.iter().sum::<f64>() / points.len() as f64)
    }
}
