//! Prediction Layer
//!
//! Consumes round events; never calls into the engine.
//!
//! - `tracker`: Target commitment and outcome classification
//! - `stats`: Success/failure tallies and streaks
//! - `indicators`: Confidence and trend readouts

pub mod tracker;
pub mod stats;
pub mod indicators;

pub use tracker::{
    classify, Outcome, PredictionStatus, PredictionTracker, Resolution,
    TrackerConfig, TrackerError,
};
pub use stats::PredictionStats;
pub use indicators::{Indicators, Trend};
