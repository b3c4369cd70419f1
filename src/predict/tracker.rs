//! Prediction Tracker
//!
//! Commits to a target multiplier when a round starts and classifies the
//! round against it when it crashes. Driven only by [`RoundEvent`]s.
//!
//! Allowed transitions:
//!
//! | status                 | event           | result                      |
//! |------------------------|-----------------|-----------------------------|
//! | `Waiting`              | `RoundStarted`  | draw target, `Predicting`   |
//! | `Predicting`           | `RoundCrashed`  | `Success` / `Failed`        |
//! | `Success` / `Failed`   | `RoundReset`    | clear target, `Waiting`     |
//!
//! Anything else is a protocol violation and leaves the tracker untouched.

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::config::ConfigError;
use crate::core::rng::{DeterministicRng, DrawRange, RandomSource};
use crate::game::events::{RoundEvent, RoundEventData};
use crate::game::state::RoundId;

/// Configuration for the prediction tracker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Range the target is drawn from.
    pub target_range: DrawRange,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            target_range: DrawRange::new(1.5, 6.5),
        }
    }
}

impl TrackerConfig {
    /// Reject unusable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.target_range.is_valid() {
            return Err(ConfigError::Invalid(
                "target_range must be a finite [min, max) with min < max".into(),
            ));
        }
        Ok(())
    }
}

/// Externally visible prediction status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum PredictionStatus {
    /// No round active.
    #[default]
    Waiting,
    /// Target committed, round running.
    Predicting,
    /// Round crashed at or above the target.
    Success,
    /// Round crashed below the target.
    Failed,
}

impl PredictionStatus {
    /// Stable one-byte encoding (for hashing).
    pub fn as_u8(self) -> u8 {
        match self {
            PredictionStatus::Waiting => 0,
            PredictionStatus::Predicting => 1,
            PredictionStatus::Success => 2,
            PredictionStatus::Failed => 3,
        }
    }
}

/// Result of comparing a crash point with a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// `crash_point >= target`.
    Success,
    /// `crash_point < target`.
    Failed,
}

impl Outcome {
    /// Status shown for this outcome.
    pub fn status(self) -> PredictionStatus {
        match self {
            Outcome::Success => PredictionStatus::Success,
            Outcome::Failed => PredictionStatus::Failed,
        }
    }
}

/// Classify a round: success iff it crashed at or above the target.
#[inline]
pub fn classify(target: f64, crash_point: f64) -> Outcome {
    if crash_point >= target {
        Outcome::Success
    } else {
        Outcome::Failed
    }
}

/// Target committed for one round.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Prediction {
    round_id: RoundId,
    target: f64,
}

/// One classified round.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Round number.
    pub round_id: RoundId,
    /// Target committed at round start.
    pub target: f64,
    /// Realized crash point.
    pub crash_point: f64,
    /// Classification.
    pub outcome: Outcome,
}

/// Protocol violations seen by the tracker.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackerError {
    /// Crash reported while no target was committed.
    #[error("Round {round_id} crashed with no active target")]
    NoActiveTarget {
        /// Round named by the event.
        round_id: RoundId,
    },

    /// Crash reported for a different round than the committed target.
    #[error("Crash for round {got} but target was committed for round {expected}")]
    RoundMismatch {
        /// Round the target belongs to.
        expected: RoundId,
        /// Round named by the event.
        got: RoundId,
    },

    /// Event not permitted in the current status.
    #[error("Unexpected {event} for round {round_id} while {status:?}")]
    OutOfOrder {
        /// Event name.
        event: &'static str,
        /// Round named by the event.
        round_id: RoundId,
        /// Tracker status when it arrived.
        status: PredictionStatus,
    },
}

/// The prediction tracker.
#[derive(Debug)]
pub struct PredictionTracker<R: RandomSource = DeterministicRng> {
    config: TrackerConfig,
    rng: R,
    status: PredictionStatus,
    active: Option<Prediction>,
}

impl<R: RandomSource> PredictionTracker<R> {
    /// Create a waiting tracker.
    pub fn new(config: TrackerConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            rng,
            status: PredictionStatus::Waiting,
            active: None,
        })
    }

    /// React to one engine event.
    ///
    /// Returns the resolution when the event classified a round.
    pub fn handle(&mut self, event: &RoundEvent) -> Result<Option<Resolution>, TrackerError> {
        match (event.data, self.status) {
            (RoundEventData::RoundStarted, PredictionStatus::Waiting) => {
                let target = self.rng.draw(&self.config.target_range);
                // Commit the target before announcing `Predicting`.
                self.active = Some(Prediction { round_id: event.round_id, target });
                self.status = PredictionStatus::Predicting;
                debug!("Round {} target {:.2}x", event.round_id, target);
                Ok(None)
            }

            (RoundEventData::RoundCrashed { crash_point }, PredictionStatus::Predicting) => {
                let prediction = self
                    .active
                    .ok_or(TrackerError::NoActiveTarget { round_id: event.round_id })?;
                if prediction.round_id != event.round_id {
                    return Err(TrackerError::RoundMismatch {
                        expected: prediction.round_id,
                        got: event.round_id,
                    });
                }

                let outcome = classify(prediction.target, crash_point);
                self.status = outcome.status();
                debug!(
                    "Round {} crashed at {:.2}x vs target {:.2}x: {:?}",
                    event.round_id, crash_point, prediction.target, outcome
                );
                Ok(Some(Resolution {
                    round_id: event.round_id,
                    target: prediction.target,
                    crash_point,
                    outcome,
                }))
            }

            (RoundEventData::RoundCrashed { .. }, PredictionStatus::Waiting) => {
                Err(TrackerError::NoActiveTarget { round_id: event.round_id })
            }

            (RoundEventData::RoundReset, PredictionStatus::Success | PredictionStatus::Failed) => {
                self.active = None;
                self.status = PredictionStatus::Waiting;
                Ok(None)
            }

            (data, status) => Err(TrackerError::OutOfOrder {
                event: data.name(),
                round_id: event.round_id,
                status,
            }),
        }
    }

    /// Drop any committed target and go back to `Waiting`.
    ///
    /// Used when the engine feeding this tracker is torn down.
    pub fn clear(&mut self) {
        self.active = None;
        self.status = PredictionStatus::Waiting;
    }

    /// Current status.
    pub fn status(&self) -> PredictionStatus {
        self.status
    }

    /// Committed target, absent exactly while `Waiting`.
    pub fn target(&self) -> Option<f64> {
        self.active.map(|p| p.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::ScriptedSource;
    use proptest::prelude::*;

    fn tracker(targets: &[f64]) -> PredictionTracker<ScriptedSource> {
        PredictionTracker::new(TrackerConfig::default(), ScriptedSource::new(targets.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_start_commits_target() {
        let mut t = tracker(&[2.5]);
        assert_eq!(t.status(), PredictionStatus::Waiting);
        assert_eq!(t.target(), None);

        assert_eq!(t.handle(&RoundEvent::started(RoundId(1), 0)), Ok(None));
        assert_eq!(t.status(), PredictionStatus::Predicting);
        assert_eq!(t.target(), Some(2.5));
    }

    #[test]
    fn test_crash_below_target_fails() {
        let mut t = tracker(&[2.5]);
        t.handle(&RoundEvent::started(RoundId(1), 0)).unwrap();

        let resolution = t.handle(&RoundEvent::crashed(RoundId(1), 3_500, 2.0)).unwrap().unwrap();
        assert_eq!(resolution.outcome, Outcome::Failed);
        assert_eq!(t.status(), PredictionStatus::Failed);
        // Target stays visible until reset
        assert_eq!(t.target(), Some(2.5));
    }

    #[test]
    fn test_crash_above_target_succeeds() {
        let mut t = tracker(&[1.8]);
        t.handle(&RoundEvent::started(RoundId(1), 0)).unwrap();
        let resolution = t.handle(&RoundEvent::crashed(RoundId(1), 5_550, 3.0)).unwrap().unwrap();
        assert_eq!(resolution.outcome, Outcome::Success);
        assert_eq!(resolution.target, 1.8);
        assert_eq!(resolution.crash_point, 3.0);
        assert_eq!(t.status(), PredictionStatus::Success);
    }

    #[test]
    fn test_equal_values_succeed() {
        assert_eq!(classify(2.0, 2.0), Outcome::Success);
        assert_eq!(classify(1.5, 1.0), Outcome::Failed);
    }

    #[test]
    fn test_reset_clears_target() {
        let mut t = tracker(&[1.8]);
        t.handle(&RoundEvent::started(RoundId(1), 0)).unwrap();
        t.handle(&RoundEvent::crashed(RoundId(1), 100, 3.0)).unwrap();
        assert_eq!(t.handle(&RoundEvent::reset(RoundId(1), 15_100)), Ok(None));
        assert_eq!(t.status(), PredictionStatus::Waiting);
        assert_eq!(t.target(), None);
    }

    #[test]
    fn test_crash_without_start_is_rejected() {
        let mut t = tracker(&[]);
        let err = t.handle(&RoundEvent::crashed(RoundId(4), 100, 3.0)).unwrap_err();
        assert_eq!(err, TrackerError::NoActiveTarget { round_id: RoundId(4) });
        assert_eq!(t.status(), PredictionStatus::Waiting);
        assert_eq!(t.target(), None);
    }

    #[test]
    fn test_crash_for_other_round_is_rejected() {
        let mut t = tracker(&[2.0]);
        t.handle(&RoundEvent::started(RoundId(1), 0)).unwrap();
        let err = t.handle(&RoundEvent::crashed(RoundId(2), 100, 3.0)).unwrap_err();
        assert_eq!(err, TrackerError::RoundMismatch { expected: RoundId(1), got: RoundId(2) });
        assert_eq!(t.status(), PredictionStatus::Predicting);
    }

    #[test]
    fn test_out_of_order_events_leave_state() {
        let mut t = tracker(&[2.0, 4.0]);
        t.handle(&RoundEvent::started(RoundId(1), 0)).unwrap();

        // Second start before crash/reset: no redraw
        let err = t.handle(&RoundEvent::started(RoundId(2), 10)).unwrap_err();
        assert!(matches!(err, TrackerError::OutOfOrder { event: "round_started", .. }));
        assert_eq!(t.target(), Some(2.0));

        // Reset before crash
        let err = t.handle(&RoundEvent::reset(RoundId(1), 20)).unwrap_err();
        assert!(matches!(err, TrackerError::OutOfOrder { status: PredictionStatus::Predicting, .. }));
        assert_eq!(t.status(), PredictionStatus::Predicting);

        // Second crash after classification
        t.handle(&RoundEvent::crashed(RoundId(1), 30, 1.5)).unwrap();
        let err = t.handle(&RoundEvent::crashed(RoundId(1), 40, 1.5)).unwrap_err();
        assert!(matches!(err, TrackerError::OutOfOrder { status: PredictionStatus::Failed, .. }));
        assert_eq!(t.status(), PredictionStatus::Failed);
    }

    #[test]
    fn test_clear() {
        let mut t = tracker(&[2.0]);
        t.handle(&RoundEvent::started(RoundId(1), 0)).unwrap();
        t.clear();
        assert_eq!(t.status(), PredictionStatus::Waiting);
        assert_eq!(t.target(), None);
    }

    #[test]
    fn test_seeded_targets_in_range() {
        let mut t = PredictionTracker::new(TrackerConfig::default(), DeterministicRng::new(3)).unwrap();
        for round in 1..=50 {
            let id = RoundId(round);
            t.handle(&RoundEvent::started(id, 0)).unwrap();
            let target = t.target().unwrap();
            assert!((1.5..6.5).contains(&target));
            t.handle(&RoundEvent::crashed(id, 1, 2.0)).unwrap();
            t.handle(&RoundEvent::reset(id, 2)).unwrap();
        }
    }

    proptest! {
        #[test]
        fn prop_classification(target in 1.5f64..6.5, crash_point in 1.0f64..11.0) {
            let mut t = tracker(&[target]);
            t.handle(&RoundEvent::started(RoundId(1), 0)).unwrap();
            let r = t.handle(&RoundEvent::crashed(RoundId(1), 1, crash_point)).unwrap().unwrap();
            let expected = if crash_point >= target { Outcome::Success } else { Outcome::Failed };
            prop_assert_eq!(r.outcome, expected);
            prop_assert_eq!(t.status(), expected.status());
        }
    }
}
