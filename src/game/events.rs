//! Round Events
//!
//! Lifecycle notifications published by the round engine. The prediction
//! tracker and external subscribers only ever see the engine through these.

use serde::{Serialize, Deserialize};

use crate::core::clock::Millis;
use crate::game::state::RoundId;

/// Round event data.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundEventData {
    /// Round entered `running`.
    RoundStarted,

    /// Round reached its crash point.
    RoundCrashed {
        /// Realized crash point.
        crash_point: f64,
    },

    /// Dwell period elapsed, engine back to `idle`.
    RoundReset,
}

impl RoundEventData {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            RoundEventData::RoundStarted => "round_started",
            RoundEventData::RoundCrashed { .. } => "round_crashed",
            RoundEventData::RoundReset => "round_reset",
        }
    }
}

/// A round event with its round and virtual timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundEvent {
    /// Round the event belongs to.
    pub round_id: RoundId,

    /// Virtual time the transition happened
    pub at: Millis,

    /// Event data
    pub data: RoundEventData,
}

impl RoundEvent {
    /// Create a new event.
    pub fn new(round_id: RoundId, at: Millis, data: RoundEventData) -> Self {
        Self { round_id, at, data }
    }

    /// Create round started event.
    pub fn started(round_id: RoundId, at: Millis) -> Self {
        Self::new(round_id, at, RoundEventData::RoundStarted)
    }

    /// Create round crashed event.
    pub fn crashed(round_id: RoundId, at: Millis, crash_point: f64) -> Self {
        Self::new(round_id, at, RoundEventData::RoundCrashed { crash_point })
    }

    /// Create round reset event.
    pub fn reset(round_id: RoundId, at: Millis) -> Self {
        Self::new(round_id, at, RoundEventData::RoundReset)
    }

    /// Crash point carried by a crash event.
    pub fn crash_point(&self) -> Option<f64> {
        match self.data {
            RoundEventData::RoundCrashed { crash_point } => Some(crash_point),
            _ => None,
        }
    }
}
