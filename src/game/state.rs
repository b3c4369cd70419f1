//! Round State Definitions
//!
//! Phase, round and snapshot types for the round engine.

use std::fmt;

use serde::{Serialize, Deserialize};

use crate::core::clock::Millis;
use crate::game::history::CrashTier;

// =============================================================================
// ROUND ID
// =============================================================================

/// Sequential round number, starting at 1 for the first round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub struct RoundId(pub u64);

impl RoundId {
    /// The id following this one.
    #[inline]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// ROUND PHASE
// =============================================================================

/// Lifecycle phase of the round engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum RoundPhase {
    /// No round in progress; accepts a start command.
    #[default]
    Idle,
    /// Multiplier climbing toward the crash point.
    Running,
    /// Crash reached; waiting out the dwell period.
    Crashed,
}

impl RoundPhase {
    /// Stable one-byte encoding (for hashing).
    pub fn as_u8(self) -> u8 {
        match self {
            RoundPhase::Idle => 0,
            RoundPhase::Running => 1,
            RoundPhase::Crashed => 2,
        }
    }
}

// =============================================================================
// ROUND
// =============================================================================

/// One round, from start to crash.
///
/// The crash point is fixed when the round is created and never rewritten.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Round {
    /// Round number.
    pub id: RoundId,
    /// Predetermined crash point.
    crash_point: f64,
    /// Current multiplier (1.0 at start).
    pub multiplier: f64,
    /// Growth ticks applied so far.
    pub ticks: u32,
    /// Virtual time the round started.
    pub started_at: Millis,
    /// Virtual time the round crashed.
    pub crashed_at: Option<Millis>,
}

impl Round {
    /// Start a round with its crash point fixed.
    pub fn new(id: RoundId, crash_point: f64, started_at: Millis) -> Self {
        Self {
            id,
            crash_point,
            multiplier: 1.0,
            ticks: 0,
            started_at,
            crashed_at: None,
        }
    }

    /// The crash point drawn at round start.
    #[inline]
    pub fn crash_point(&self) -> f64 {
        self.crash_point
    }

    /// Has the multiplier met or passed the crash point?
    #[inline]
    pub fn has_reached_crash(&self) -> bool {
        self.multiplier >= self.crash_point
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Read-only view of the engine for presentation consumers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Virtual clock.
    pub now: Millis,
    /// Current phase.
    pub phase: RoundPhase,
    /// Current (or last) multiplier.
    pub multiplier: f64,
    /// Current (or last) round number.
    pub round_id: Option<RoundId>,
    /// Crash history, most recent first.
    pub history: Vec<f64>,
    /// Display tier of each history entry, same order.
    pub tiers: Vec<CrashTier>,
}
