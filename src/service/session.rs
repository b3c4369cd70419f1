//! Round Session
//!
//! Wires one round engine to one prediction tracker by message passing.
//! Every event the engine emits is handed to the tracker, then to the
//! statistics, then broadcast to subscribers, in the order it was emitted.

use serde::{Serialize, Deserialize};
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::config::{ConfigError, SimulationConfig};
use crate::core::clock::Millis;
use crate::core::hash::{StateHash, StateHasher};
use crate::core::rng::{DeterministicRng, RandomSource};
use crate::game::engine::RoundEngine;
use crate::game::events::RoundEvent;
use crate::game::state::{EngineSnapshot, RoundPhase};
use crate::predict::indicators::Indicators;
use crate::predict::stats::PredictionStats;
use crate::predict::tracker::{PredictionStatus, PredictionTracker};

/// Random stream names for seed derivation.
const CRASH_STREAM: &[u8] = b"crash_point";
const TARGET_STREAM: &[u8] = b"target";

/// Everything a presentation layer reads, in one value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Engine view.
    pub engine: EngineSnapshot,
    /// Committed target.
    pub target: Option<f64>,
    /// Prediction status.
    pub status: PredictionStatus,
    /// Prediction statistics.
    pub stats: PredictionStats,
    /// Confidence and trend.
    pub indicators: Indicators,
}

/// An engine, its tracker and their statistics.
#[derive(Debug)]
pub struct RoundSession<C: RandomSource = DeterministicRng, T: RandomSource = DeterministicRng> {
    engine: RoundEngine<C>,
    tracker: PredictionTracker<T>,
    stats: PredictionStats,
    event_tx: broadcast::Sender<RoundEvent>,
    protocol_errors: u32,
}

impl RoundSession {
    /// Create a session seeded from the config (or the clock).
    pub fn new(config: &SimulationConfig) -> Result<Self, ConfigError> {
        Self::with_seed(config, config.resolve_seed())
    }

    /// Create a session whose crash points and targets derive from `seed`.
    pub fn with_seed(config: &SimulationConfig, seed: u64) -> Result<Self, ConfigError> {
        info!("Session seed {}", seed);
        Self::with_sources(
            config,
            DeterministicRng::for_stream(seed, CRASH_STREAM),
            DeterministicRng::for_stream(seed, TARGET_STREAM),
        )
    }
}

impl<C: RandomSource, T: RandomSource> RoundSession<C, T> {
    /// Create a session with explicit random sources.
    pub fn with_sources(
        config: &SimulationConfig,
        crash_source: C,
        target_source: T,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(config.event_buffer);

        Ok(Self {
            engine: RoundEngine::new(config.engine.clone(), crash_source)?,
            tracker: PredictionTracker::new(config.tracker.clone(), target_source)?,
            stats: PredictionStats::new(config.engine.history_len),
            event_tx,
            protocol_errors: 0,
        })
    }

    /// Start a round. Returns false if one is already running or crashed.
    pub fn start_round(&mut self) -> bool {
        match self.engine.start_round() {
            Some(event) => {
                self.dispatch(event);
                true
            }
            None => false,
        }
    }

    /// Advance time by `elapsed` ms and deliver the resulting events.
    pub fn advance(&mut self, elapsed: Millis) -> Vec<RoundEvent> {
        let events = self.engine.advance(elapsed);
        for event in &events {
            self.dispatch(*event);
        }
        events
    }

    /// Stop the engine and drop the committed prediction.
    ///
    /// Pending ticks and the pending reset are cancelled, so no event from
    /// the current round reaches subscribers after this.
    pub fn shutdown(&mut self) {
        self.engine.shutdown();
        self.tracker.clear();
    }

    fn dispatch(&mut self, event: RoundEvent) {
        match self.tracker.handle(&event) {
            Ok(Some(resolution)) => {
                self.stats.record(resolution);
                info!(
                    "Round {} {:?}: crash {:.2}x vs target {:.2}x",
                    resolution.round_id, resolution.outcome, resolution.crash_point, resolution.target
                );
            }
            Ok(None) => {}
            Err(e) => {
                self.protocol_errors += 1;
                error!("Tracker rejected {}: {}", event.data.name(), e);
            }
        }

        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to round events.
    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.event_tx.subscribe()
    }

    /// The engine (read-only).
    pub fn engine(&self) -> &RoundEngine<C> {
        &self.engine
    }

    /// The tracker (read-only).
    pub fn tracker(&self) -> &PredictionTracker<T> {
        &self.tracker
    }

    /// Prediction statistics.
    pub fn stats(&self) -> &PredictionStats {
        &self.stats
    }

    /// Current indicators.
    pub fn indicators(&self) -> Indicators {
        Indicators::derive(&self.stats, self.engine.history())
    }

    /// Current engine phase.
    pub fn phase(&self) -> RoundPhase {
        self.engine.phase()
    }

    /// Events the tracker refused.
    pub fn protocol_errors(&self) -> u32 {
        self.protocol_errors
    }

    /// Combined readable state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            engine: self.engine.snapshot(),
            target: self.tracker.target(),
            status: self.tracker.status(),
            stats: self.stats.clone(),
            indicators: self.indicators(),
        }
    }

    /// Digest of the session's observable state.
    pub fn compute_hash(&self) -> StateHash {
        let mut hasher = StateHasher::for_session_state();

        hasher.update_u64(self.engine.now());
        hasher.update_u8(self.engine.phase().as_u8());
        hasher.update_f64(self.engine.multiplier());
        match self.engine.current_round() {
            Some(round) => {
                hasher.update_u8(1);
                hasher.update_u64(round.id.0);
                hasher.update_f64(round.crash_point());
                hasher.update_u32(round.ticks);
            }
            None => hasher.update_u8(0),
        }
        hasher.update_f64_slice(&self.engine.history().to_vec());

        hasher.update_opt_f64(self.tracker.target());
        hasher.update_u8(self.tracker.status().as_u8());
        hasher.update_u32(self.stats.total);
        hasher.update_u32(self.stats.successful);
        hasher.update_u32(self.stats.failed);
        hasher.update_u32(self.stats.best_streak);

        hasher.finalize()
    }
}
