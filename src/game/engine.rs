//! Round Engine
//!
//! Drives one crash round at a time:
//!
//! ```text
//!   idle --start_round()--> running --multiplier >= crash_point--> crashed
//!    ^                                                                |
//!    +-------------------------- dwell elapsed -----------------------+
//! ```
//!
//! Ticks and the auto-reset are timers on the engine's own virtual
//! [`Scheduler`], so a round replays exactly given the same random source.

use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};

use crate::config::ConfigError;
use crate::core::clock::{Millis, Scheduler, TimerId};
use crate::core::rng::{DeterministicRng, DrawRange, RandomSource};
use crate::game::events::RoundEvent;
use crate::game::history::{CrashHistory, DEFAULT_HISTORY_LEN, MAX_HISTORY_LEN};
use crate::game::state::{EngineSnapshot, Round, RoundId, RoundPhase};

/// Configuration for the round engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Interval between growth ticks (ms).
    pub tick_interval_ms: Millis,
    /// Multiplicative growth applied each tick.
    pub growth_per_tick: f64,
    /// Range the crash point is drawn from.
    pub crash_range: DrawRange,
    /// Time spent in `crashed` before returning to `idle` (ms).
    pub dwell_ms: Millis,
    /// Crash points kept in history.
    pub history_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            growth_per_tick: 1.01,
            crash_range: DrawRange::new(1.0, 11.0),
            dwell_ms: 15_000,
            history_len: DEFAULT_HISTORY_LEN,
        }
    }
}

impl EngineConfig {
    /// Reject configurations the engine cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be positive".into()));
        }
        if !(self.growth_per_tick.is_finite() && self.growth_per_tick > 1.0) {
            return Err(ConfigError::Invalid("growth_per_tick must be finite and > 1.0".into()));
        }
        if !self.crash_range.is_valid() || self.crash_range.min < 1.0 {
            return Err(ConfigError::Invalid(
                "crash_range must be a finite [min, max) with 1.0 <= min < max".into(),
            ));
        }
        if self.history_len == 0 || self.history_len > MAX_HISTORY_LEN {
            return Err(ConfigError::Invalid(format!(
                "history_len must be in 1..={}",
                MAX_HISTORY_LEN
            )));
        }
        Ok(())
    }
}

/// Timers the engine schedules on its clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EngineTimer {
    Tick,
    Reset,
}

/// The crash round state machine.
#[derive(Debug)]
pub struct RoundEngine<R: RandomSource = DeterministicRng> {
    config: EngineConfig,
    rng: R,
    scheduler: Scheduler<EngineTimer>,
    phase: RoundPhase,
    /// Current round, or the last one until superseded.
    round: Option<Round>,
    /// Multiplier shown to consumers; kept after a crash.
    multiplier: f64,
    history: CrashHistory,
    last_round_id: RoundId,
    tick_timer: Option<TimerId>,
    reset_timer: Option<TimerId>,
}

impl<R: RandomSource> RoundEngine<R> {
    /// Create an idle engine.
    pub fn new(config: EngineConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        let history = CrashHistory::new(config.history_len);

        Ok(Self {
            config,
            rng,
            scheduler: Scheduler::new(),
            phase: RoundPhase::Idle,
            round: None,
            multiplier: 1.0,
            history,
            last_round_id: RoundId::default(),
            tick_timer: None,
            reset_timer: None,
        })
    }

    /// Start a round.
    ///
    /// Only valid in `idle`. In any other phase this is a no-op: nothing is
    /// drawn and no event is returned.
    pub fn start_round(&mut self) -> Option<RoundEvent> {
        if self.phase != RoundPhase::Idle {
            debug!("start_round ignored in phase {:?}", self.phase);
            return None;
        }

        let id = self.last_round_id.next();
        let now = self.scheduler.now();
        let crash_point = self.rng.draw(&self.config.crash_range);

        self.last_round_id = id;
        self.round = Some(Round::new(id, crash_point, now));
        self.multiplier = 1.0;
        self.phase = RoundPhase::Running;
        self.tick_timer = Some(
            self.scheduler
                .schedule_every(self.config.tick_interval_ms, EngineTimer::Tick),
        );

        info!("Round {} started", id);
        Some(RoundEvent::started(id, now))
    }

    /// Advance the virtual clock by `elapsed` ms.
    pub fn advance(&mut self, elapsed: Millis) -> Vec<RoundEvent> {
        let target = self.scheduler.now().saturating_add(elapsed);
        self.advance_to(target)
    }

    /// Advance the virtual clock to `now`, firing every due timer in order.
    ///
    /// Returns the events emitted, in the order the transitions happened.
    pub fn advance_to(&mut self, now: Millis) -> Vec<RoundEvent> {
        let mut events = Vec::new();

        while let Some(firing) = self.scheduler.pop_due(now) {
            let event = match firing.payload {
                EngineTimer::Tick => self.on_tick(firing.at),
                EngineTimer::Reset => self.on_reset(firing.at),
            };
            events.extend(event);
        }
        self.scheduler.set_now(now);

        events
    }

    /// Cancel all pending timers and return to `idle` silently.
    ///
    /// No event is emitted and no timer from before the call can fire
    /// afterwards. History is kept.
    pub fn shutdown(&mut self) {
        self.scheduler.cancel_all();
        self.tick_timer = None;
        self.reset_timer = None;
        if self.phase != RoundPhase::Idle {
            warn!("Engine shut down in phase {:?}", self.phase);
        }
        self.phase = RoundPhase::Idle;
    }

    fn on_tick(&mut self, at: Millis) -> Option<RoundEvent> {
        let growth = self.config.growth_per_tick;
        let round = match (self.phase, self.round.as_mut()) {
            (RoundPhase::Running, Some(round)) => round,
            _ => {
                warn!("Stray tick at {}ms in phase {:?}", at, self.phase);
                return None;
            }
        };

        round.multiplier *= growth;
        round.ticks += 1;
        self.multiplier = round.multiplier;

        #[cfg(feature = "debug-tracing")]
        tracing::trace!("Round {} tick {}: {:.4}x", round.id, round.ticks, round.multiplier);

        if !round.has_reached_crash() {
            return None;
        }

        round.crashed_at = Some(at);
        let id = round.id;
        let crash_point = round.crash_point();
        let ticks = round.ticks;

        // Leave `running` and stop ticking in the same step.
        if let Some(tick) = self.tick_timer.take() {
            self.scheduler.cancel(tick);
        }
        self.phase = RoundPhase::Crashed;
        self.history.record(crash_point);
        self.reset_timer = Some(
            self.scheduler
                .schedule_once(self.config.dwell_ms, EngineTimer::Reset),
        );

        info!("Round {} crashed at {:.2}x after {} ticks", id, crash_point, ticks);
        Some(RoundEvent::crashed(id, at, crash_point))
    }

    fn on_reset(&mut self, at: Millis) -> Option<RoundEvent> {
        self.reset_timer = None;
        if self.phase != RoundPhase::Crashed {
            warn!("Stray reset at {}ms in phase {:?}", at, self.phase);
            return None;
        }

        self.phase = RoundPhase::Idle;
        let id = self.last_round_id;
        debug!("Round {} reset", id);
        Some(RoundEvent::reset(id, at))
    }

    /// Current phase.
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Current multiplier (the last round's final value outside `running`).
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Current or most recent round.
    pub fn current_round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    /// Crash history, newest first.
    pub fn history(&self) -> &CrashHistory {
        &self.history
    }

    /// Virtual clock.
    pub fn now(&self) -> Millis {
        self.scheduler.now()
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of timers still pending (tick and/or reset).
    pub fn pending_timers(&self) -> usize {
        self.scheduler.pending()
    }

    /// Read-only snapshot for consumers.
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            now: self.scheduler.now(),
            phase: self.phase,
            multiplier: self.multiplier,
            round_id: self.round.as_ref().map(|r| r.id),
            history: self.history.to_vec(),
            tiers: self.history.tiers().map(|(_, tier)| tier).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::ScriptedSource;
    use crate::game::events::RoundEventData;
    use crate::game::history::CrashTier;
    use proptest::prelude::*;

    fn scripted(crash_points: &[f64]) -> RoundEngine<ScriptedSource> {
        RoundEngine::new(EngineConfig::default(), ScriptedSource::new(crash_points.iter().copied()))
            .unwrap()
    }

    /// Ticks needed for repeated 1.01 growth to reach `crash_point`.
    /// Crash is only checked on a tick, so this is at least 1.
    fn ticks_to_reach(crash_point: f64) -> u32 {
        let mut m = 1.0f64;
        let mut n = 0;
        loop {
            m *= 1.01;
            n += 1;
            if m >= crash_point {
                return n;
            }
        }
    }

    #[test]
    fn test_start_enters_running() {
        let mut engine = scripted(&[2.0]);
        assert_eq!(engine.phase(), RoundPhase::Idle);

        let event = engine.start_round().unwrap();
        assert_eq!(event.data, RoundEventData::RoundStarted);
        assert_eq!(event.round_id, RoundId(1));
        assert_eq!(engine.phase(), RoundPhase::Running);
        assert_eq!(engine.multiplier(), 1.0);
        assert_eq!(engine.current_round().unwrap().crash_point(), 2.0);
    }

    #[test]
    fn test_start_while_running_is_noop() {
        let mut engine = scripted(&[2.0, 9.0]);
        engine.start_round().unwrap();
        engine.advance(500);

        assert!(engine.start_round().is_none());
        let round = engine.current_round().unwrap();
        assert_eq!(round.id, RoundId(1));
        assert_eq!(round.crash_point(), 2.0);
        assert_eq!(round.ticks, 10);
    }

    #[test]
    fn test_crash_at_two() {
        let mut engine = scripted(&[2.0]);
        engine.start_round().unwrap();

        // 1.01^69 < 2.0 <= 1.01^70
        let events = engine.advance(69 * 50);
        assert!(events.is_empty());
        assert_eq!(engine.phase(), RoundPhase::Running);
        assert!(engine.multiplier() < 2.0);

        let events = engine.advance(50);
        assert_eq!(events, vec![RoundEvent::crashed(RoundId(1), 3_500, 2.0)]);
        assert_eq!(engine.phase(), RoundPhase::Crashed);
        assert_eq!(engine.history().to_vec(), vec![2.0]);
        assert!(engine.multiplier() >= 2.0);
        assert_eq!(engine.current_round().unwrap().ticks, 70);
    }

    #[test]
    fn test_no_ticks_after_crash() {
        let mut engine = scripted(&[1.5]);
        engine.start_round().unwrap();
        engine.advance(10_000);
        assert_eq!(engine.phase(), RoundPhase::Crashed);

        let ticks = engine.current_round().unwrap().ticks;
        let multiplier = engine.multiplier();
        engine.advance(1_000);
        assert_eq!(engine.current_round().unwrap().ticks, ticks);
        assert_eq!(engine.multiplier(), multiplier);
        // Only the reset timer is left
        assert_eq!(engine.pending_timers(), 1);
    }

    #[test]
    fn test_start_while_crashed_is_noop() {
        let mut engine = scripted(&[1.5, 3.0]);
        engine.start_round().unwrap();
        engine.advance(5_000);
        assert_eq!(engine.phase(), RoundPhase::Crashed);
        assert!(engine.start_round().is_none());
    }

    #[test]
    fn test_reset_after_dwell() {
        let mut engine = scripted(&[2.0]);
        engine.start_round().unwrap();
        engine.advance(3_500);
        assert_eq!(engine.phase(), RoundPhase::Crashed);

        assert!(engine.advance(14_999).is_empty());
        assert_eq!(engine.phase(), RoundPhase::Crashed);

        let events = engine.advance(1);
        assert_eq!(events, vec![RoundEvent::reset(RoundId(1), 18_500)]);
        assert_eq!(engine.phase(), RoundPhase::Idle);
        assert_eq!(engine.pending_timers(), 0);
    }

    #[test]
    fn test_full_cycle_in_one_advance_is_ordered() {
        let mut engine = scripted(&[1.2]);
        engine.start_round().unwrap();
        let events = engine.advance(60_000);
        let names: Vec<_> = events.iter().map(|e| e.data.name()).collect();
        assert_eq!(names, vec!["round_crashed", "round_reset"]);
    }

    #[test]
    fn test_crash_point_at_lower_bound_crashes_on_first_tick() {
        let mut engine = scripted(&[1.0]);
        engine.start_round().unwrap();
        let events = engine.advance(50);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].crash_point(), Some(1.0));
        assert_eq!(engine.current_round().unwrap().ticks, 1);
    }

    #[test]
    fn test_twelve_rounds_keep_eleven() {
        let points: Vec<f64> = (1..=12).map(|i| 1.0 + i as f64 * 0.1).collect();
        let mut engine = scripted(&points);

        for _ in 0..12 {
            engine.start_round().unwrap();
            engine.advance(60_000);
            assert_eq!(engine.phase(), RoundPhase::Idle);
        }

        let history = engine.history().to_vec();
        assert_eq!(history.len(), 11);
        assert_eq!(history[0], points[11]);
        assert_eq!(history[10], points[1]);
        assert!(!history.contains(&points[0]));
    }

    #[test]
    fn test_shutdown_invalidates_pending_reset() {
        let mut engine = scripted(&[1.5]);
        engine.start_round().unwrap();
        engine.advance(5_000);
        assert_eq!(engine.phase(), RoundPhase::Crashed);

        engine.shutdown();
        assert_eq!(engine.phase(), RoundPhase::Idle);
        assert_eq!(engine.pending_timers(), 0);
        assert!(engine.advance(60_000).is_empty());
        assert_eq!(engine.history().len(), 1);
    }

    #[test]
    fn test_shutdown_while_running_stops_ticks() {
        let mut engine = scripted(&[9.0]);
        engine.start_round().unwrap();
        engine.advance(500);
        engine.shutdown();

        let multiplier = engine.multiplier();
        assert!(engine.advance(60_000).is_empty());
        assert_eq!(engine.multiplier(), multiplier);
        assert!(engine.history().is_empty());
    }

    #[test]
    fn test_seeded_engines_replay_identically() {
        let run = |seed| {
            let mut engine =
                RoundEngine::new(EngineConfig::default(), DeterministicRng::new(seed)).unwrap();
            let mut log = Vec::new();
            for _ in 0..5 {
                log.extend(engine.start_round());
                log.extend(engine.advance(30_000));
            }
            log
        };
        assert_eq!(run(77), run(77));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            growth_per_tick: 1.0,
            ..Default::default()
        };
        assert!(RoundEngine::new(config, ScriptedSource::default()).is_err());

        let config = EngineConfig {
            crash_range: DrawRange::new(0.5, 2.0),
            ..Default::default()
        };
        assert!(RoundEngine::new(config, ScriptedSource::default()).is_err());

        let config = EngineConfig {
            history_len: MAX_HISTORY_LEN + 1,
            ..Default::default()
        };
        assert!(RoundEngine::new(config, ScriptedSource::default()).is_err());

        let config = EngineConfig {
            history_len: usize::MAX,
            ..Default::default()
        };
        assert!(RoundEngine::new(config, ScriptedSource::default()).is_err());
    }

    #[test]
    fn test_snapshot() {
        let mut engine = scripted(&[2.0]);
        engine.start_round().unwrap();
        engine.advance(3_500);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.phase, RoundPhase::Crashed);
        assert_eq!(snapshot.round_id, Some(RoundId(1)));
        assert_eq!(snapshot.history, vec![2.0]);
        assert_eq!(snapshot.tiers, vec![CrashTier::High]);
        assert_eq!(snapshot.now, 3_500);
    }

    proptest! {
        #[test]
        fn prop_multiplier_monotonic_and_crashes_on_first_reaching_tick(crash_point in 1.0f64..11.0) {
            let mut engine = scripted(&[crash_point]);
            engine.start_round().unwrap();
            prop_assert_eq!(engine.multiplier(), 1.0);

            let mut last = engine.multiplier();
            let mut crashed_on = None;
            for tick in 1..=300u32 {
                let events = engine.advance(50);
                let m = engine.multiplier();
                prop_assert!(m >= last);
                last = m;
                // Fixed crash point for the whole round
                prop_assert_eq!(engine.current_round().unwrap().crash_point(), crash_point);
                if let Some(event) = events.first() {
                    prop_assert_eq!(event.crash_point(), Some(crash_point));
                    crashed_on = Some(tick);
                    break;
                }
                prop_assert!(m < crash_point);
            }
            prop_assert_eq!(crashed_on, Some(ticks_to_reach(crash_point)));
        }

        #[test]
        fn prop_seeded_crash_points_in_range(seed in any::<u64>()) {
            let mut engine = RoundEngine::new(EngineConfig::default(), DeterministicRng::new(seed)).unwrap();
            for _ in 0..5 {
                engine.start_round().unwrap();
                let cp = engine.current_round().unwrap().crash_point();
                prop_assert!((1.0..11.0).contains(&cp));
                engine.advance(30_000);
            }
        }
    }
}
