//! Crash Predictor Server
//!
//! Runs crash rounds with a prediction tracker on top.
//! By default plays a batch of rounds on the virtual clock and verifies the
//! run replays to the same state hash. `--live` drives rounds in real time.

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crash_predictor::{
    service::{self, RoundSession},
    RoundEvent, RoundEventData, SimulationConfig, VERSION,
};

/// Rounds played by the offline demo.
const DEMO_ROUNDS: usize = 20;

/// Rounds played in live mode.
const LIVE_ROUNDS: usize = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let mut live = false;
    let mut config_path = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--live" => live = true,
            _ => config_path = Some(arg),
        }
    }

    let config = match &config_path {
        Some(path) => SimulationConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => SimulationConfig::default(),
    };

    info!("Crash Predictor Server v{}", VERSION);
    info!(
        "Tick: {}ms x{:.2}, crash range [{:.2}, {:.2}), dwell {}ms",
        config.engine.tick_interval_ms,
        config.engine.growth_per_tick,
        config.engine.crash_range.min,
        config.engine.crash_range.max,
        config.engine.dwell_ms,
    );

    let seed = config.resolve_seed();

    if live {
        live_rounds(&config, seed).await
    } else {
        demo_rounds(&config, seed)
    }
}

/// Play one full round (start, crash, reset) on the virtual clock.
fn play_round(session: &mut RoundSession) -> Vec<RoundEvent> {
    let tick = session.engine().config().tick_interval_ms;
    let mut events = Vec::new();

    if !session.start_round() {
        return events;
    }

    loop {
        let batch = session.advance(tick);
        let done = batch.iter().any(|e| e.data == RoundEventData::RoundReset);
        events.extend(batch);
        if done {
            return events;
        }
    }
}

/// Offline demo plus determinism check.
fn demo_rounds(config: &SimulationConfig, seed: u64) -> anyhow::Result<()> {
    info!("=== Starting Demo ({} rounds, seed {}) ===", DEMO_ROUNDS, seed);

    let mut session = RoundSession::with_seed(config, seed)?;
    let mut total_events = 0;

    for _ in 0..DEMO_ROUNDS {
        let events = play_round(&mut session);
        total_events += events.len();

        for event in &events {
            if let RoundEventData::RoundCrashed { crash_point } = event.data {
                let indicators = session.indicators();
                info!(
                    "{} crashed at {:.2}x after {}ms (confidence {:?}, trend {:?})",
                    event.round_id,
                    crash_point,
                    event.at,
                    indicators.confidence,
                    indicators.trend,
                );
            }
        }
    }

    info!("=== Results ===");
    let stats = session.stats();
    info!(
        "Predictions: {} total, {} successful, {} failed",
        stats.total, stats.successful, stats.failed
    );
    if let Some(accuracy) = stats.accuracy() {
        info!("Accuracy: {:.1}% (best streak {})", accuracy, stats.best_streak);
    }
    let history = session.engine().history();
    let chips: Vec<String> = history
        .tiers()
        .map(|(crash_point, tier)| format!("{:.2}x/{:?}", crash_point, tier))
        .collect();
    info!("History: [{}]", chips.join(", "));
    if let Some(mean) = history.mean() {
        info!("Mean crash point: {:.2}x", mean);
    }
    info!("Total events: {}", total_events);

    let hash = session.compute_hash();
    info!("Final State Hash: {}", hex::encode(hash));

    // Verify determinism by replaying
    info!("=== Verifying Determinism ===");
    let mut replay = RoundSession::with_seed(config, seed)?;
    for _ in 0..DEMO_ROUNDS {
        play_round(&mut replay);
    }
    let replay_hash = replay.compute_hash();
    info!("Replay State Hash: {}", hex::encode(replay_hash));

    if hash == replay_hash {
        info!("DETERMINISM VERIFIED: Hashes match!");
    } else {
        warn!("DETERMINISM FAILURE: Hashes differ!");
    }

    if session.protocol_errors() > 0 {
        warn!("{} tracker protocol errors", session.protocol_errors());
    }

    Ok(())
}

/// Real-time rounds through the driver.
async fn live_rounds(config: &SimulationConfig, seed: u64) -> anyhow::Result<()> {
    info!("=== Live Mode ({} rounds, seed {}) ===", LIVE_ROUNDS, seed);

    let mut driver = service::spawn(RoundSession::with_seed(config, seed)?);
    let mut rx = driver.subscribe().await;

    for _ in 0..LIVE_ROUNDS {
        if !driver.start_round().await? {
            warn!("Round already in progress");
        }

        loop {
            match rx.recv().await {
                Ok(event) => {
                    info!("{} {} at {}ms", event.round_id, event.data.name(), event.at);
                    if event.data == RoundEventData::RoundReset {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!("Skipped {} events", skipped),
                Err(RecvError::Closed) => anyhow::bail!("Event channel closed"),
            }
        }

        let snapshot = driver.snapshot().await;
        info!(
            "Stats: {}/{} successful, confidence {:?}",
            snapshot.stats.successful, snapshot.stats.total, snapshot.indicators.confidence
        );
    }

    driver.shutdown().await?;
    Ok(())
}
