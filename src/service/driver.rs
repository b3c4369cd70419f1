//! Live Round Driver
//!
//! Runs a [`RoundSession`] against wall-clock time. One tokio task owns a
//! tick interval at the engine's tick period and advances the session's
//! virtual clock by exactly one period per interval tick, so the live
//! sequence matches an offline replay of the same seed. Missed ticks are
//! skipped rather than bursted.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument};

use crate::core::clock::Millis;
use crate::core::rng::{DeterministicRng, RandomSource};
use crate::game::events::RoundEvent;
use crate::service::session::{RoundSession, SessionSnapshot};

/// Commands accepted by the driver task.
#[derive(Debug)]
pub enum DriverCommand {
    /// Start a round; replies whether it started.
    StartRound {
        /// Reply channel.
        reply: oneshot::Sender<bool>,
    },
    /// Stop ticking, shut the session down and end the task.
    Shutdown,
}

/// Driver errors.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The driver task is no longer running.
    #[error("Round driver is closed")]
    Closed,

    /// The driver task panicked or was cancelled.
    #[error("Round driver task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Handle to a running driver.
pub struct DriverHandle<C: RandomSource = DeterministicRng, T: RandomSource = DeterministicRng> {
    session: Arc<RwLock<RoundSession<C, T>>>,
    command_tx: mpsc::Sender<DriverCommand>,
    task: Option<JoinHandle<()>>,
}

/// Spawn a driver task for `session` on the current tokio runtime.
pub fn spawn<C, T>(session: RoundSession<C, T>) -> DriverHandle<C, T>
where
    C: RandomSource + Send + Sync + 'static,
    T: RandomSource + Send + Sync + 'static,
{
    let period = session.engine().config().tick_interval_ms;
    let session = Arc::new(RwLock::new(session));
    let (command_tx, command_rx) = mpsc::channel(32);

    let task = tokio::spawn(run_loop(session.clone(), command_rx, period));

    DriverHandle {
        session,
        command_tx,
        task: Some(task),
    }
}

#[instrument(skip(session, command_rx))]
async fn run_loop<C, T>(
    session: Arc<RwLock<RoundSession<C, T>>>,
    mut command_rx: mpsc::Receiver<DriverCommand>,
    period: Millis,
) where
    C: RandomSource + Send + Sync + 'static,
    T: RandomSource + Send + Sync + 'static,
{
    let mut ticker = interval(Duration::from_millis(period));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately
    ticker.tick().await;

    info!("Round driver running, tick every {}ms", period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut session = session.write().await;
                for event in session.advance(period) {
                    debug!("{} {}", event.round_id, event.data.name());
                }
            }
            command = command_rx.recv() => {
                match command {
                    Some(DriverCommand::StartRound { reply }) => {
                        let started = session.write().await.start_round();
                        let _ = reply.send(started);
                    }
                    Some(DriverCommand::Shutdown) | None => {
                        session.write().await.shutdown();
                        info!("Round driver stopped");
                        break;
                    }
                }
            }
        }
    }
}

impl<C, T> DriverHandle<C, T>
where
    C: RandomSource + Send + Sync + 'static,
    T: RandomSource + Send + Sync + 'static,
{
    /// Ask the driver to start a round. `Ok(false)` if one is in progress.
    pub async fn start_round(&self) -> Result<bool, DriverError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(DriverCommand::StartRound { reply })
            .await
            .map_err(|_| DriverError::Closed)?;
        rx.await.map_err(|_| DriverError::Closed)
    }

    /// Subscribe to round events.
    pub async fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.session.read().await.subscribe()
    }

    /// Current combined state.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.read().await.snapshot()
    }

    /// Is the driver task still running?
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the driver and wait for its task to end.
    pub async fn shutdown(&mut self) -> Result<(), DriverError> {
        // Already closed is fine
        let _ = self.command_tx.send(DriverCommand::Shutdown).await;
        if let Some(task) = self.task.take() {
            task.await?;
        }
        Ok(())
    }
}
