//! # Crash Predictor Server
//!
//! Deterministic crash round simulation with a prediction tracker.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  CRASH PREDICTOR SERVER                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── clock.rs    - Virtual clock and timer queue             │
//! │  ├── rng.rs      - Xorshift128+ PRNG, RandomSource trait      │
//! │  └── hash.rs     - State hashing for replay checks           │
//! │                                                              │
//! │  game/           - Round engine (deterministic)              │
//! │  ├── state.rs    - Round, phase, snapshot                    │
//! │  ├── engine.rs   - idle -> running -> crashed -> idle        │
//! │  ├── history.rs  - Bounded crash history                     │
//! │  └── events.rs   - Lifecycle events                          │
//! │                                                              │
//! │  predict/        - Prediction layer (event consumer)         │
//! │  ├── tracker.rs  - Target commitment and classification      │
//! │  ├── stats.rs    - Success/failure tallies                   │
//! │  └── indicators.rs - Confidence and trend                    │
//! │                                                              │
//! │  service/        - Wiring and live runtime                   │
//! │  ├── session.rs  - Engine -> tracker -> subscribers          │
//! │  └── driver.rs   - tokio interval driver                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! `core/`, `game/`, `predict/` and `service::session` never read the system
//! clock. Time moves only through `advance`, and all randomness comes from
//! injected [`RandomSource`]s. Given the same seed, a session produces
//! identical rounds, events and state hash.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod predict;
pub mod service;

// Re-export commonly used types
pub use config::{ConfigError, SimulationConfig};
pub use crate::core::rng::{DeterministicRng, DrawRange, RandomSource, ScriptedSource};
pub use game::{RoundEngine, RoundEvent, RoundEventData, RoundId, RoundPhase};
pub use predict::{Outcome, PredictionStatus, PredictionTracker};
pub use service::{RoundSession, SessionSnapshot};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
