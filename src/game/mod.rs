//! Round Logic Module
//!
//! The crash round state machine. 100% deterministic given its random source.
//!
//! ## Module Structure
//!
//! - `state`: Round, phase and snapshot types
//! - `engine`: The round engine (ticks, crash, auto-reset)
//! - `history`: Bounded crash history
//! - `events`: Lifecycle events published by the engine

pub mod state;
pub mod engine;
pub mod history;
pub mod events;

// Re-export key types
pub use state::{Round, RoundId, RoundPhase, EngineSnapshot};
pub use engine::{RoundEngine, EngineConfig};
pub use history::{CrashHistory, CrashTier};
pub use events::{RoundEvent, RoundEventData};
