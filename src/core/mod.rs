//! Core deterministic primitives.
//!
//! Randomness, virtual time and state hashing. Nothing in here reads the
//! system clock or an OS entropy source.

pub mod clock;
pub mod rng;
pub mod hash;

// Re-export core types
pub use clock::{Millis, Scheduler, TimerId};
pub use rng::{DeterministicRng, DrawRange, RandomSource, ScriptedSource};
pub use hash::{StateHash, StateHasher};
