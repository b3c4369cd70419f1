//! Deterministic Random Number Generation
//!
//! Uses Xorshift128+ for fast, deterministic randomness behind the
//! [`RandomSource`] trait, so the engine and the tracker can be fed either a
//! seeded generator or a scripted sequence of draws.

use std::collections::VecDeque;

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

/// Source of uniform random draws.
///
/// Implementors only need [`RandomSource::next_unit`]; [`RandomSource::draw`]
/// maps a unit value onto a half-open [`DrawRange`].
pub trait RandomSource {
    /// Next value in `[0, 1)`.
    fn next_unit(&mut self) -> f64;

    /// Draw a value uniformly from `range`.
    fn draw(&mut self, range: &DrawRange) -> f64 {
        range.sample(self.next_unit())
    }
}

/// Half-open interval `[min, max)` used for crash point and target draws.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DrawRange {
    /// Inclusive lower bound.
    pub min: f64,
    /// Exclusive upper bound.
    pub max: f64,
}

impl DrawRange {
    /// Create a new range.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Check that both bounds are finite and `min < max`.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min < self.max
    }

    /// Check whether `value` lies in `[min, max)`.
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value < self.max
    }

    /// Map a unit value in `[0, 1)` onto the range.
    ///
    /// Rounding can push `min + unit * width` onto `max`; such results are
    /// pulled back to the largest representable value below `max`.
    pub fn sample(&self, unit: f64) -> f64 {
        let value = self.min + unit.clamp(0.0, 1.0) * (self.max - self.min);
        if value < self.max {
            value
        } else {
            next_below(self.max).max(self.min)
        }
    }
}

/// Largest f64 strictly below `x` (for finite `x`).
fn next_below(x: f64) -> f64 {
    if x == 0.0 {
        -f64::from_bits(1)
    } else if x > 0.0 {
        f64::from_bits(x.to_bits() - 1)
    } else {
        f64::from_bits(x.to_bits() + 1)
    }
}

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Determinism Guarantee
///
/// Given the same seed, this RNG produces the exact same sequence
/// of random numbers on any platform.
///
/// # Example
///
/// ```
/// use crash_predictor::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Create an RNG for one named stream of a master seed.
    pub fn for_stream(master_seed: u64, stream: &[u8]) -> Self {
        Self::new(derive_stream_seed(master_seed, stream))
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a random f64 in `[0, 1)` from the upper 53 bits.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Get current state (for checkpointing/debugging).
    pub fn state(&self) -> [u64; 2] {
        self.state
    }

    /// Restore from saved state.
    pub fn set_state(&mut self, state: [u64; 2]) {
        self.state = state;
    }
}

impl RandomSource for DeterministicRng {
    #[inline]
    fn next_unit(&mut self) -> f64 {
        self.next_f64()
    }
}

/// Replays a fixed list of draws, in order.
///
/// Each queued value is returned verbatim by [`RandomSource::draw`],
/// regardless of the requested range. Once exhausted, draws fall back to the
/// range minimum. Used for replaying recorded rounds.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSource {
    draws: VecDeque<f64>,
}

impl ScriptedSource {
    /// Create a source that yields `draws` in order.
    pub fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        Self {
            draws: draws.into_iter().collect(),
        }
    }

    /// Number of draws left.
    pub fn remaining(&self) -> usize {
        self.draws.len()
    }
}

impl RandomSource for ScriptedSource {
    fn next_unit(&mut self) -> f64 {
        self.draws.pop_front().unwrap_or(0.0)
    }

    fn draw(&mut self, range: &DrawRange) -> f64 {
        self.draws.pop_front().unwrap_or(range.min)
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive the seed of a named random stream from a master seed.
///
/// Crash points and prediction targets draw from separate streams so that
/// neither can be inferred from the other.
pub fn derive_stream_seed(master_seed: u64, stream: &[u8]) -> u64 {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"CRASH_PREDICTOR_SEED_V1");
    hasher.update(master_seed.to_le_bytes());
    hasher.update(stream);

    let hash = hasher.finalize();

    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// TESTS
// =============================================================================
