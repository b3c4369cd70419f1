//! State Hashing for Verification
//!
//! Deterministic SHA-256 digest of session state, used to check that two
//! sessions replaying the same seed produced the same rounds.

use sha2::{Sha256, Digest};

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Deterministic hasher for session state.
///
/// Order of updates is critical for determinism.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for session state.
    pub fn for_session_state() -> Self {
        Self::new(b"CRASH_PREDICTOR_STATE_V1")
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with the exact bit pattern of an f64.
    #[inline]
    pub fn update_f64(&mut self, value: f64) {
        self.update_u64(value.to_bits());
    }

    /// Update with an optional f64 (presence byte, then value).
    pub fn update_opt_f64(&mut self, value: Option<f64>) {
        match value {
            Some(v) => {
                self.update_u8(1);
                self.update_f64(v);
            }
            None => self.update_u8(0),
        }
    }

    /// Update with a length-prefixed slice of f64 values.
    pub fn update_f64_slice(&mut self, values: &[f64]) {
        self.update_u32(values.len() as u32);
        for v in values {
            self.update_f64(*v);
        }
    }

    /// Finalize and get hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_determinism() {
        let mut h1 = StateHasher::for_session_state();
        let mut h2 = StateHasher::for_session_state();
        for h in [&mut h1, &mut h2] {
            h.update_u64(7);
            h.update_f64_slice(&[2.0, 3.5]);
            h.update_opt_f64(None);
        }
        assert_eq!(h1.finalize(), h2.finalize());
    }

    #[test]
    fn test_option_presence_matters() {
        let mut a = StateHasher::for_session_state();
        a.update_opt_f64(None);
        let mut b = StateHasher::for_session_state();
        b.update_opt_f64(Some(0.0));
        assert_ne!(a.finalize(), b.finalize());
    }

    #[test]
    fn test_domain_separation() {
        let a = StateHasher::new(b"A").finalize();
        let b = StateHasher::new(b"B").finalize();
        assert_ne!(a, b);
    }
}
