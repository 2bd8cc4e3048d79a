//! Deterministic pseudo-random source
//!
//! A tiny mixing recurrence, not a cryptographic or statistically strong
//! generator. What matters is that the same seed always yields the same
//! sequence, and that the state is a single `u64` that can be saved and
//! restored so fuzzing can borrow entropy without disturbing the signal.

use parking_lot::{Mutex, MutexGuard};
use rand::RngCore;
use std::sync::Arc;

/// Seed used when none is configured.
pub const DEFAULT_SEED: u64 = 0x3141_5926_5358_9793;

/// Seeded generator producing values in `[0, 1)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Random {
    seed: u64,
}

impl Default for Random {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl Random {
    /// Create a generator from an explicit seed
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Current state. Restoring it with [`Random::set_seed`] replays the
    /// exact same sequence of draws.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restore a previously saved state
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    fn step(&mut self) -> u32 {
        for _ in 0..3 {
            self.seed = (self.seed << 4).wrapping_sub(self.seed) ^ 1;
        }
        (self.seed >> 32) as u32
    }

    /// Draw a value in `[0, 1)`
    pub fn draw(&mut self) -> f64 {
        self.step() as f64 / 4_294_967_296.0
    }
}

impl RngCore for Random {
    fn next_u32(&mut self) -> u32 {
        self.step()
    }

    fn next_u64(&mut self) -> u64 {
        let hi = self.step() as u64;
        let lo = self.step() as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        rand::rand_core::impls::fill_bytes_via_next(self, dst)
    }
}

/// Shared handle to one [`Random`].
///
/// The signal pipeline and the fuzz hook inside a channel's `write` both run on
/// the producer thread and must consume the same sequence, so they hold clones
/// of this handle. Different test cases can use independent handles.
#[derive(Debug, Clone, Default)]
pub struct SharedRandom(Arc<Mutex<Random>>);

impl SharedRandom {
    pub fn new(seed: u64) -> Self {
        Self(Arc::new(Mutex::new(Random::new(seed))))
    }

    /// Lock the generator for a batch of draws
    pub fn lock(&self) -> MutexGuard<'_, Random> {
        self.0.lock()
    }

    pub fn seed(&self) -> u64 {
        self.0.lock().seed()
    }

    pub fn set_seed(&self, seed: u64) {
        self.0.lock().set_seed(seed);
    }
}
