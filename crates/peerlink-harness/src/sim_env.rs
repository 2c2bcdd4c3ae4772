//! Simulated environment.
//!
//! Seeded ChaCha RNG and a virtual clock. Sleeping advances the clock
//! instead of waiting, so timer-driven behaviour runs instantly and the
//! same seed always produces the same secure codes.

use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use peerlink_core::env::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Deterministic environment for simulation.
#[derive(Debug, Clone)]
pub struct SimEnv {
    clock: Arc<Mutex<Instant>>,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimEnv {
    /// Environment seeded with `seed`, clock starting now.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            clock: Arc::new(Mutex::new(Instant::now())),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Move the virtual clock forward.
    pub fn advance(&self, duration: Duration) {
        *self.clock.lock().unwrap_or_else(PoisonError::into_inner) += duration;
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        *self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        // Advance on first poll so an unpolled sleep leaves the clock alone
        let env = self.clone();
        async move { env.advance(duration) }
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}
