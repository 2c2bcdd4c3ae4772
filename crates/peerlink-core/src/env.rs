//! Environment abstraction.
//!
//! State machines never read the clock or an RNG directly. Production code
//! passes a system-backed implementation; the harness passes a seeded one
//! with virtual time so that runs are reproducible.

use std::{future::Future, time::Duration, time::Instant};

/// Source of time and randomness for the session state machines.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current time.
    fn now(&self) -> Instant;

    /// Wait for `duration` to elapse.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Random `u64` built from [`Environment::random_bytes`].
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    }
}
