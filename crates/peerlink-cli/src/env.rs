//! System environment: tokio clock and timers, thread-local RNG.

use std::{
    future::Future,
    time::{Duration, Instant},
};

use peerlink_core::env::Environment;
use rand::RngCore;

/// Production [`Environment`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        // Same clock as `sleep`, so a paused runtime stays consistent.
        tokio::time::Instant::now().into_std()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        rand::thread_rng().fill_bytes(buffer);
    }
}

#[cfg(test)]
mod tests {
    use peerlink_core::handshake::generate_code;

    use super::*;

    #[test]
    fn codes_vary() {
        let codes: Vec<String> = (0..8).map(|_| generate_code(&SystemEnv)).collect();
        assert!(codes.windows(2).any(|pair| pair[0] != pair[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn clock_follows_tokio_time() {
        let start = SystemEnv.now();
        SystemEnv.sleep(Duration::from_secs(5)).await;
        assert!(SystemEnv.now().duration_since(start) >= Duration::from_secs(5));
    }
}
