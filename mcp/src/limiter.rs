//! Bounded in-flight request limiter. Replaces the teacher's per-client
//! token-bucket rate limiter: this server has a single client (the
//! embedding agent's MCP runtime) connected over stdio, so the concern is
//! bounding concurrent tool-call work, not smoothing request rate across
//! many clients.

use std::sync::Arc;

use tokio::sync::{Semaphore, SemaphorePermit};

pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;

/// Caps the number of `tools/call` requests executing concurrently.
pub struct InFlightLimiter {
    semaphore: Arc<Semaphore>,
}

impl InFlightLimiter {
    #[must_use]
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_in_flight)),
        }
    }

    /// Acquire a permit, waiting if the limiter is saturated.
    ///
    /// # Panics
    ///
    /// Never panics in normal operation; the semaphore is only ever
    /// closed if `close` is called, which this type never does.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        self.semaphore
            .acquire()
            .await
            .unwrap_or_else(|_| unreachable!("limiter semaphore is never closed"))
    }

    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Default for InFlightLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IN_FLIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn permits_are_bounded_and_released() {
        let limiter = InFlightLimiter::new(2);
        assert_eq!(limiter.available_permits(), 2);
        let p1 = limiter.acquire().await;
        let p2 = limiter.acquire().await;
        assert_eq!(limiter.available_permits(), 0);
        drop(p1);
        assert_eq!(limiter.available_permits(), 1);
        drop(p2);
        assert_eq!(limiter.available_permits(), 2);
    }
}
