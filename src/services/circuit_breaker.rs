//! Circuit breaker for external API calls.
//!
//! Keeps a per-service failure counter and gives a failing dependency a
//! cooldown window instead of hammering it. Recovery is lazy: the circuit
//! closes again on the first `is_open` query after the window has elapsed,
//! there is no background timer.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct CircuitEntry {
    failure_count: u32,
    last_failure: Instant,
}

pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    state: Mutex<HashMap<String, CircuitEntry>>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(60))
    }
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            recovery_timeout,
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether calls to `service` should be blocked.
    ///
    /// Returns true only while the failure count has reached the threshold
    /// and the recovery window since the last failure has not yet elapsed.
    /// Once the window has passed the entry is cleared as a side effect.
    pub fn is_open(&self, service: &str) -> bool {
        let mut state = self.state.lock();
        let Some(entry) = state.get(service).copied() else {
            return false;
        };

        if entry.failure_count >= self.failure_threshold {
            if entry.last_failure.elapsed() < self.recovery_timeout {
                return true;
            }
            // Recovery window passed, close the circuit
            state.remove(service);
            return false;
        }

        // Sub-threshold entries expire after twice the recovery window
        if entry.last_failure.elapsed() >= self.recovery_timeout * 2 {
            state.remove(service);
        }

        false
    }

    /// Record a successful call, clearing the failure counter.
    pub fn record_success(&self, service: &str) {
        self.state.lock().remove(service);
    }

    /// Record a failed call, bumping the counter and stamping the time.
    pub fn record_failure(&self, service: &str) {
        let mut state = self.state.lock();

        // Drop stale entries so the map does not accumulate dead services
        let ttl = self.recovery_timeout * 2;
        state.retain(|_, entry| entry.last_failure.elapsed() < ttl);

        let entry = state.entry(service.to_string()).or_insert(CircuitEntry {
            failure_count: 0,
            last_failure: Instant::now(),
        });
        entry.failure_count += 1;
        entry.last_failure = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(5, Duration::from_secs(60));

        for _ in 0..4 {
            breaker.record_failure("x");
        }
        assert!(!breaker.is_open("x"));

        breaker.record_failure("x");
        assert!(breaker.is_open("x"));
    }

    #[tokio::test(start_paused = true)]
    async fn closes_again_after_recovery_timeout() {
        let breaker = CircuitBreaker::new(5, Duration::from_secs(60));

        for _ in 0..5 {
            breaker.record_failure("x");
        }
        assert!(breaker.is_open("x"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!breaker.is_open("x"));

        // The entry was cleared, so the next failure starts a fresh count
        breaker.record_failure("x");
        assert!(!breaker.is_open("x"));
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));

        breaker.record_failure("x");
        breaker.record_failure("x");
        breaker.record_success("x");
        breaker.record_failure("x");
        breaker.record_failure("x");
        assert!(!breaker.is_open("x"));
    }

    #[tokio::test(start_paused = true)]
    async fn services_are_tracked_independently() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(60));

        breaker.record_failure("down");
        assert!(breaker.is_open("down"));
        assert!(!breaker.is_open("healthy"));
    }
}
