//! Resilient call pipeline for Blockfrost requests.
//!
//! Every remote call goes through the same three layers, in order:
//! cache lookup -> circuit-breaker gate -> retry loop -> underlying call.
//! A cache hit short-circuits everything, an open circuit fails fast
//! without consuming a retry, and a recoverable failure is retried with
//! exponential backoff before the final error propagates.

use moka::Expiry;
use moka::future::Cache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::services::blockfrost::BlockfrostError;
use crate::services::circuit_breaker::CircuitBreaker;

/// Per-call retry/cache configuration.
#[derive(Debug, Clone)]
pub struct CallPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    /// None disables caching for this call.
    pub cache_timeout: Option<Duration>,
    pub service_name: &'static str,
}

impl CallPolicy {
    /// Default policy for transaction lookups. Historical chain facts do
    /// not change, so results can live in the cache for minutes.
    pub fn lookup() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            cache_timeout: Some(Duration::from_secs(300)),
            service_name: "blockfrost",
        }
    }

    /// Policy for balance/UTXO queries. Balances move with every block,
    /// so the cache window is seconds-scale.
    pub fn balance() -> Self {
        Self {
            cache_timeout: Some(Duration::from_secs(60)),
            ..Self::lookup()
        }
    }

    /// Policy for transaction submission. Replaying a submit is not
    /// idempotent from the caller's viewpoint, so it is neither cached
    /// nor retried; it still reports to the circuit breaker.
    pub fn submit() -> Self {
        Self {
            max_retries: 0,
            cache_timeout: None,
            ..Self::lookup()
        }
    }
}

#[derive(Clone)]
struct CachedEntry {
    value: serde_json::Value,
    ttl: Duration,
}

/// Lets each cache entry carry the TTL of the policy that stored it.
struct PerEntryExpiry;

impl Expiry<String, CachedEntry> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &CachedEntry,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

#[derive(Clone)]
pub struct ResilientClient {
    cache: Cache<String, CachedEntry>,
    breaker: Arc<CircuitBreaker>,
}

impl ResilientClient {
    pub fn new(breaker: Arc<CircuitBreaker>) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .expire_after(PerEntryExpiry)
            .build();

        Self { cache, breaker }
    }

    /// Fixed-length cache key from the call name and its arguments.
    fn cache_key(name: &str, args: &[&str]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        for arg in args {
            hasher.update(b":");
            hasher.update(arg.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Run `f` through the cache, circuit breaker, and retry layers.
    ///
    /// `name` and `args` identify the call for caching and logging. The
    /// closure is invoked once per attempt; `NotFound` propagates
    /// immediately (the service answered, a missing resource is not a
    /// service fault), and only the terminal outcome of the retry loop is
    /// reported to the circuit breaker.
    pub async fn call<T, F, Fut>(
        &self,
        policy: &CallPolicy,
        name: &str,
        args: &[&str],
        f: F,
    ) -> Result<T, BlockfrostError>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, BlockfrostError>>,
    {
        let key = policy.cache_timeout.map(|_| Self::cache_key(name, args));

        if let Some(key) = &key {
            if let Some(entry) = self.cache.get(key).await {
                if let Ok(value) = serde_json::from_value(entry.value) {
                    tracing::debug!("Cache hit for {}", name);
                    return Ok(value);
                }
            }
        }

        if self.breaker.is_open(policy.service_name) {
            tracing::warn!(
                "Circuit open for {}, rejecting {} without calling",
                policy.service_name,
                name
            );
            return Err(BlockfrostError::ServiceUnavailable {
                service: policy.service_name.to_string(),
            });
        }

        let mut delay = policy.initial_delay;
        let mut attempt: u32 = 0;

        loop {
            match f().await {
                Ok(value) => {
                    self.breaker.record_success(policy.service_name);
                    if let (Some(key), Some(ttl)) = (key.clone(), policy.cache_timeout) {
                        match serde_json::to_value(&value) {
                            Ok(json) => {
                                self.cache.insert(key, CachedEntry { value: json, ttl }).await;
                            }
                            Err(e) => {
                                tracing::debug!("Skipping cache store for {}: {}", name, e);
                            }
                        }
                    }
                    return Ok(value);
                }
                Err(BlockfrostError::NotFound) => {
                    self.breaker.record_success(policy.service_name);
                    return Err(BlockfrostError::NotFound);
                }
                Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                        name,
                        attempt,
                        policy.max_retries + 1,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.mul_f64(policy.backoff_multiplier);
                }
                Err(err) => {
                    self.breaker.record_failure(policy.service_name);
                    tracing::error!("{} failed after {} attempt(s): {}", name, attempt + 1, err);
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn client() -> ResilientClient {
        ResilientClient::new(Arc::new(CircuitBreaker::default()))
    }

    fn uncached_policy() -> CallPolicy {
        CallPolicy {
            cache_timeout: None,
            ..CallPolicy::lookup()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_exhausted_before_the_error_propagates() {
        let client = client();
        let policy = uncached_policy();
        let attempts = AtomicU32::new(0);

        let result: Result<u32, _> = client
            .call(&policy, "always_failing", &[], || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(BlockfrostError::Api {
                    status: 500,
                    body: "boom".to_string(),
                })
            })
            .await;

        // 1 initial attempt + max_retries
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(BlockfrostError::Api { status: 500, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_recovers_within_the_retry_budget() {
        let client = client();
        let policy = uncached_policy();
        let attempts = AtomicU32::new(0);

        let result = client
            .call(&policy, "flaky", &[], || async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(BlockfrostError::Api {
                        status: 429,
                        body: "rate limited".to_string(),
                    })
                } else {
                    Ok(7u32)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_hit_bypasses_the_underlying_call() {
        let client = client();
        let policy = CallPolicy::lookup();
        let calls = AtomicU32::new(0);

        for _ in 0..2 {
            let result: Result<u32, _> = client
                .call(&policy, "cached_lookup", &["abc123"], || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42u32)
                })
                .await;
            assert_eq!(result.unwrap(), 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn different_arguments_do_not_share_cache_entries() {
        let client = client();
        let policy = CallPolicy::lookup();
        let calls = AtomicU32::new(0);

        for hash in ["aaa", "bbb"] {
            let _: Result<u32, _> = client
                .call(&policy, "cached_lookup", &[hash], || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(1u32)
                })
                .await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn open_circuit_fails_fast_without_calling() {
        let breaker = Arc::new(CircuitBreaker::new(1, Duration::from_secs(60)));
        breaker.record_failure("blockfrost");
        let client = ResilientClient::new(breaker);
        let policy = uncached_policy();
        let calls = AtomicU32::new(0);

        let result: Result<u32, _> = client
            .call(&policy, "gated", &[], || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(1u32)
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            result,
            Err(BlockfrostError::ServiceUnavailable { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_not_retried_and_does_not_trip_the_breaker() {
        let breaker = Arc::new(CircuitBreaker::new(1, Duration::from_secs(60)));
        let client = ResilientClient::new(breaker.clone());
        let policy = uncached_policy();
        let calls = AtomicU32::new(0);

        let result: Result<u32, _> = client
            .call(&policy, "missing", &[], || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(BlockfrostError::NotFound)
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(BlockfrostError::NotFound)));
        assert!(!breaker.is_open("blockfrost"));
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_failures_are_reported_to_the_breaker_once() {
        let breaker = Arc::new(CircuitBreaker::new(2, Duration::from_secs(60)));
        let client = ResilientClient::new(breaker.clone());
        let policy = uncached_policy();

        // One exhausted retry loop records exactly one failure, so a
        // threshold of 2 must not open after a single call.
        let _: Result<u32, _> = client
            .call(&policy, "failing", &[], || async {
                Err(BlockfrostError::Api {
                    status: 500,
                    body: "boom".to_string(),
                })
            })
            .await;
        assert!(!breaker.is_open("blockfrost"));

        let _: Result<u32, _> = client
            .call(&policy, "failing", &[], || async {
                Err(BlockfrostError::Api {
                    status: 500,
                    body: "boom".to_string(),
                })
            })
            .await;
        assert!(breaker.is_open("blockfrost"));
    }
}
