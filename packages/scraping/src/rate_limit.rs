//! Per-domain request pacing.
//!
//! One gate per domain: `acquire` blocks until the configured minimum
//! interval has elapsed since the previous acquire for that domain, then
//! records the new acquire time. Acquires for the same domain are
//! serialised through a per-domain mutex; unrelated domains never contend.
//!
//! Jitter is deliberately NOT applied here. The fetcher adds a 100-500 ms
//! random delay after the gate so that pacing tests can measure the bare
//! interval.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Per-domain minimum-interval gate.
pub struct RateLimiter {
    /// Domain -> last-acquire slot. The outer lock only guards map
    /// shape (double-checked creation); waiting happens on the inner
    /// per-domain mutex.
    domains: std::sync::Mutex<HashMap<String, Arc<Mutex<Option<Instant>>>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    /// Create a new rate limiter with no tracked domains.
    pub fn new() -> Self {
        Self {
            domains: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, domain: &str) -> Arc<Mutex<Option<Instant>>> {
        let mut map = self.domains.lock().unwrap();
        map.entry(domain.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Block until at least `min_interval` has elapsed since the last
    /// acquire for `domain`, then record the new acquire time.
    ///
    /// Concurrent acquires for the same domain queue on the domain's
    /// mutex, so the observed inter-arrival time at the remote host is
    /// always >= `min_interval`.
    pub async fn acquire(&self, domain: &str, min_interval: Duration) {
        let slot = self.slot(domain);
        let mut last = slot.lock().await;

        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < min_interval {
                let wait = min_interval - elapsed;
                debug!(domain = %domain, wait_ms = wait.as_millis() as u64, "rate limiting");
                tokio::time::sleep(wait).await;
            }
        }

        *last = Some(Instant::now());
    }

    /// Forget the last-acquire time for one domain.
    pub fn reset(&self, domain: &str) {
        self.domains.lock().unwrap().remove(domain);
    }

    /// Forget all tracked domains.
    pub fn reset_all(&self) {
        self.domains.lock().unwrap().clear();
    }

    /// Number of domains currently tracked.
    pub fn tracked_domains(&self) -> usize {
        self.domains.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_domain_waits() {
        let limiter = RateLimiter::new();
        let interval = Duration::from_millis(100);

        let start = Instant::now();
        limiter.acquire("example.com", interval).await;
        limiter.acquire("example.com", interval).await;
        let elapsed = start.elapsed();

        assert!(
            elapsed >= interval,
            "second acquire should wait: {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn test_different_domains_proceed_in_parallel() {
        let limiter = Arc::new(RateLimiter::new());
        let interval = Duration::from_millis(200);

        // Prime both domains so a second acquire would have to wait.
        limiter.acquire("a.com", interval).await;
        limiter.acquire("b.com", interval).await;

        // A fresh domain must not be delayed by the others.
        let start = Instant::now();
        limiter.acquire("c.com", interval).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_concurrent_acquires_serialise() {
        let limiter = Arc::new(RateLimiter::new());
        let interval = Duration::from_millis(60);

        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..3 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire("example.com", interval).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Three acquires at 60ms spacing need at least 120ms.
        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn test_reset_clears_history() {
        let limiter = RateLimiter::new();
        let interval = Duration::from_millis(200);

        limiter.acquire("example.com", interval).await;
        limiter.reset("example.com");

        let start = Instant::now();
        limiter.acquire("example.com", interval).await;
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(limiter.tracked_domains(), 1);
    }
}
