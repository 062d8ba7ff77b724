// ABOUTME: Process-local spacing of outbound calls to blockchain RPC and indexer hosts
// ABOUTME: Reserves the next free slot per host in a DashMap and sleeps until it arrives
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! Outbound RPC rate limiting.
//!
//! State lives in this process only. Several server instances each keep their
//! own spacing, and a restart forgets it.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::{sleep, Instant};
use tracing::debug;
use url::Url;

/// Minimum spacing between calls to the same host
#[derive(Clone, Debug)]
pub struct RpcRateLimiter {
    /// Host -> time of the most recently reserved call slot
    slots: Arc<DashMap<String, Instant>>,
    min_interval: Duration,
}

impl RpcRateLimiter {
    /// Create a limiter enforcing `min_interval` per host
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            min_interval,
        }
    }

    /// Wait until a call to `endpoint` is allowed
    ///
    /// The slot is reserved before sleeping, so concurrent callers queue up
    /// one `min_interval` apart instead of all waking at once.
    pub async fn acquire(&self, endpoint: &str) {
        let wait = self.reserve(&host_key(endpoint), Instant::now());
        if !wait.is_zero() {
            debug!(endpoint, wait_ms = wait.as_millis(), "Spacing outbound RPC call");
            sleep(wait).await;
        }
    }

    fn reserve(&self, key: &str, now: Instant) -> Duration {
        let mut entry = self
            .slots
            .entry(key.to_owned())
            .or_insert_with(|| now.checked_sub(self.min_interval).unwrap_or(now));
        let earliest = *entry.value() + self.min_interval;
        let slot = earliest.max(now);
        *entry.value_mut() = slot;
        drop(entry);
        slot - now
    }

    /// Number of hosts currently tracked
    #[must_use]
    pub fn tracked_hosts(&self) -> usize {
        self.slots.len()
    }
}

/// Rate-limit key for an endpoint: its host, or the raw string if unparsable
fn host_key(endpoint: &str) -> String {
    Url::parse(endpoint)
        .ok()
        .and_then(|url| url.host_str().map(str::to_owned))
        .unwrap_or_else(|| endpoint.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_key() {
        assert_eq!(host_key("https://api.mainnet-beta.solana.com"), "api.mainnet-beta.solana.com");
        assert_eq!(host_key("https://mempool.space/api/tx/abc"), "mempool.space");
        assert_eq!(host_key("not a url"), "not a url");
    }

    #[test]
    fn test_slots_are_spaced_per_host() {
        let limiter = RpcRateLimiter::new(Duration::from_millis(1_000));
        let now = Instant::now();

        assert_eq!(limiter.reserve("a", now), Duration::ZERO);
        assert_eq!(limiter.reserve("a", now), Duration::from_millis(1_000));
        assert_eq!(limiter.reserve("a", now), Duration::from_millis(2_000));
        assert_eq!(limiter.reserve("b", now), Duration::ZERO);
        assert_eq!(limiter.tracked_hosts(), 2);

        let later = now + Duration::from_millis(5_000);
        assert_eq!(limiter.reserve("a", later), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_out_the_interval() {
        let limiter = RpcRateLimiter::new(Duration::from_millis(500));
        let start = Instant::now();
        limiter.acquire("https://mempool.space/api").await;
        limiter.acquire("https://mempool.space/api/tx/1").await;
        assert!(start.elapsed() >= Duration::from_millis(500));
    }
}
