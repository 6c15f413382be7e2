//! Periodic eviction for the in-process cache and rate limiter.
//!
//! Expired entries already read as misses; the sweeper keeps them from
//! accumulating in a long-running server.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::cache::MemoryCache;
use crate::rate_limiter::SlidingWindowLimiter;

/// Sweeps whichever of the two stores it is given every `every`.
///
/// Runs until the returned handle is aborted. Must be called inside a Tokio runtime.
pub fn spawn_sweeper(
    cache: Option<MemoryCache>,
    limiter: Option<SlidingWindowLimiter>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let expired = match &cache {
                Some(cache) => cache.cleanup().await,
                None => 0,
            };
            let idle_keys = match &limiter {
                Some(limiter) => limiter.cleanup().await,
                None => 0,
            };
            debug!(expired, idle_keys, "Sweep finished");
        }
    })
}
