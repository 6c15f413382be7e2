//! Sliding-window rate limiter keyed by arbitrary strings.
//!
//! Each key keeps the instants of its admitted calls inside the window. A call
//! is admitted while fewer than `limit` remain; denied calls are not recorded,
//! so a key recovers exactly one window after its oldest admitted call.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cmdhub_core::{HubResult, RateLimiter};
use tokio::sync::Mutex;
use tracing::debug;

/// Admitted calls for one key, with the window they were last checked against.
#[derive(Default)]
struct Window {
    span: Duration,
    hits: VecDeque<Instant>,
}

#[derive(Clone, Default)]
pub struct SlidingWindowLimiter {
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl SlidingWindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget keys with no admitted call inside their own window.
    /// Returns how many keys were dropped.
    pub async fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, w| {
            w.hits
                .back()
                .is_some_and(|last| now.duration_since(*last) < w.span)
        });
        let removed = before - windows.len();
        if removed > 0 {
            debug!(removed, "Rate limiter cleanup");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.windows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn check(&self, key: &str, limit: u32, window: Duration) -> HubResult<bool> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let entry = windows.entry(key.to_string()).or_default();
        entry.span = window;
        let hits = &mut entry.hits;

        while hits
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) >= window)
        {
            hits.pop_front();
        }

        if hits.len() < limit as usize {
            hits.push_back(now);
            debug!(key = %key, count = hits.len(), limit, "Rate limit check: allowed");
            Ok(true)
        } else {
            debug!(key = %key, count = hits.len(), limit, "Rate limit check: denied");
            Ok(false)
        }
    }
}
