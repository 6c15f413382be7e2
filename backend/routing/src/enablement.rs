//! Per-community module enablement.
//!
//! Decisions are cached as `"1"`/`"0"` under
//! `module:enabled:{community_id}:{module_name}`. A module with no
//! installation row is enabled. Any fault resolves to enabled so an outage
//! never blocks commands.

use std::sync::Arc;
use std::time::Duration;

use cmdhub_core::{Cache, CommunityStore};
use tracing::{debug, warn};

pub struct EnablementGate {
    cache: Arc<dyn Cache>,
    store: Arc<dyn CommunityStore>,
    ttl: Duration,
}

impl EnablementGate {
    pub fn new(cache: Arc<dyn Cache>, store: Arc<dyn CommunityStore>, ttl: Duration) -> Self {
        Self { cache, store, ttl }
    }

    pub fn cache_key(community_id: &str, module_name: &str) -> String {
        format!("module:enabled:{community_id}:{module_name}")
    }

    pub async fn is_enabled(&self, community_id: &str, module_name: &str) -> bool {
        let key = Self::cache_key(community_id, module_name);
        match self.cache.get(&key).await {
            Ok(Some(bytes)) => match bytes.as_slice() {
                b"1" => return true,
                b"0" => return false,
                _ => warn!(key = %key, "Ignoring malformed enablement entry"),
            },
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Enablement cache read failed"),
        }

        let enabled = match self.store.module_installation(community_id, module_name).await {
            Ok(Some(enabled)) => enabled,
            Ok(None) => true,
            Err(e) => {
                warn!(community_id, module_name, error = %e, "Enablement lookup failed; allowing");
                return true;
            }
        };
        debug!(community_id, module_name, enabled, "Module enablement resolved");

        let value = if enabled { b"1".to_vec() } else { b"0".to_vec() };
        if let Err(e) = self.cache.set(&key, value, self.ttl).await {
            warn!(key = %key, error = %e, "Enablement cache write failed");
        }
        enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BrokenCache, CountingStore};
    use cmdhub_core::Cache as _;
    use cmdhub_infra::MemoryCache;

    const TTL: Duration = Duration::from_secs(300);

    fn gate(store: Arc<CountingStore>, cache: Arc<dyn Cache>) -> EnablementGate {
        EnablementGate::new(cache, store, TTL)
    }

    #[tokio::test]
    async fn disabled_row_is_cached_as_zero() {
        let store = Arc::new(CountingStore { installation: Some(false), ..Default::default() });
        let cache = Arc::new(MemoryCache::new());
        let gate = gate(store.clone(), cache.clone());

        assert!(!gate.is_enabled("community-1", "quotes").await);
        assert!(!gate.is_enabled("community-1", "quotes").await);
        assert_eq!(store.calls(), 1);
        let cached = cache.get("module:enabled:community-1:quotes").await.unwrap();
        assert_eq!(cached.as_deref(), Some(&b"0"[..]));
    }

    #[tokio::test]
    async fn missing_row_means_enabled() {
        let store = Arc::new(CountingStore::default());
        assert!(gate(store, Arc::new(MemoryCache::new())).is_enabled("c", "m").await);
    }

    #[tokio::test]
    async fn store_fault_fails_open() {
        let store = Arc::new(CountingStore { fail: true, installation: Some(false), ..Default::default() });
        assert!(gate(store, Arc::new(MemoryCache::new())).is_enabled("c", "m").await);
    }

    #[tokio::test]
    async fn cache_outage_still_consults_store() {
        let store = Arc::new(CountingStore { installation: Some(false), ..Default::default() });
        let cache = Arc::new(BrokenCache::default());
        assert!(!gate(store.clone(), cache).is_enabled("c", "m").await);
        assert_eq!(store.calls(), 1);
    }
}
