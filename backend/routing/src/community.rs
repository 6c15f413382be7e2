//! Entity → community resolution.
//!
//! Looks in the cache under `entity:community:{entity_id}` first, then in the
//! community store. Only found mappings are cached, so a channel provisioned
//! after a miss is picked up on its next event.

use std::sync::Arc;
use std::time::Duration;

use cmdhub_core::{Cache, CommunityStore, HubResult};
use tracing::{debug, warn};

pub struct CommunityResolver {
    cache: Arc<dyn Cache>,
    store: Arc<dyn CommunityStore>,
    ttl: Duration,
}

impl CommunityResolver {
    pub fn new(cache: Arc<dyn Cache>, store: Arc<dyn CommunityStore>, ttl: Duration) -> Self {
        Self { cache, store, ttl }
    }

    pub fn cache_key(entity_id: &str) -> String {
        format!("entity:community:{entity_id}")
    }

    /// `Ok(None)` when the entity has no active mapping.
    ///
    /// Cache faults are logged and bypassed; store faults propagate.
    pub async fn resolve(&self, entity_id: &str) -> HubResult<Option<String>> {
        let key = Self::cache_key(entity_id);
        match self.cache.get(&key).await {
            Ok(Some(bytes)) => match String::from_utf8(bytes) {
                Ok(community) if !community.is_empty() => {
                    debug!(entity_id, community = %community, "Community cache hit");
                    return Ok(Some(community));
                }
                _ => warn!(key = %key, "Ignoring malformed cached community"),
            },
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Community cache read failed"),
        }

        let Some(community) = self.store.active_community(entity_id).await? else {
            debug!(entity_id, "No active community mapping");
            return Ok(None);
        };

        if let Err(e) = self.cache.set(&key, community.clone().into_bytes(), self.ttl).await {
            warn!(key = %key, error = %e, "Community cache write failed");
        }
        Ok(Some(community))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BrokenCache, CountingStore};
    use cmdhub_infra::MemoryCache;

    const TTL: Duration = Duration::from_secs(300);

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let store = Arc::new(CountingStore {
            community: Some("community-1".into()),
            ..Default::default()
        });
        let resolver = CommunityResolver::new(Arc::new(MemoryCache::new()), store.clone(), TTL);

        assert_eq!(resolver.resolve("disc-1").await.unwrap().as_deref(), Some("community-1"));
        assert_eq!(resolver.resolve("disc-1").await.unwrap().as_deref(), Some("community-1"));
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn misses_are_not_cached() {
        let store = Arc::new(CountingStore::default());
        let resolver = CommunityResolver::new(Arc::new(MemoryCache::new()), store.clone(), TTL);

        assert!(resolver.resolve("disc-404").await.unwrap().is_none());
        assert!(resolver.resolve("disc-404").await.unwrap().is_none());
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn cache_outage_falls_through_to_store() {
        let store = Arc::new(CountingStore {
            community: Some("community-1".into()),
            ..Default::default()
        });
        let cache = Arc::new(BrokenCache::default());
        let resolver = CommunityResolver::new(cache.clone(), store, TTL);

        assert_eq!(resolver.resolve("disc-1").await.unwrap().as_deref(), Some("community-1"));
        assert_eq!(*cache.writes.lock().unwrap(), vec!["entity:community:disc-1".to_string()]);
    }

    #[tokio::test]
    async fn store_errors_propagate() {
        let store = Arc::new(CountingStore { fail: true, ..Default::default() });
        let resolver = CommunityResolver::new(Arc::new(MemoryCache::new()), store, TTL);
        assert!(resolver.resolve("disc-1").await.is_err());
    }
}
