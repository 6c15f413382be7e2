//! Deferred response storage.
//!
//! Module responses are kept under their session id in a process-local map
//! and, JSON-encoded, in the shared cache so that any replica can answer a
//! later poll. An entry is written once and never replaced before it expires.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cmdhub_core::Cache;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const PRUNE_THRESHOLD: usize = 1_024;

pub struct ResponseStore {
    local: RwLock<HashMap<String, (Value, Instant)>>,
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl ResponseStore {
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self {
            local: RwLock::new(HashMap::new()),
            cache,
            ttl,
        }
    }

    pub fn cache_key(session_id: &str) -> String {
        format!("response:{session_id}")
    }

    /// Store `response` for `session_id`. Returns `false` if one is already held.
    pub async fn store(&self, session_id: &str, response: &Value) -> bool {
        let now = Instant::now();
        {
            let mut local = self.local.write().await;
            if local.get(session_id).is_some_and(|(_, exp)| *exp > now) {
                warn!(session_id, "Response already stored for session; keeping the first");
                return false;
            }
            if local.len() >= PRUNE_THRESHOLD {
                local.retain(|_, (_, exp)| *exp > now);
            }
            local.insert(session_id.to_string(), (response.clone(), now + self.ttl));
        }

        match serde_json::to_vec(response) {
            Ok(bytes) => {
                if let Err(e) = self.cache.set(&Self::cache_key(session_id), bytes, self.ttl).await {
                    warn!(session_id, error = %e, "Failed to write response to shared cache");
                }
            }
            Err(e) => warn!(session_id, error = %e, "Response is not serializable"),
        }
        debug!(session_id, "Stored response");
        true
    }

    /// Local map first, then the shared cache.
    pub async fn get(&self, session_id: &str) -> Option<Value> {
        if let Some((value, exp)) = self.local.read().await.get(session_id) {
            if *exp > Instant::now() {
                return Some(value.clone());
            }
        }

        let key = Self::cache_key(session_id);
        match self.cache.get(&key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(session_id, error = %e, "Cached response is not valid JSON");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(session_id, error = %e, "Shared cache read failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdhub_infra::MemoryCache;
    use serde_json::json;

    const HOUR: Duration = Duration::from_secs(3_600);

    #[tokio::test]
    async fn repeated_gets_are_identical() {
        let store = ResponseStore::new(Arc::new(MemoryCache::new()), HOUR);
        let response = json!({"text": "go follow bob", "embed": {"color": 7}});
        assert!(store.store("sess_1", &response).await);

        let first = store.get("sess_1").await.unwrap();
        let second = store.get("sess_1").await.unwrap();
        assert_eq!(serde_json::to_vec(&first).unwrap(), serde_json::to_vec(&second).unwrap());
        assert_eq!(first, response);
    }

    #[tokio::test]
    async fn first_write_wins() {
        let store = ResponseStore::new(Arc::new(MemoryCache::new()), HOUR);
        assert!(store.store("sess_1", &json!(1)).await);
        assert!(!store.store("sess_1", &json!(2)).await);
        assert_eq!(store.get("sess_1").await, Some(json!(1)));
    }

    #[tokio::test]
    async fn other_replicas_read_through_shared_cache() {
        let shared = Arc::new(MemoryCache::new());
        let writer = ResponseStore::new(shared.clone(), HOUR);
        let reader = ResponseStore::new(shared, HOUR);
        writer.store("sess_9", &json!({"ok": true})).await;
        assert_eq!(reader.get("sess_9").await, Some(json!({"ok": true})));
        assert!(reader.get("sess_unknown").await.is_none());
    }

    #[tokio::test]
    async fn entries_expire() {
        let store = ResponseStore::new(Arc::new(MemoryCache::new()), Duration::from_millis(10));
        store.store("sess_1", &json!("x")).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.get("sess_1").await.is_none());
    }
}
