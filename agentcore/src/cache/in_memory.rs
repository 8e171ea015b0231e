//! In-memory cache implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use super::{Cache, CacheError};

struct CacheEntry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self) -> bool {
        if let Some(expires_at) = self.expires_at {
            expires_at < Instant::now()
        } else {
            false
        }
    }
}

/// In-memory cache implementation.
///
/// Stores values in memory using a `HashMap`, with optional per-entry TTL.
/// Used for the bounded file-content cache (§5) and anywhere else an
/// expensive result (e.g. a model-spec lookup) is worth memoizing.
pub struct InMemoryCache<K, V> {
    data: Arc<RwLock<HashMap<K, CacheEntry<V>>>>,
}

impl<K, V> InMemoryCache<K, V>
where
    K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<K, V> Default for InMemoryCache<K, V>
where
    K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl<K, V> Cache<K, V> for InMemoryCache<K, V>
where
    K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<V> {
        let data = self.data.read().await;
        if let Some(entry) = data.get(key) {
            if entry.is_expired() {
                return None;
            }
            return Some(entry.value.clone());
        }
        None
    }

    async fn set(&self, key: K, value: V, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        let entry = CacheEntry { value, expires_at };
        let mut data = self.data.write().await;
        data.insert(key, entry);
        Ok(())
    }

    async fn delete(&self, key: &K) -> Result<(), CacheError> {
        let mut data = self.data.write().await;
        data.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut data = self.data.write().await;
        data.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn basic_set_then_get_roundtrips() {
        let cache = InMemoryCache::new();
        assert_eq!(cache.get(&"key".to_string()).await, None);

        cache
            .set("key".to_string(), "value".to_string(), None)
            .await
            .unwrap();
        assert_eq!(
            cache.get(&"key".to_string()).await,
            Some("value".to_string())
        );
    }

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let cache = InMemoryCache::new();
        cache
            .set(
                "key".to_string(),
                "value".to_string(),
                Some(Duration::from_millis(50)),
            )
            .await
            .unwrap();

        assert_eq!(
            cache.get(&"key".to_string()).await,
            Some("value".to_string())
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cache.get(&"key".to_string()).await, None);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let cache = InMemoryCache::new();
        cache
            .set("key".to_string(), "value".to_string(), None)
            .await
            .unwrap();
        cache.delete(&"key".to_string()).await.unwrap();
        assert_eq!(cache.get(&"key".to_string()).await, None);
    }

    #[tokio::test]
    async fn clear_empties_cache() {
        let cache = InMemoryCache::new();
        cache
            .set("key1".to_string(), "value1".to_string(), None)
            .await
            .unwrap();
        cache
            .set("key2".to_string(), "value2".to_string(), None)
            .await
            .unwrap();
        cache.clear().await.unwrap();
        assert_eq!(cache.get(&"key1".to_string()).await, None);
        assert_eq!(cache.get(&"key2".to_string()).await, None);
    }
}
