//! Shared-cache adapters behind the [`SharedCache`] port.
//!
//! [`MemoryCache`] keeps counters in process and is enough for a single
//! instance or for tests. Deployments running several instances against one
//! database enable the `redis` feature and use `RedisCache`, so every
//! instance counts against the same keys.

#[cfg(feature = "redis")]
mod redis;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tenantry_core::error::TenantryResult;
use tenantry_core::repository::SharedCache;
use tokio::time::Instant;

#[cfg(feature = "redis")]
pub use self::redis::RedisCache;

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u64,
    expires_at: Instant,
}

/// Process-local counters on a monotonic clock.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    counters: Arc<DashMap<String, Counter>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop counters whose window has elapsed.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.counters.retain(|_, counter| counter.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

impl SharedCache for MemoryCache {
    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> TenantryResult<u64> {
        let now = Instant::now();
        // The entry guard holds the shard lock, so read-modify-write is atomic per key.
        let mut counter = self.counters.entry(key.to_string()).or_insert(Counter {
            count: 0,
            expires_at: now + ttl,
        });
        if counter.expires_at <= now {
            *counter = Counter {
                count: 0,
                expires_at: now + ttl,
            };
        }
        counter.count += 1;
        Ok(counter.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn counter_resets_after_ttl() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(10);

        assert_eq!(cache.increment_with_expiry("k", ttl).await.unwrap(), 1);
        assert_eq!(cache.increment_with_expiry("k", ttl).await.unwrap(), 2);

        tokio::time::advance(Duration::from_secs(5)).await;
        // Expiry is fixed when the key is created, not extended by later hits.
        assert_eq!(cache.increment_with_expiry("k", ttl).await.unwrap(), 3);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.increment_with_expiry("k", ttl).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent_and_purged() {
        let cache = MemoryCache::new();
        cache
            .increment_with_expiry("a", Duration::from_secs(1))
            .await
            .unwrap();
        cache
            .increment_with_expiry("b", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.len(), 2);

        tokio::time::advance(Duration::from_secs(2)).await;
        cache.purge_expired();
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache
                .increment_with_expiry("b", Duration::from_secs(60))
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let cache = MemoryCache::new();
        let mut handles = Vec::new();
        for _ in 0..32 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .increment_with_expiry("shared", Duration::from_secs(60))
                    .await
                    .unwrap()
            }));
        }
        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap());
        }
        counts.sort_unstable();
        assert_eq!(counts, (1..=32).collect::<Vec<u64>>());
    }
}
