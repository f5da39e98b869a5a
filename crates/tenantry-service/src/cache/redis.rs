//! Redis-backed counters shared across processes.

use std::time::Duration;

use deadpool_redis::{Config, Pool, Runtime};
use redis::Script;
use tenantry_core::error::TenantryResult;
use tenantry_core::repository::SharedCache;
use tracing::info;

use crate::error::CacheError;

/// Increment, and set the expiry only when the increment created the key.
const INCREMENT_WITH_EXPIRY: &str = r"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return count
";

#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
    script: Script,
    key_prefix: String,
}

impl RedisCache {
    /// Build a connection pool for `url` and verify it with a `PING`.
    pub async fn connect(url: &str, key_prefix: &str) -> Result<Self, CacheError> {
        info!(url = %url, "Connecting to Redis");
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Unavailable(format!("failed to create pool: {e}")))?;

        let mut conn = pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        Ok(Self {
            pool,
            script: Script::new(INCREMENT_WITH_EXPIRY),
            key_prefix: key_prefix.to_string(),
        })
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, CacheError> {
        let mut conn = self.pool.get().await?;
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let count: u64 = self
            .script
            .key(format!("{}{key}", self.key_prefix))
            .arg(ttl_ms)
            .invoke_async(&mut conn)
            .await?;
        Ok(count)
    }
}

impl SharedCache for RedisCache {
    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> TenantryResult<u64> {
        Ok(self.increment(key, ttl).await?)
    }
}
