//! Shared-cache error types.

use tenantry_core::error::TenantryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache command failed: {0}")]
    Command(String),
}

impl From<CacheError> for TenantryError {
    fn from(err: CacheError) -> Self {
        TenantryError::Cache(err.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Command(err.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<deadpool_redis::PoolError> for CacheError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        CacheError::Unavailable(err.to_string())
    }
}
