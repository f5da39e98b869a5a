//! Throttle gate: per-operation rate limits on shared-cache counters.
//!
//! A call is counted under `rl:{operation}:{scope}:{actor}` with the rule's
//! window as expiry. When the rule has a minimum spacing, a second key
//! (`…:spacing`) expiring after that interval must be fresh as well; it is
//! created by an allowed call, so spacing is measured from the last call that
//! got through.

use std::sync::Arc;

use tenantry_core::error::{TenantryError, TenantryResult};
use tenantry_core::repository::SharedCache;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{Operation, ThrottleConfig, ThrottleRule};

pub struct ThrottleGate<C: SharedCache> {
    cache: C,
    config: Arc<ThrottleConfig>,
}

impl<C: SharedCache> ThrottleGate<C> {
    pub fn new(cache: C, config: ThrottleConfig) -> Self {
        Self {
            cache,
            config: Arc::new(config),
        }
    }

    pub fn key(operation: Operation, scope: Uuid, actor: Uuid) -> String {
        format!("rl:{}:{scope}:{actor}", operation.as_str())
    }

    /// Fail with `RateLimited` unless `actor` may run `operation` on `scope` now.
    pub async fn check(
        &self,
        operation: Operation,
        scope: Uuid,
        actor: Uuid,
    ) -> TenantryResult<()> {
        if self.allow(operation, scope, actor).await? {
            Ok(())
        } else {
            Err(TenantryError::RateLimited {
                operation: operation.as_str().to_string(),
            })
        }
    }

    pub async fn allow(
        &self,
        operation: Operation,
        scope: Uuid,
        actor: Uuid,
    ) -> TenantryResult<bool> {
        let rule = *self.config.rule(operation);
        self.allow_key(&Self::key(operation, scope, actor), &rule).await
    }

    /// Count one call against `key` under `rule`.
    pub async fn allow_key(&self, key: &str, rule: &ThrottleRule) -> TenantryResult<bool> {
        if rule.limit == 0 {
            return Ok(true);
        }
        match self.count(key, rule).await {
            Ok(allowed) => {
                if !allowed {
                    debug!(key = %key, limit = rule.limit, "Throttle denied call");
                }
                Ok(allowed)
            }
            Err(e) if self.config.fail_open => {
                warn!(key = %key, error = %e, "Throttle cache unavailable, allowing call");
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    async fn count(&self, key: &str, rule: &ThrottleRule) -> TenantryResult<bool> {
        if rule.min_spacing_ms > 0 {
            let recent = self
                .cache
                .increment_with_expiry(&format!("{key}:spacing"), rule.min_spacing())
                .await?;
            if recent > 1 {
                return Ok(false);
            }
        }
        let count = self.cache.increment_with_expiry(key, rule.window()).await?;
        Ok(count <= rule.limit)
    }
}
