//! Provisioning transaction coordinator.
//!
//! Repositories ship each multi-record write to the database as one
//! transaction, so a failed attempt leaves nothing behind. The coordinator
//! re-runs the whole body when the store reports a transient serialization
//! conflict, and bounds every attempt by the caller's deadline.

use std::future::Future;
use std::time::{Duration, Instant};

use tenantry_core::RequestContext;
use tenantry_core::error::{TenantryError, TenantryResult};
use tracing::{debug, warn};

use crate::config::ServiceConfig;

#[derive(Debug, Clone, Copy)]
pub struct TransactionCoordinator {
    max_attempts: u32,
    default_timeout: Option<Duration>,
}

impl TransactionCoordinator {
    pub fn new(max_attempts: u32, default_timeout: Option<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            default_timeout,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.max_attempts, config.operation_timeout())
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The caller's deadline, or the configured default timeout from now.
    pub fn deadline(&self, ctx: &RequestContext) -> Option<Instant> {
        ctx.deadline
            .or_else(|| self.default_timeout.map(|t| Instant::now() + t))
    }

    /// Run `fut` to completion unless `deadline` passes first.
    pub async fn within<T, F>(&self, deadline: Option<Instant>, fut: F) -> TenantryResult<T>
    where
        F: Future<Output = TenantryResult<T>>,
    {
        let Some(deadline) = deadline else {
            return fut.await;
        };
        if Instant::now() >= deadline {
            return Err(TenantryError::DeadlineExceeded);
        }
        tokio::time::timeout_at(tokio::time::Instant::from_std(deadline), fut)
            .await
            .map_err(|_| TenantryError::DeadlineExceeded)?
    }

    /// Run `body` until it succeeds, fails with a non-transient error, or
    /// runs out of attempts.
    ///
    /// Each attempt calls `body` afresh, so values it reads are re-read.
    /// No attempt starts after the deadline.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        deadline: Option<Instant>,
        mut body: F,
    ) -> TenantryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = TenantryResult<T>>,
    {
        for attempt in 1..=self.max_attempts {
            match self.within(deadline, body()).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Transaction succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(TenantryError::TransactionConflict(msg)) => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %msg,
                        "Serialization conflict, retrying transaction"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Err(TenantryError::RetriesExhausted {
            operation: operation.to_string(),
            attempts: self.max_attempts,
        })
    }
}

impl Default for TransactionCoordinator {
    fn default() -> Self {
        Self::from_config(&ServiceConfig::default())
    }
}
