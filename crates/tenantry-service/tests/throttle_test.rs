//! Throttle gate behaviour on a paused clock.

use std::time::Duration;

use tenantry_core::error::{TenantryError, TenantryResult};
use tenantry_core::repository::SharedCache;
use tenantry_service::{MemoryCache, Operation, ThrottleConfig, ThrottleGate, ThrottleRule};
use uuid::Uuid;

/// A cache that is always down.
struct BrokenCache;

impl SharedCache for BrokenCache {
    async fn increment_with_expiry(&self, _key: &str, _ttl: Duration) -> TenantryResult<u64> {
        Err(TenantryError::Cache("connection refused".into()))
    }
}

fn config_with(rule: ThrottleRule) -> ThrottleConfig {
    ThrottleConfig {
        zone_create: rule,
        ..ThrottleConfig::unlimited()
    }
}

#[tokio::test(start_paused = true)]
async fn limit_applies_per_window() {
    let rule = ThrottleRule {
        limit: 3,
        window_ms: 60_000,
        min_spacing_ms: 0,
    };
    let gate = ThrottleGate::new(MemoryCache::new(), config_with(rule));
    let (business, actor) = (Uuid::new_v4(), Uuid::new_v4());

    for _ in 0..3 {
        assert!(gate.allow(Operation::ZoneCreate, business, actor).await.unwrap());
    }
    assert!(!gate.allow(Operation::ZoneCreate, business, actor).await.unwrap());

    tokio::time::advance(Duration::from_secs(59)).await;
    assert!(!gate.allow(Operation::ZoneCreate, business, actor).await.unwrap());

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(gate.allow(Operation::ZoneCreate, business, actor).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn denied_check_reports_the_operation() {
    let rule = ThrottleRule {
        limit: 1,
        window_ms: 60_000,
        min_spacing_ms: 0,
    };
    let gate = ThrottleGate::new(MemoryCache::new(), config_with(rule));
    let (business, actor) = (Uuid::new_v4(), Uuid::new_v4());

    gate.check(Operation::ZoneCreate, business, actor)
        .await
        .unwrap();
    let err = gate
        .check(Operation::ZoneCreate, business, actor)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TenantryError::RateLimited {
            operation: "shipping_zone:create".into()
        }
    );
    assert!(err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn min_spacing_rejects_rapid_repeats() {
    let rule = ThrottleRule {
        limit: 100,
        window_ms: 60_000,
        min_spacing_ms: 1_000,
    };
    let gate = ThrottleGate::new(MemoryCache::new(), config_with(rule));
    let (business, actor) = (Uuid::new_v4(), Uuid::new_v4());

    assert!(gate.allow(Operation::ZoneCreate, business, actor).await.unwrap());
    tokio::time::advance(Duration::from_millis(300)).await;
    assert!(!gate.allow(Operation::ZoneCreate, business, actor).await.unwrap());
    tokio::time::advance(Duration::from_millis(300)).await;
    assert!(!gate.allow(Operation::ZoneCreate, business, actor).await.unwrap());

    // Spacing counts from the last allowed call, not the last attempt.
    tokio::time::advance(Duration::from_millis(400)).await;
    assert!(gate.allow(Operation::ZoneCreate, business, actor).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn keys_are_isolated_by_scope_actor_and_operation() {
    let rule = ThrottleRule {
        limit: 1,
        window_ms: 60_000,
        min_spacing_ms: 0,
    };
    let config = ThrottleConfig {
        zone_create: rule,
        zone_delete: rule,
        ..ThrottleConfig::unlimited()
    };
    let gate = ThrottleGate::new(MemoryCache::new(), config);
    let (business, actor) = (Uuid::new_v4(), Uuid::new_v4());

    assert!(gate.allow(Operation::ZoneCreate, business, actor).await.unwrap());
    assert!(!gate.allow(Operation::ZoneCreate, business, actor).await.unwrap());

    assert!(
        gate.allow(Operation::ZoneCreate, business, Uuid::new_v4())
            .await
            .unwrap()
    );
    assert!(
        gate.allow(Operation::ZoneCreate, Uuid::new_v4(), actor)
            .await
            .unwrap()
    );
    assert!(gate.allow(Operation::ZoneDelete, business, actor).await.unwrap());
}

#[tokio::test]
async fn disabled_rule_never_touches_the_cache() {
    let gate = ThrottleGate::new(BrokenCache, ThrottleConfig {
        fail_open: false,
        ..ThrottleConfig::unlimited()
    });
    assert!(
        gate.allow(Operation::BusinessCreate, Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn cache_failure_fails_open_by_default() {
    let rule = ThrottleRule::per_minute(1, 0);
    let gate = ThrottleGate::new(BrokenCache, config_with(rule));
    for _ in 0..3 {
        assert!(
            gate.allow(Operation::ZoneCreate, Uuid::new_v4(), Uuid::new_v4())
                .await
                .unwrap()
        );
    }
}

#[tokio::test]
async fn cache_failure_propagates_when_failing_closed() {
    let rule = ThrottleRule::per_minute(1, 0);
    let config = ThrottleConfig {
        fail_open: false,
        ..config_with(rule)
    };
    let gate = ThrottleGate::new(BrokenCache, config);
    let err = gate
        .check(Operation::ZoneCreate, Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "cache_error");
}

#[tokio::test(start_paused = true)]
async fn default_rules_match_operation_budgets() {
    let gate = ThrottleGate::new(MemoryCache::new(), ThrottleConfig::default());
    let (business, actor) = (Uuid::new_v4(), Uuid::new_v4());

    let mut allowed = 0;
    for _ in 0..200 {
        if gate
            .allow(Operation::PaymentMethodUpdate, business, actor)
            .await
            .unwrap()
        {
            allowed += 1;
        }
        tokio::time::advance(Duration::from_millis(250)).await;
    }
    // 200 calls spaced 250ms apart span 50s of one 60s window.
    assert_eq!(allowed, 120);
}
