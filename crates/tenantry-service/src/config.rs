//! Service configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration shared by the domain services.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Attempts per provisioning transaction, counting the first one.
    pub max_attempts: u32,
    /// Applied to operations whose caller set no deadline.
    pub operation_timeout_ms: Option<u64>,
    pub throttle: ThrottleConfig,
}

impl ServiceConfig {
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            operation_timeout_ms: None,
            throttle: ThrottleConfig::default(),
        }
    }
}

/// Rate limit for one operation, per scope and actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ThrottleRule {
    /// Calls allowed per window. Zero disables the rule.
    pub limit: u64,
    pub window_ms: u64,
    /// Minimum gap after an allowed call. Zero disables spacing.
    #[serde(default)]
    pub min_spacing_ms: u64,
}

impl ThrottleRule {
    pub const fn per_minute(limit: u64, min_spacing_ms: u64) -> Self {
        Self {
            limit,
            window_ms: 60_000,
            min_spacing_ms,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn min_spacing(&self) -> Duration {
        Duration::from_millis(self.min_spacing_ms)
    }
}

/// Mutating operations guarded by the throttle gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    BusinessCreate,
    BusinessUpdate,
    BusinessArchive,
    BusinessDelete,
    ZoneCreate,
    ZoneUpdate,
    ZoneDelete,
    PaymentMethodUpdate,
    ExpenseCreate,
    ExpenseUpdate,
    ExpenseStatus,
    ExpenseDelete,
}

impl Operation {
    /// Key segment and name reported in `RateLimited` errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BusinessCreate => "business:create",
            Self::BusinessUpdate => "business:update",
            Self::BusinessArchive => "business:archive",
            Self::BusinessDelete => "business:delete",
            Self::ZoneCreate => "shipping_zone:create",
            Self::ZoneUpdate => "shipping_zone:update",
            Self::ZoneDelete => "shipping_zone:delete",
            Self::PaymentMethodUpdate => "payment_method:update",
            Self::ExpenseCreate => "recurring_expense:create",
            Self::ExpenseUpdate => "recurring_expense:update",
            Self::ExpenseStatus => "recurring_expense:status",
            Self::ExpenseDelete => "recurring_expense:delete",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Allow the call when the shared cache cannot be reached.
    pub fail_open: bool,
    pub business_create: ThrottleRule,
    pub business_update: ThrottleRule,
    pub business_archive: ThrottleRule,
    pub business_delete: ThrottleRule,
    pub zone_create: ThrottleRule,
    pub zone_update: ThrottleRule,
    pub zone_delete: ThrottleRule,
    pub payment_method_update: ThrottleRule,
    pub expense_create: ThrottleRule,
    pub expense_update: ThrottleRule,
    pub expense_status: ThrottleRule,
    pub expense_delete: ThrottleRule,
}

impl ThrottleConfig {
    pub fn rule(&self, operation: Operation) -> &ThrottleRule {
        match operation {
            Operation::BusinessCreate => &self.business_create,
            Operation::BusinessUpdate => &self.business_update,
            Operation::BusinessArchive => &self.business_archive,
            Operation::BusinessDelete => &self.business_delete,
            Operation::ZoneCreate => &self.zone_create,
            Operation::ZoneUpdate => &self.zone_update,
            Operation::ZoneDelete => &self.zone_delete,
            Operation::PaymentMethodUpdate => &self.payment_method_update,
            Operation::ExpenseCreate => &self.expense_create,
            Operation::ExpenseUpdate => &self.expense_update,
            Operation::ExpenseStatus => &self.expense_status,
            Operation::ExpenseDelete => &self.expense_delete,
        }
    }

    /// Every rule disabled. Used where throttling is not under test.
    pub fn unlimited() -> Self {
        let off = ThrottleRule::per_minute(0, 0);
        Self {
            fail_open: true,
            business_create: off,
            business_update: off,
            business_archive: off,
            business_delete: off,
            zone_create: off,
            zone_update: off,
            zone_delete: off,
            payment_method_update: off,
            expense_create: off,
            expense_update: off,
            expense_status: off,
            expense_delete: off,
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            fail_open: true,
            business_create: ThrottleRule::per_minute(10, 1_000),
            business_update: ThrottleRule::per_minute(60, 500),
            business_archive: ThrottleRule::per_minute(30, 1_000),
            business_delete: ThrottleRule::per_minute(10, 1_000),
            zone_create: ThrottleRule::per_minute(60, 1_000),
            zone_update: ThrottleRule::per_minute(120, 1_000),
            zone_delete: ThrottleRule::per_minute(60, 1_000),
            payment_method_update: ThrottleRule::per_minute(120, 250),
            expense_create: ThrottleRule::per_minute(60, 250),
            expense_update: ThrottleRule::per_minute(120, 250),
            expense_status: ThrottleRule::per_minute(120, 250),
            expense_delete: ThrottleRule::per_minute(60, 250),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert!(config.throttle.fail_open);
        let zone_update = config.throttle.rule(Operation::ZoneUpdate);
        assert_eq!(zone_update.limit, 120);
        assert_eq!(zone_update.window(), Duration::from_secs(60));
        assert_eq!(zone_update.min_spacing(), Duration::from_secs(1));
        assert_eq!(
            config
                .throttle
                .rule(Operation::PaymentMethodUpdate)
                .min_spacing(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ServiceConfig = toml::from_str(
            r#"
            max_attempts = 5
            operation_timeout_ms = 2000

            [throttle]
            fail_open = false
            zone_create = { limit = 5, window_ms = 10000 }
            "#,
        )
        .unwrap();

        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.operation_timeout(), Some(Duration::from_secs(2)));
        assert!(!config.throttle.fail_open);
        assert_eq!(
            *config.throttle.rule(Operation::ZoneCreate),
            ThrottleRule {
                limit: 5,
                window_ms: 10_000,
                min_spacing_ms: 0,
            }
        );
        assert_eq!(config.throttle.rule(Operation::ZoneDelete).limit, 60);
    }
}
