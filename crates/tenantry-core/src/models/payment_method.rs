//! Payment methods: a code-defined catalog plus per-business overrides.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{Catalog, CatalogEntry, Overridable};
use crate::error::{TenantryError, TenantryResult};

/// A catalog entry. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentMethodDefinition {
    /// Stable identifier used in URLs and override rows.
    pub id: String,
    pub name: String,
    pub logo_url: String,
    pub default_fee_percent: Decimal,
    pub default_fee_fixed: Decimal,
    pub default_enabled: bool,
}

impl PaymentMethodDefinition {
    fn builtin(id: &str, name: &str, default_enabled: bool) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            logo_url: String::new(),
            default_fee_percent: Decimal::ZERO,
            default_fee_fixed: Decimal::ZERO,
            default_enabled,
        }
    }
}

/// The built-in payment method catalog.
pub fn standard_catalog() -> Catalog<PaymentMethodDefinition> {
    let entries = vec![
        PaymentMethodDefinition::builtin("cash_on_delivery", "Cash on delivery", true),
        PaymentMethodDefinition::builtin("bank_transfer", "Bank transfer", true),
        PaymentMethodDefinition::builtin("credit_card", "Credit card", false),
        PaymentMethodDefinition::builtin("tamara", "Tamara", false),
        PaymentMethodDefinition::builtin("tabby", "Tabby", false),
        PaymentMethodDefinition::builtin("paypal", "PayPal", false),
    ];
    Catalog::new(entries).expect("built-in payment method ids are unique")
}

/// Method ids are matched trimmed and lower-cased.
pub fn normalize_method_id(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Values a business may override for one method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentMethodSettings {
    pub enabled: bool,
    /// Fraction of the order total, `0..=1`.
    pub fee_percent: Decimal,
    pub fee_fixed: Decimal,
}

/// Persisted override row, unique per `(business_id, method)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentMethodOverride {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub business_id: Uuid,
    pub method: String,
    pub settings: PaymentMethodSettings,
    /// Bumped on every write. Updates only apply to the version they read.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreatePaymentMethodOverride {
    pub tenant_id: Uuid,
    pub business_id: Uuid,
    pub method: String,
    pub settings: PaymentMethodSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PaymentMethodPatch {
    pub enabled: Option<bool>,
    pub fee_percent: Option<Decimal>,
    pub fee_fixed: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SettingSource {
    Catalog,
    Override,
}

/// Catalog entry merged with the business's override, if any.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EffectivePaymentMethod {
    pub id: String,
    pub name: String,
    pub logo_url: String,
    pub enabled: bool,
    pub fee_percent: Decimal,
    pub fee_fixed: Decimal,
    pub default_fee_percent: Decimal,
    pub default_fee_fixed: Decimal,
    pub source: SettingSource,
}

impl CatalogEntry for PaymentMethodDefinition {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Overridable for PaymentMethodDefinition {
    type Settings = PaymentMethodSettings;
    type Patch = PaymentMethodPatch;
    type View = EffectivePaymentMethod;

    fn defaults(&self) -> PaymentMethodSettings {
        PaymentMethodSettings {
            enabled: self.default_enabled,
            fee_percent: self.default_fee_percent,
            fee_fixed: self.default_fee_fixed,
        }
    }

    fn validate_patch(patch: &PaymentMethodPatch) -> TenantryResult<()> {
        if let Some(pct) = patch.fee_percent {
            if pct < Decimal::ZERO {
                return Err(TenantryError::validation(
                    "fee_percent",
                    "fee_percent cannot be negative",
                ));
            }
            if pct > Decimal::ONE {
                return Err(TenantryError::validation(
                    "fee_percent",
                    "fee_percent must be between 0 and 1",
                ));
            }
        }
        if patch.fee_fixed.is_some_and(|fixed| fixed < Decimal::ZERO) {
            return Err(TenantryError::validation(
                "fee_fixed",
                "fee_fixed cannot be negative",
            ));
        }
        Ok(())
    }

    fn apply_patch(settings: &mut PaymentMethodSettings, patch: &PaymentMethodPatch) {
        if let Some(enabled) = patch.enabled {
            settings.enabled = enabled;
        }
        if let Some(pct) = patch.fee_percent {
            settings.fee_percent = pct;
        }
        if let Some(fixed) = patch.fee_fixed {
            settings.fee_fixed = fixed;
        }
    }

    fn view(&self, settings: Option<&PaymentMethodSettings>) -> EffectivePaymentMethod {
        let (values, source) = match settings {
            Some(s) => (s.clone(), SettingSource::Override),
            None => (self.defaults(), SettingSource::Catalog),
        };
        EffectivePaymentMethod {
            id: self.id.clone(),
            name: self.name.clone(),
            logo_url: self.logo_url.clone(),
            enabled: values.enabled,
            fee_percent: values.fee_percent,
            fee_fixed: values.fee_fixed,
            default_fee_percent: self.default_fee_percent,
            default_fee_fixed: self.default_fee_fixed,
            source,
        }
    }
}
