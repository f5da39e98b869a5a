//! Business domain model.
//!
//! A business is the tenant-owned storefront entity. Its descriptor is the
//! URL-safe public identifier and is unique within a tenant.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::descriptor::Descriptor;
use crate::error::{TenantryError, TenantryResult};
use crate::models::shipping_zone::ShippingZoneDraft;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Business {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub descriptor: Descriptor,
    pub name: String,
    pub brand: Option<String>,
    /// ISO 3166-1 alpha-2, upper case.
    pub country_code: String,
    /// ISO 4217, upper case.
    pub currency: String,
    pub vat_rate: Decimal,
    pub safety_buffer: Decimal,
    pub storefront_enabled: bool,
    pub support_email: Option<String>,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Business {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

/// Validated fields for a new business row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBusiness {
    pub tenant_id: Uuid,
    pub descriptor: Descriptor,
    pub name: String,
    pub brand: Option<String>,
    pub country_code: String,
    pub currency: String,
    pub vat_rate: Decimal,
    pub safety_buffer: Decimal,
    pub storefront_enabled: bool,
    pub support_email: Option<String>,
}

/// A business together with the shipping zones that must be created in
/// the same transaction.
#[derive(Debug, Clone)]
pub struct ProvisionBusiness {
    pub business: CreateBusiness,
    pub zones: Vec<ShippingZoneDraft>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateBusiness {
    pub descriptor: Option<Descriptor>,
    pub name: Option<String>,
    /// `Some(None)` clears the brand.
    pub brand: Option<Option<String>>,
    pub country_code: Option<String>,
    pub currency: Option<String>,
    pub vat_rate: Option<Decimal>,
    pub safety_buffer: Option<Decimal>,
    pub storefront_enabled: Option<bool>,
    pub support_email: Option<Option<String>>,
}

impl UpdateBusiness {
    pub fn is_empty(&self) -> bool {
        self.descriptor.is_none()
            && self.name.is_none()
            && self.brand.is_none()
            && self.country_code.is_none()
            && self.currency.is_none()
            && self.vat_rate.is_none()
            && self.safety_buffer.is_none()
            && self.storefront_enabled.is_none()
            && self.support_email.is_none()
    }
}

/// Trim and upper-case a two-letter country code.
pub fn normalize_country_code(raw: &str) -> TenantryResult<String> {
    normalize_code(raw, 2, "country_code", "country code must be 2 letters")
}

/// Trim and upper-case a three-letter currency code.
pub fn normalize_currency(raw: &str) -> TenantryResult<String> {
    normalize_code(raw, 3, "currency", "currency must be 3 letters")
}

fn normalize_code(
    raw: &str,
    len: usize,
    field: &'static str,
    message: &'static str,
) -> TenantryResult<String> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() != len || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(TenantryError::validation(field, message));
    }
    Ok(code)
}

/// Business display name: trimmed, non-empty, at most 120 characters.
pub fn normalize_name(raw: &str) -> TenantryResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(TenantryError::validation("name", "name is required"));
    }
    if name.chars().count() > 120 {
        return Err(TenantryError::validation(
            "name",
            "name must be at most 120 characters",
        ));
    }
    Ok(name.to_string())
}

/// Rates are fractions in `0..=1`.
pub fn validate_rate(field: &'static str, value: Decimal) -> TenantryResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(TenantryError::validation(field, "must be between 0 and 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn codes_are_trimmed_and_upper_cased() {
        assert_eq!(normalize_country_code(" sa ").unwrap(), "SA");
        assert_eq!(normalize_currency("sar").unwrap(), "SAR");
    }

    #[test]
    fn codes_with_wrong_shape_are_rejected() {
        let err = normalize_country_code("SAU").unwrap_err();
        assert_eq!(
            err,
            TenantryError::validation("country_code", "country code must be 2 letters")
        );
        assert!(normalize_currency("S4R").is_err());
        assert!(normalize_currency("").is_err());
    }

    #[test]
    fn name_bounds() {
        assert_eq!(normalize_name("  Acme  ").unwrap(), "Acme");
        assert!(normalize_name("   ").is_err());
        assert!(normalize_name(&"x".repeat(121)).is_err());
    }

    #[test]
    fn rates_must_be_fractions() {
        assert!(validate_rate("vat_rate", dec!(0.15)).is_ok());
        assert!(validate_rate("vat_rate", dec!(1)).is_ok());
        assert!(validate_rate("vat_rate", dec!(-0.01)).is_err());
        assert!(validate_rate("vat_rate", dec!(1.5)).is_err());
    }

    #[test]
    fn empty_update_is_detected() {
        assert!(UpdateBusiness::default().is_empty());
        let update = UpdateBusiness {
            brand: Some(None),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
