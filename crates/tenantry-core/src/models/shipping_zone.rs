//! Shipping zone domain model.
//!
//! Zones belong to a business. Zone names are unique per business.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TenantryError, TenantryResult};
use crate::models::business::{normalize_country_code, normalize_currency};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShippingZone {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    pub countries: Vec<String>,
    pub currency: String,
    pub shipping_cost: Decimal,
    pub free_shipping_threshold: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated zone contents, not yet bound to a business.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShippingZoneDraft {
    pub name: String,
    pub countries: Vec<String>,
    pub currency: String,
    pub shipping_cost: Decimal,
    pub free_shipping_threshold: Decimal,
}

impl ShippingZoneDraft {
    /// Validate and normalize raw zone input.
    pub fn new(
        name: &str,
        countries: &[String],
        currency: &str,
        shipping_cost: Decimal,
        free_shipping_threshold: Decimal,
    ) -> TenantryResult<Self> {
        validate_amount("shipping_cost", shipping_cost)?;
        validate_amount("free_shipping_threshold", free_shipping_threshold)?;
        Ok(Self {
            name: normalize_zone_name(name)?,
            countries: normalize_countries(countries)?,
            currency: normalize_currency(currency)?,
            shipping_cost,
            free_shipping_threshold,
        })
    }

    /// The zone every new business starts with: its home country, free.
    pub fn home(country_code: &str, currency: &str) -> Self {
        Self {
            name: country_code.to_string(),
            countries: vec![country_code.to_string()],
            currency: currency.to_string(),
            shipping_cost: Decimal::ZERO,
            free_shipping_threshold: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateShippingZone {
    pub tenant_id: Uuid,
    pub business_id: Uuid,
    pub zone: ShippingZoneDraft,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateShippingZone {
    pub name: Option<String>,
    pub countries: Option<Vec<String>>,
    pub currency: Option<String>,
    pub shipping_cost: Option<Decimal>,
    pub free_shipping_threshold: Option<Decimal>,
}

impl UpdateShippingZone {
    /// Normalize every supplied field in place.
    pub fn normalized(self) -> TenantryResult<Self> {
        if let Some(cost) = self.shipping_cost {
            validate_amount("shipping_cost", cost)?;
        }
        if let Some(threshold) = self.free_shipping_threshold {
            validate_amount("free_shipping_threshold", threshold)?;
        }
        Ok(Self {
            name: self.name.as_deref().map(normalize_zone_name).transpose()?,
            countries: self
                .countries
                .as_deref()
                .map(normalize_countries)
                .transpose()?,
            currency: self.currency.as_deref().map(normalize_currency).transpose()?,
            shipping_cost: self.shipping_cost,
            free_shipping_threshold: self.free_shipping_threshold,
        })
    }
}

pub fn normalize_zone_name(raw: &str) -> TenantryResult<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > 80 {
        return Err(TenantryError::validation(
            "name",
            "zone name must be 1-80 characters",
        ));
    }
    Ok(name.to_string())
}

/// Upper-case, dedupe (first occurrence wins) and require at least one.
pub fn normalize_countries(raw: &[String]) -> TenantryResult<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for code in raw {
        let code = normalize_country_code(code).map_err(|_| {
            TenantryError::validation("countries", format!("invalid country code: {code}"))
        })?;
        if !out.contains(&code) {
            out.push(code);
        }
    }
    if out.is_empty() {
        return Err(TenantryError::validation(
            "countries",
            "at least one country is required",
        ));
    }
    Ok(out)
}

fn validate_amount(field: &'static str, value: Decimal) -> TenantryResult<()> {
    if value < Decimal::ZERO {
        return Err(TenantryError::validation(field, "must not be negative"));
    }
    Ok(())
}
