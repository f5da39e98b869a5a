//! SurrealDB implementation of [`ShippingZoneRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tenantry_core::error::TenantryResult;
use tenantry_core::models::shipping_zone::{CreateShippingZone, ShippingZone, UpdateShippingZone};
use tenantry_core::repository::ShippingZoneRepository;
use uuid::Uuid;

use super::{parse_decimal, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ShippingZoneRow {
    tenant_id: String,
    business_id: String,
    name: String,
    countries: Vec<String>,
    currency: String,
    shipping_cost: String,
    free_shipping_threshold: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct ShippingZoneRowWithId {
    record_id: String,
    tenant_id: String,
    business_id: String,
    name: String,
    countries: Vec<String>,
    currency: String,
    shipping_cost: String,
    free_shipping_threshold: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ShippingZoneRow {
    fn into_zone(self, id: Uuid) -> Result<ShippingZone, DbError> {
        Ok(ShippingZone {
            id,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            business_id: parse_uuid("business", &self.business_id)?,
            name: self.name,
            countries: self.countries,
            currency: self.currency,
            shipping_cost: parse_decimal("shipping_cost", &self.shipping_cost)?,
            free_shipping_threshold: parse_decimal(
                "free_shipping_threshold",
                &self.free_shipping_threshold,
            )?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl ShippingZoneRowWithId {
    fn try_into_zone(self) -> Result<ShippingZone, DbError> {
        let id = parse_uuid("shipping_zone", &self.record_id)?;
        ShippingZoneRow {
            tenant_id: self.tenant_id,
            business_id: self.business_id,
            name: self.name,
            countries: self.countries,
            currency: self.currency,
            shipping_cost: self.shipping_cost,
            free_shipping_threshold: self.free_shipping_threshold,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_zone(id)
    }
}

fn single(rows: Vec<ShippingZoneRow>, id: Uuid) -> Result<ShippingZone, DbError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| DbError::NotFound {
            entity: "shipping_zone".into(),
            id: id.to_string(),
        })?
        .into_zone(id)
}

/// Zones of one business, oldest first. Shared with business provisioning.
async fn list_zones<C: Connection>(
    db: &Surreal<C>,
    tenant_id: Uuid,
    business_id: Uuid,
) -> Result<Vec<ShippingZone>, DbError> {
    let mut result = db
        .query(
            "SELECT meta::id(id) AS record_id, * FROM shipping_zone \
             WHERE tenant_id = $tenant_id AND business_id = $business_id \
             ORDER BY created_at ASC, name ASC",
        )
        .bind(("tenant_id", tenant_id.to_string()))
        .bind(("business_id", business_id.to_string()))
        .await?;

    let rows: Vec<ShippingZoneRowWithId> = result.take(0)?;
    rows.into_iter().map(|row| row.try_into_zone()).collect()
}

/// SurrealDB implementation of the ShippingZone repository.
#[derive(Clone)]
pub struct SurrealShippingZoneRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealShippingZoneRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ShippingZoneRepository for SurrealShippingZoneRepository<C> {
    async fn create(&self, input: CreateShippingZone) -> TenantryResult<ShippingZone> {
        let id = Uuid::new_v4();
        let zone = input.zone;

        let result = self
            .db
            .query(
                "CREATE type::record('shipping_zone', $id) SET \
                 tenant_id = $tenant_id, business_id = $business_id, \
                 name = $name, countries = $countries, \
                 currency = $currency, shipping_cost = $shipping_cost, \
                 free_shipping_threshold = $free_shipping_threshold",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("business_id", input.business_id.to_string()))
            .bind(("name", zone.name))
            .bind(("countries", zone.countries))
            .bind(("currency", zone.currency))
            .bind(("shipping_cost", zone.shipping_cost.to_string()))
            .bind((
                "free_shipping_threshold",
                zone.free_shipping_threshold.to_string(),
            ))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("shipping_zone", e.to_string()))?;
        let rows: Vec<ShippingZoneRow> = result.take(0).map_err(DbError::from)?;
        Ok(single(rows, id)?)
    }

    async fn get(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
        id: Uuid,
    ) -> TenantryResult<ShippingZone> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('shipping_zone', $id) \
                 WHERE tenant_id = $tenant_id AND business_id = $business_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("business_id", business_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ShippingZoneRow> = result.take(0).map_err(DbError::from)?;
        Ok(single(rows, id)?)
    }

    async fn list(&self, tenant_id: Uuid, business_id: Uuid) -> TenantryResult<Vec<ShippingZone>> {
        Ok(list_zones(&self.db, tenant_id, business_id).await?)
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
        id: Uuid,
        input: UpdateShippingZone,
    ) -> TenantryResult<ShippingZone> {
        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.countries.is_some() {
            sets.push("countries = $countries");
        }
        if input.currency.is_some() {
            sets.push("currency = $currency");
        }
        if input.shipping_cost.is_some() {
            sets.push("shipping_cost = $shipping_cost");
        }
        if input.free_shipping_threshold.is_some() {
            sets.push("free_shipping_threshold = $free_shipping_threshold");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('shipping_zone', $id) SET {} \
             WHERE tenant_id = $tenant_id AND business_id = $business_id",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("business_id", business_id.to_string()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(countries) = input.countries {
            builder = builder.bind(("countries", countries));
        }
        if let Some(currency) = input.currency {
            builder = builder.bind(("currency", currency));
        }
        if let Some(cost) = input.shipping_cost {
            builder = builder.bind(("shipping_cost", cost.to_string()));
        }
        if let Some(threshold) = input.free_shipping_threshold {
            builder = builder.bind(("free_shipping_threshold", threshold.to_string()));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("shipping_zone", e.to_string()))?;
        let rows: Vec<ShippingZoneRow> = result.take(0).map_err(DbError::from)?;
        Ok(single(rows, id)?)
    }

    async fn delete(&self, tenant_id: Uuid, business_id: Uuid, id: Uuid) -> TenantryResult<()> {
        let result = self
            .db
            .query(
                "DELETE type::record('shipping_zone', $id) \
                 WHERE tenant_id = $tenant_id AND business_id = $business_id \
                 RETURN BEFORE",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("business_id", business_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("shipping_zone", e.to_string()))?;
        let rows: Vec<ShippingZoneRow> = result.take(0).map_err(DbError::from)?;
        single(rows, id)?;
        Ok(())
    }
}
