//! SurrealDB implementation of [`BusinessRepository`].
//!
//! Provisioning and deletion run as a single `BEGIN`/`COMMIT` request so
//! the business and its dependent rows are written or removed together.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tenantry_core::descriptor::Descriptor;
use tenantry_core::error::TenantryResult;
use tenantry_core::models::business::{Business, ProvisionBusiness, UpdateBusiness};
use tenantry_core::models::shipping_zone::ShippingZone;
use tenantry_core::repository::{BusinessRepository, PaginatedResult, Pagination};
use tracing::debug;
use uuid::Uuid;

use super::{CountRow, parse_decimal, parse_uuid};
use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct BusinessRow {
    tenant_id: String,
    descriptor: String,
    name: String,
    brand: Option<String>,
    country_code: String,
    currency: String,
    vat_rate: String,
    safety_buffer: String,
    storefront_enabled: bool,
    support_email: Option<String>,
    archived_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct BusinessRowWithId {
    record_id: String,
    tenant_id: String,
    descriptor: String,
    name: String,
    brand: Option<String>,
    country_code: String,
    currency: String,
    vat_rate: String,
    safety_buffer: String,
    storefront_enabled: bool,
    support_email: Option<String>,
    archived_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BusinessRow {
    fn into_business(self, id: Uuid) -> Result<Business, DbError> {
        let descriptor = Descriptor::parse(&self.descriptor)
            .map_err(|e| DbError::Decode(format!("stored descriptor: {e}")))?;
        Ok(Business {
            id,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            descriptor,
            name: self.name,
            brand: self.brand,
            country_code: self.country_code,
            currency: self.currency,
            vat_rate: parse_decimal("vat_rate", &self.vat_rate)?,
            safety_buffer: parse_decimal("safety_buffer", &self.safety_buffer)?,
            storefront_enabled: self.storefront_enabled,
            support_email: self.support_email,
            archived_at: self.archived_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl BusinessRowWithId {
    fn try_into_business(self) -> Result<Business, DbError> {
        let id = parse_uuid("business", &self.record_id)?;
        BusinessRow {
            tenant_id: self.tenant_id,
            descriptor: self.descriptor,
            name: self.name,
            brand: self.brand,
            country_code: self.country_code,
            currency: self.currency,
            vat_rate: self.vat_rate,
            safety_buffer: self.safety_buffer,
            storefront_enabled: self.storefront_enabled,
            support_email: self.support_email,
            archived_at: self.archived_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_business(id)
    }
}

fn archived_filter(include_archived: bool) -> &'static str {
    if include_archived {
        ""
    } else {
        " AND archived_at = NONE"
    }
}

/// SurrealDB implementation of the Business repository.
#[derive(Clone)]
pub struct SurrealBusinessRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealBusinessRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> BusinessRepository for SurrealBusinessRepository<C> {
    async fn provision(
        &self,
        input: ProvisionBusiness,
    ) -> TenantryResult<(Business, Vec<ShippingZone>)> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let biz = input.business;
        let tenant_id = biz.tenant_id;

        let business = Business {
            id,
            tenant_id,
            descriptor: biz.descriptor,
            name: biz.name,
            brand: biz.brand,
            country_code: biz.country_code,
            currency: biz.currency,
            vat_rate: biz.vat_rate,
            safety_buffer: biz.safety_buffer,
            storefront_enabled: biz.storefront_enabled,
            support_email: biz.support_email,
            archived_at: None,
            created_at: now,
            updated_at: now,
        };
        let zones: Vec<ShippingZone> = input
            .zones
            .into_iter()
            .map(|draft| ShippingZone {
                id: Uuid::new_v4(),
                tenant_id,
                business_id: id,
                name: draft.name,
                countries: draft.countries,
                currency: draft.currency,
                shipping_cost: draft.shipping_cost,
                free_shipping_threshold: draft.free_shipping_threshold,
                created_at: now,
                updated_at: now,
            })
            .collect();
        let zone_values: Vec<serde_json::Value> = zones
            .iter()
            .map(|zone| {
                serde_json::json!({
                    "id": zone.id.to_string(),
                    "name": zone.name,
                    "countries": zone.countries,
                    "currency": zone.currency,
                    "shipping_cost": zone.shipping_cost.to_string(),
                    "free_shipping_threshold": zone.free_shipping_threshold.to_string(),
                })
            })
            .collect();

        // Returned rows are the bound values, not a read after COMMIT.
        let mut response = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 CREATE type::record('business', $id) SET \
                 tenant_id = $tenant_id, descriptor = $descriptor, \
                 name = $name, brand = $brand, \
                 country_code = $country_code, currency = $currency, \
                 vat_rate = $vat_rate, safety_buffer = $safety_buffer, \
                 storefront_enabled = $storefront_enabled, \
                 support_email = $support_email, \
                 created_at = $now, updated_at = $now; \
                 FOR $zone IN $zones { \
                     CREATE type::record('shipping_zone', $zone.id) SET \
                     tenant_id = $tenant_id, business_id = $id, \
                     name = $zone.name, countries = $zone.countries, \
                     currency = $zone.currency, \
                     shipping_cost = $zone.shipping_cost, \
                     free_shipping_threshold = $zone.free_shipping_threshold, \
                     created_at = $now, updated_at = $now; \
                 }; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("descriptor", business.descriptor.as_str().to_string()))
            .bind(("name", business.name.clone()))
            .bind(("brand", business.brand.clone()))
            .bind(("country_code", business.country_code.clone()))
            .bind(("currency", business.currency.clone()))
            .bind(("vat_rate", business.vat_rate.to_string()))
            .bind(("safety_buffer", business.safety_buffer.to_string()))
            .bind(("storefront_enabled", business.storefront_enabled))
            .bind(("support_email", business.support_email.clone()))
            .bind(("now", now))
            .bind(("zones", serde_json::Value::Array(zone_values)))
            .await
            .map_err(DbError::from)?;

        let errors = response.take_errors();
        if !errors.is_empty() {
            let err = DbError::from_transaction(
                "business",
                errors.into_iter().map(|(idx, e)| (idx, e.to_string())),
            );
            debug!(error = %err, "Provisioning transaction rolled back");
            return Err(err.into());
        }

        debug!(business_id = %id, zones = zones.len(), "Business provisioned");
        Ok((business, zones))
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> TenantryResult<Business> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('business', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<BusinessRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "business".into(),
            id: id_str,
        })?;

        Ok(row.into_business(id)?)
    }

    async fn get_by_descriptor(
        &self,
        tenant_id: Uuid,
        descriptor: &str,
    ) -> TenantryResult<Business> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM business \
                 WHERE tenant_id = $tenant_id AND descriptor = $descriptor",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("descriptor", descriptor.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<BusinessRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "business".into(),
            id: format!("descriptor={descriptor}"),
        })?;

        Ok(row.try_into_business()?)
    }

    async fn descriptor_exists(&self, tenant_id: Uuid, descriptor: &str) -> TenantryResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM business \
                 WHERE tenant_id = $tenant_id AND descriptor = $descriptor \
                 GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("descriptor", descriptor.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().is_some_and(|r| r.total > 0))
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        include_archived: bool,
        pagination: Pagination,
    ) -> TenantryResult<PaginatedResult<Business>> {
        let total = self.count(tenant_id, include_archived).await?;

        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM business \
             WHERE tenant_id = $tenant_id{} \
             ORDER BY created_at ASC \
             LIMIT $limit START $offset",
            archived_filter(include_archived)
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<BusinessRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_business())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn count(&self, tenant_id: Uuid, include_archived: bool) -> TenantryResult<u64> {
        let query = format!(
            "SELECT count() AS total FROM business \
             WHERE tenant_id = $tenant_id{} GROUP ALL",
            archived_filter(include_archived)
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateBusiness,
    ) -> TenantryResult<Business> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.descriptor.is_some() {
            sets.push("descriptor = $descriptor");
        }
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.brand.is_some() {
            sets.push("brand = $brand");
        }
        if input.country_code.is_some() {
            sets.push("country_code = $country_code");
        }
        if input.currency.is_some() {
            sets.push("currency = $currency");
        }
        if input.vat_rate.is_some() {
            sets.push("vat_rate = $vat_rate");
        }
        if input.safety_buffer.is_some() {
            sets.push("safety_buffer = $safety_buffer");
        }
        if input.storefront_enabled.is_some() {
            sets.push("storefront_enabled = $storefront_enabled");
        }
        if input.support_email.is_some() {
            sets.push("support_email = $support_email");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('business', $id) SET {} \
             WHERE tenant_id = $tenant_id",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()));

        if let Some(descriptor) = input.descriptor {
            builder = builder.bind(("descriptor", descriptor.into_inner()));
        }
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(brand) = input.brand {
            builder = builder.bind(("brand", brand));
        }
        if let Some(country_code) = input.country_code {
            builder = builder.bind(("country_code", country_code));
        }
        if let Some(currency) = input.currency {
            builder = builder.bind(("currency", currency));
        }
        if let Some(vat_rate) = input.vat_rate {
            builder = builder.bind(("vat_rate", vat_rate.to_string()));
        }
        if let Some(safety_buffer) = input.safety_buffer {
            builder = builder.bind(("safety_buffer", safety_buffer.to_string()));
        }
        if let Some(storefront_enabled) = input.storefront_enabled {
            builder = builder.bind(("storefront_enabled", storefront_enabled));
        }
        if let Some(support_email) = input.support_email {
            builder = builder.bind(("support_email", support_email));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("business", e.to_string()))?;

        let rows: Vec<BusinessRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "business".into(),
            id: id_str,
        })?;

        Ok(row.into_business(id)?)
    }

    async fn set_archived(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        archived_at: Option<DateTime<Utc>>,
    ) -> TenantryResult<Business> {
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('business', $id) SET \
                 archived_at = $archived_at, updated_at = time::now() \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("archived_at", archived_at))
            .await
            .map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("business", e.to_string()))?;

        let rows: Vec<BusinessRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "business".into(),
            id: id_str,
        })?;

        Ok(row.into_business(id)?)
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> TenantryResult<()> {
        // Ownership check; the transaction below would silently delete nothing.
        self.get_by_id(tenant_id, id).await?;

        let mut response = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE shipping_zone \
                 WHERE tenant_id = $tenant_id AND business_id = $id; \
                 DELETE payment_method_override \
                 WHERE tenant_id = $tenant_id AND business_id = $id; \
                 DELETE recurring_expense \
                 WHERE tenant_id = $tenant_id AND business_id = $id; \
                 DELETE type::record('business', $id) \
                 WHERE tenant_id = $tenant_id; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let errors = response.take_errors();
        if !errors.is_empty() {
            return Err(DbError::from_transaction(
                "business",
                errors.into_iter().map(|(idx, e)| (idx, e.to_string())),
            )
            .into());
        }

        debug!(business_id = %id, "Business and dependents deleted");
        Ok(())
    }
}
