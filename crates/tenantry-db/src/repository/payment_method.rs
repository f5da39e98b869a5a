//! SurrealDB implementation of [`PaymentMethodRepository`].
//!
//! Rows exist only for methods a business customized; the unique index on
//! `(business_id, method)` rejects a second insert for the same pair.
//! Updates are conditional on the row's `version`.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tenantry_core::error::{TenantryError, TenantryResult};
use tenantry_core::models::payment_method::{
    CreatePaymentMethodOverride, PaymentMethodOverride, PaymentMethodSettings,
};
use tenantry_core::repository::PaymentMethodRepository;
use tracing::debug;
use uuid::Uuid;

use super::{parse_decimal, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct OverrideRow {
    tenant_id: String,
    business_id: String,
    method: String,
    enabled: bool,
    fee_percent: String,
    fee_fixed: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct OverrideRowWithId {
    record_id: String,
    tenant_id: String,
    business_id: String,
    method: String,
    enabled: bool,
    fee_percent: String,
    fee_fixed: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OverrideRow {
    fn into_override(self, id: Uuid) -> Result<PaymentMethodOverride, DbError> {
        Ok(PaymentMethodOverride {
            id,
            tenant_id: parse_uuid("tenant", &self.tenant_id)?,
            business_id: parse_uuid("business", &self.business_id)?,
            method: self.method,
            settings: PaymentMethodSettings {
                enabled: self.enabled,
                fee_percent: parse_decimal("fee_percent", &self.fee_percent)?,
                fee_fixed: parse_decimal("fee_fixed", &self.fee_fixed)?,
            },
            version: u64::try_from(self.version).map_err(|_| {
                DbError::Decode(format!("negative override version {}", self.version))
            })?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl OverrideRowWithId {
    fn try_into_override(self) -> Result<PaymentMethodOverride, DbError> {
        let id = parse_uuid("payment_method_override", &self.record_id)?;
        OverrideRow {
            tenant_id: self.tenant_id,
            business_id: self.business_id,
            method: self.method,
            enabled: self.enabled,
            fee_percent: self.fee_percent,
            fee_fixed: self.fee_fixed,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_override(id)
    }
}

/// SurrealDB implementation of the PaymentMethod override repository.
#[derive(Clone)]
pub struct SurrealPaymentMethodRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPaymentMethodRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> PaymentMethodRepository for SurrealPaymentMethodRepository<C> {
    async fn list(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
    ) -> TenantryResult<Vec<PaymentMethodOverride>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM payment_method_override \
                 WHERE tenant_id = $tenant_id AND business_id = $business_id",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("business_id", business_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OverrideRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_override())
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(items)
    }

    async fn get(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
        method: &str,
    ) -> TenantryResult<Option<PaymentMethodOverride>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM payment_method_override \
                 WHERE tenant_id = $tenant_id AND business_id = $business_id \
                 AND method = $method",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("business_id", business_id.to_string()))
            .bind(("method", method.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OverrideRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| row.try_into_override())
            .transpose()?)
    }

    async fn insert(
        &self,
        input: CreatePaymentMethodOverride,
    ) -> TenantryResult<PaymentMethodOverride> {
        let id = Uuid::new_v4();

        let result = self
            .db
            .query(
                "CREATE type::record('payment_method_override', $id) SET \
                 tenant_id = $tenant_id, business_id = $business_id, \
                 method = $method, enabled = $enabled, \
                 fee_percent = $fee_percent, fee_fixed = $fee_fixed; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('payment_method_override', $id);",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("business_id", input.business_id.to_string()))
            .bind(("method", input.method))
            .bind(("enabled", input.settings.enabled))
            .bind(("fee_percent", input.settings.fee_percent.to_string()))
            .bind(("fee_fixed", input.settings.fee_fixed.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("payment_method_override", e.to_string()))?;
        let rows: Vec<OverrideRowWithId> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "payment_method_override".into(),
            id: id.to_string(),
        })?;
        Ok(row.try_into_override()?)
    }

    async fn update(
        &self,
        current: &PaymentMethodOverride,
        settings: PaymentMethodSettings,
    ) -> TenantryResult<PaymentMethodOverride> {
        let result = self
            .db
            .query(
                "UPDATE type::record('payment_method_override', $id) SET \
                 enabled = $enabled, fee_percent = $fee_percent, \
                 fee_fixed = $fee_fixed, version = version + 1, \
                 updated_at = time::now() \
                 WHERE tenant_id = $tenant_id AND business_id = $business_id \
                 AND version = $version",
            )
            .bind(("id", current.id.to_string()))
            .bind(("tenant_id", current.tenant_id.to_string()))
            .bind(("business_id", current.business_id.to_string()))
            .bind(("version", current.version as i64))
            .bind(("enabled", settings.enabled))
            .bind(("fee_percent", settings.fee_percent.to_string()))
            .bind(("fee_fixed", settings.fee_fixed.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("payment_method_override", e.to_string()))?;
        let rows: Vec<OverrideRow> = result.take(0).map_err(DbError::from)?;
        if let Some(row) = rows.into_iter().next() {
            return Ok(row.into_override(current.id)?);
        }

        // Nothing matched: either the row is gone or another writer got there first.
        let stored = self
            .get(current.tenant_id, current.business_id, &current.method)
            .await?
            .ok_or_else(|| DbError::NotFound {
                entity: "payment_method_override".into(),
                id: current.id.to_string(),
            })?;
        debug!(
            business_id = %current.business_id,
            method = %current.method,
            expected = current.version,
            actual = stored.version,
            "Override version check lost"
        );
        Err(TenantryError::TransactionConflict(format!(
            "payment method override {} is at version {}, expected {}",
            current.method, stored.version, current.version
        )))
    }
}
