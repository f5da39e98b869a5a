//! Repository and cache ports.
//!
//! All operations are async. Every tenant-owned row is addressed with its
//! `tenant_id` so one tenant can never read or write another's data; a
//! row owned by another tenant is reported as `NotFound`.
//!
//! Unique constraints are part of the contract: implementations must
//! reject duplicates with [`TenantryError::AlreadyExists`] and surface
//! transient serialization failures as
//! [`TenantryError::TransactionConflict`].
//!
//! [`TenantryError::AlreadyExists`]: crate::error::TenantryError::AlreadyExists
//! [`TenantryError::TransactionConflict`]: crate::error::TenantryError::TransactionConflict

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::TenantryResult;
use crate::lifecycle::Transition;
use crate::models::{
    business::{Business, ProvisionBusiness, UpdateBusiness},
    payment_method::{CreatePaymentMethodOverride, PaymentMethodOverride, PaymentMethodSettings},
    recurring_expense::{
        CreateRecurringExpense, RecurringExpense, RecurringExpenseStatus, UpdateRecurringExpense,
    },
    shipping_zone::{CreateShippingZone, ShippingZone, UpdateShippingZone},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Business (tenant scope)
// ---------------------------------------------------------------------------

pub trait BusinessRepository: Send + Sync {
    /// Create a business and its zones in one serializable transaction.
    /// Either every row is written or none is.
    fn provision(
        &self,
        input: ProvisionBusiness,
    ) -> impl Future<Output = TenantryResult<(Business, Vec<ShippingZone>)>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = TenantryResult<Business>> + Send;
    fn get_by_descriptor(
        &self,
        tenant_id: Uuid,
        descriptor: &str,
    ) -> impl Future<Output = TenantryResult<Business>> + Send;
    /// Whether any business of the tenant, archived or not, holds `descriptor`.
    fn descriptor_exists(
        &self,
        tenant_id: Uuid,
        descriptor: &str,
    ) -> impl Future<Output = TenantryResult<bool>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        include_archived: bool,
        pagination: Pagination,
    ) -> impl Future<Output = TenantryResult<PaginatedResult<Business>>> + Send;
    fn count(
        &self,
        tenant_id: Uuid,
        include_archived: bool,
    ) -> impl Future<Output = TenantryResult<u64>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateBusiness,
    ) -> impl Future<Output = TenantryResult<Business>> + Send;
    /// `Some(at)` archives, `None` restores.
    fn set_archived(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        archived_at: Option<DateTime<Utc>>,
    ) -> impl Future<Output = TenantryResult<Business>> + Send;
    /// Remove the business and every row it owns, atomically.
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = TenantryResult<()>> + Send;
}

pub trait ShippingZoneRepository: Send + Sync {
    fn create(
        &self,
        input: CreateShippingZone,
    ) -> impl Future<Output = TenantryResult<ShippingZone>> + Send;
    fn get(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = TenantryResult<ShippingZone>> + Send;
    /// Zones of a business, oldest first.
    fn list(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
    ) -> impl Future<Output = TenantryResult<Vec<ShippingZone>>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
        id: Uuid,
        input: UpdateShippingZone,
    ) -> impl Future<Output = TenantryResult<ShippingZone>> + Send;
    fn delete(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = TenantryResult<()>> + Send;
}

pub trait PaymentMethodRepository: Send + Sync {
    fn list(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
    ) -> impl Future<Output = TenantryResult<Vec<PaymentMethodOverride>>> + Send;
    /// `None` when the business has not customized `method`.
    fn get(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
        method: &str,
    ) -> impl Future<Output = TenantryResult<Option<PaymentMethodOverride>>> + Send;
    fn insert(
        &self,
        input: CreatePaymentMethodOverride,
    ) -> impl Future<Output = TenantryResult<PaymentMethodOverride>> + Send;
    /// Replace the settings of `current`, provided the stored row is still at
    /// `current.version`. A row that moved on yields
    /// [`TenantryError::TransactionConflict`] so the caller re-reads and retries.
    ///
    /// [`TenantryError::TransactionConflict`]: crate::error::TenantryError::TransactionConflict
    fn update(
        &self,
        current: &PaymentMethodOverride,
        settings: PaymentMethodSettings,
    ) -> impl Future<Output = TenantryResult<PaymentMethodOverride>> + Send;
}

pub trait RecurringExpenseRepository: Send + Sync {
    fn create(
        &self,
        input: CreateRecurringExpense,
    ) -> impl Future<Output = TenantryResult<RecurringExpense>> + Send;
    fn get(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = TenantryResult<RecurringExpense>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
        status: Option<RecurringExpenseStatus>,
        pagination: Pagination,
    ) -> impl Future<Output = TenantryResult<PaginatedResult<RecurringExpense>>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
        id: Uuid,
        input: UpdateRecurringExpense,
    ) -> impl Future<Output = TenantryResult<RecurringExpense>> + Send;
    /// Compare-and-set: applies only while the stored status still equals
    /// `transition.from()`. Returns `Conflict` if it moved in between.
    fn update_status(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
        id: Uuid,
        transition: Transition<RecurringExpenseStatus>,
    ) -> impl Future<Output = TenantryResult<RecurringExpense>> + Send;
    /// Compare-and-set on `next_date`: moves it from `from` to `to` only
    /// while the expense is active and still due on `from`.
    fn advance_next_date(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
        id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Future<Output = TenantryResult<RecurringExpense>> + Send;
    fn delete(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = TenantryResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Shared cache
// ---------------------------------------------------------------------------

/// Counter store shared by every process serving the same tenants.
pub trait SharedCache: Send + Sync {
    /// Atomically increment `key` and return the new value. The expiry is
    /// set to `ttl` only when the increment created the key, so a window
    /// is never extended by later hits.
    fn increment_with_expiry(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl Future<Output = TenantryResult<u64>> + Send;
}
