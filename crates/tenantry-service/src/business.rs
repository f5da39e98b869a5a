//! Business service: provisioning, lookup, updates and lifecycle.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tenantry_core::RequestContext;
use tenantry_core::error::TenantryResult;
use tenantry_core::models::business::{
    Business, CreateBusiness, ProvisionBusiness, UpdateBusiness, normalize_country_code,
    normalize_currency, normalize_name, validate_rate,
};
use tenantry_core::models::shipping_zone::{ShippingZone, ShippingZoneDraft};
use tenantry_core::repository::{BusinessRepository, PaginatedResult, Pagination, SharedCache};
use tracing::info;
use uuid::Uuid;

use crate::availability;
use crate::config::Operation;
use crate::coordinator::TransactionCoordinator;
use crate::throttle::ThrottleGate;

/// Raw input for a new business.
#[derive(Debug, Clone)]
pub struct NewBusiness {
    pub descriptor: String,
    pub name: String,
    pub brand: Option<String>,
    pub country_code: String,
    pub currency: String,
    /// Defaults to zero.
    pub vat_rate: Option<Decimal>,
    /// Defaults to zero.
    pub safety_buffer: Option<Decimal>,
    pub storefront_enabled: bool,
    pub support_email: Option<String>,
}

/// Raw partial update. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct BusinessChanges {
    pub descriptor: Option<String>,
    pub name: Option<String>,
    pub brand: Option<Option<String>>,
    pub country_code: Option<String>,
    pub currency: Option<String>,
    pub vat_rate: Option<Decimal>,
    pub safety_buffer: Option<Decimal>,
    pub storefront_enabled: Option<bool>,
    pub support_email: Option<Option<String>>,
}

/// A business and the zones provisioned with it.
#[derive(Debug, Clone)]
pub struct ProvisionedBusiness {
    pub business: Business,
    pub zones: Vec<ShippingZone>,
}

pub struct BusinessService<B: BusinessRepository, C: SharedCache> {
    repo: B,
    throttle: Arc<ThrottleGate<C>>,
    coordinator: TransactionCoordinator,
}

impl<B: BusinessRepository, C: SharedCache> BusinessService<B, C> {
    pub fn new(
        repo: B,
        throttle: Arc<ThrottleGate<C>>,
        coordinator: TransactionCoordinator,
    ) -> Self {
        Self {
            repo,
            throttle,
            coordinator,
        }
    }

    /// Create a business together with its home shipping zone.
    ///
    /// Either both rows exist afterwards or neither does.
    pub async fn create_business(
        &self,
        ctx: &RequestContext,
        input: NewBusiness,
    ) -> TenantryResult<ProvisionedBusiness> {
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(deadline, async {
                let tenant_id = ctx.tenant_id();
                self.throttle
                    .check(Operation::BusinessCreate, tenant_id, ctx.user_id())
                    .await?;

                let business = validate_new(tenant_id, input)?;
                let home = ShippingZoneDraft::home(&business.country_code, &business.currency);
                let descriptor = business.descriptor.clone();
                let provision = ProvisionBusiness {
                    business,
                    zones: vec![home],
                };

                let repo = &self.repo;
                let descriptor_ref = &descriptor;
                let provision_ref = &provision;
                let (business, zones) = self
                    .coordinator
                    .run(Operation::BusinessCreate.as_str(), deadline, || async move {
                        availability::ensure_available(repo, tenant_id, descriptor_ref, None)
                            .await?;
                        repo.provision(provision_ref.clone()).await
                    })
                    .await
                    .map_err(|e| availability::translate_conflict(e, &descriptor))?;

                info!(
                    tenant_id = %tenant_id,
                    business_id = %business.id,
                    descriptor = %business.descriptor,
                    zones = zones.len(),
                    "Business provisioned"
                );
                Ok(ProvisionedBusiness { business, zones })
            })
            .await
    }

    pub async fn get_business(&self, ctx: &RequestContext, id: Uuid) -> TenantryResult<Business> {
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(deadline, self.repo.get_by_id(ctx.tenant_id(), id))
            .await
    }

    pub async fn get_business_by_descriptor(
        &self,
        ctx: &RequestContext,
        raw: &str,
    ) -> TenantryResult<Business> {
        let descriptor = availability::normalize(raw)?;
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(
                deadline,
                self.repo
                    .get_by_descriptor(ctx.tenant_id(), descriptor.as_str()),
            )
            .await
    }

    pub async fn list_businesses(
        &self,
        ctx: &RequestContext,
        include_archived: bool,
        pagination: Pagination,
    ) -> TenantryResult<PaginatedResult<Business>> {
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(
                deadline,
                self.repo
                    .list(ctx.tenant_id(), include_archived, pagination),
            )
            .await
    }

    pub async fn count_businesses(
        &self,
        ctx: &RequestContext,
        active_only: bool,
    ) -> TenantryResult<u64> {
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(deadline, self.repo.count(ctx.tenant_id(), !active_only))
            .await
    }

    /// Whether `raw` normalizes to a descriptor no business of the tenant uses.
    pub async fn is_descriptor_available(
        &self,
        ctx: &RequestContext,
        raw: &str,
    ) -> TenantryResult<bool> {
        let descriptor = availability::normalize(raw)?;
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(
                deadline,
                availability::is_available(&self.repo, ctx.tenant_id(), &descriptor),
            )
            .await
    }

    pub async fn update_business(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        changes: BusinessChanges,
    ) -> TenantryResult<Business> {
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(deadline, async {
                let tenant_id = ctx.tenant_id();
                self.throttle
                    .check(Operation::BusinessUpdate, tenant_id, ctx.user_id())
                    .await?;

                let mut update = validate_changes(changes)?;
                let current = self.repo.get_by_id(tenant_id, id).await?;

                if let Some(candidate) = update.descriptor.take() {
                    let changed = availability::ensure_available(
                        &self.repo,
                        tenant_id,
                        &candidate,
                        Some(&current.descriptor),
                    )
                    .await?;
                    if changed {
                        update.descriptor = Some(candidate);
                    }
                }
                if update.is_empty() {
                    return Ok(current);
                }

                let descriptor = update.descriptor.clone();
                let updated = self
                    .repo
                    .update(tenant_id, id, update)
                    .await
                    .map_err(|e| match &descriptor {
                        Some(d) => availability::translate_conflict(e, d),
                        None => e,
                    })?;
                info!(tenant_id = %tenant_id, business_id = %id, "Business updated");
                Ok(updated)
            })
            .await
    }

    /// Soft-delete. Archiving an archived business returns it unchanged.
    pub async fn archive_business(
        &self,
        ctx: &RequestContext,
        id: Uuid,
    ) -> TenantryResult<Business> {
        self.set_archived(ctx, id, true).await
    }

    pub async fn unarchive_business(
        &self,
        ctx: &RequestContext,
        id: Uuid,
    ) -> TenantryResult<Business> {
        self.set_archived(ctx, id, false).await
    }

    async fn set_archived(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        archived: bool,
    ) -> TenantryResult<Business> {
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(deadline, async {
                let tenant_id = ctx.tenant_id();
                self.throttle
                    .check(Operation::BusinessArchive, tenant_id, ctx.user_id())
                    .await?;

                let current = self.repo.get_by_id(tenant_id, id).await?;
                if current.is_archived() == archived {
                    return Ok(current);
                }
                let archived_at = archived.then(Utc::now);
                let business = self.repo.set_archived(tenant_id, id, archived_at).await?;
                info!(tenant_id = %tenant_id, business_id = %id, archived, "Business archive state changed");
                Ok(business)
            })
            .await
    }

    /// Hard delete, together with every record the business owns.
    pub async fn delete_business(&self, ctx: &RequestContext, id: Uuid) -> TenantryResult<()> {
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(deadline, async {
                let tenant_id = ctx.tenant_id();
                self.throttle
                    .check(Operation::BusinessDelete, tenant_id, ctx.user_id())
                    .await?;
                self.repo.delete(tenant_id, id).await?;
                info!(tenant_id = %tenant_id, business_id = %id, "Business deleted");
                Ok(())
            })
            .await
    }
}

fn validate_new(tenant_id: Uuid, input: NewBusiness) -> TenantryResult<CreateBusiness> {
    let vat_rate = input.vat_rate.unwrap_or(Decimal::ZERO);
    let safety_buffer = input.safety_buffer.unwrap_or(Decimal::ZERO);
    validate_rate("vat_rate", vat_rate)?;
    validate_rate("safety_buffer", safety_buffer)?;

    Ok(CreateBusiness {
        tenant_id,
        descriptor: availability::normalize(&input.descriptor)?,
        name: normalize_name(&input.name)?,
        brand: optional_text(input.brand),
        country_code: normalize_country_code(&input.country_code)?,
        currency: normalize_currency(&input.currency)?,
        vat_rate,
        safety_buffer,
        storefront_enabled: input.storefront_enabled,
        support_email: optional_text(input.support_email),
    })
}

fn validate_changes(changes: BusinessChanges) -> TenantryResult<UpdateBusiness> {
    if let Some(rate) = changes.vat_rate {
        validate_rate("vat_rate", rate)?;
    }
    if let Some(buffer) = changes.safety_buffer {
        validate_rate("safety_buffer", buffer)?;
    }

    Ok(UpdateBusiness {
        descriptor: changes
            .descriptor
            .as_deref()
            .map(availability::normalize)
            .transpose()?,
        name: changes.name.as_deref().map(normalize_name).transpose()?,
        brand: changes.brand.map(optional_text),
        country_code: changes
            .country_code
            .as_deref()
            .map(normalize_country_code)
            .transpose()?,
        currency: changes
            .currency
            .as_deref()
            .map(normalize_currency)
            .transpose()?,
        vat_rate: changes.vat_rate,
        safety_buffer: changes.safety_buffer,
        storefront_enabled: changes.storefront_enabled,
        support_email: changes.support_email.map(optional_text),
    })
}

/// Blank optional text is stored as absent.
fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
