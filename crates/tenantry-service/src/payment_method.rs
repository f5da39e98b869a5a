//! Payment methods: the built-in catalog merged with per-business overrides.

use std::sync::Arc;

use tenantry_core::RequestContext;
use tenantry_core::catalog::{Catalog, Overridable};
use tenantry_core::error::{TenantryError, TenantryResult};
use tenantry_core::models::payment_method::{
    CreatePaymentMethodOverride, EffectivePaymentMethod, PaymentMethodDefinition,
    PaymentMethodOverride, PaymentMethodPatch, normalize_method_id,
};
use tenantry_core::repository::{BusinessRepository, PaymentMethodRepository, SharedCache};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Operation;
use crate::coordinator::TransactionCoordinator;
use crate::throttle::ThrottleGate;

pub struct PaymentMethodService<B, P, C>
where
    B: BusinessRepository,
    P: PaymentMethodRepository,
    C: SharedCache,
{
    businesses: B,
    overrides: P,
    catalog: Arc<Catalog<PaymentMethodDefinition>>,
    throttle: Arc<ThrottleGate<C>>,
    coordinator: TransactionCoordinator,
}

impl<B, P, C> PaymentMethodService<B, P, C>
where
    B: BusinessRepository,
    P: PaymentMethodRepository,
    C: SharedCache,
{
    pub fn new(
        businesses: B,
        overrides: P,
        catalog: Arc<Catalog<PaymentMethodDefinition>>,
        throttle: Arc<ThrottleGate<C>>,
        coordinator: TransactionCoordinator,
    ) -> Self {
        Self {
            businesses,
            overrides,
            catalog,
            throttle,
            coordinator,
        }
    }

    /// Every catalog method in catalog order, with the business's overrides applied.
    pub async fn list_payment_methods(
        &self,
        ctx: &RequestContext,
        business_id: Uuid,
    ) -> TenantryResult<Vec<EffectivePaymentMethod>> {
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(deadline, async {
                self.businesses
                    .get_by_id(ctx.tenant_id(), business_id)
                    .await?;
                let overrides = self.overrides.list(ctx.tenant_id(), business_id).await?;
                Ok(self.catalog.effective(
                    overrides
                        .iter()
                        .map(|o| (o.method.as_str(), &o.settings)),
                ))
            })
            .await
    }

    /// Effective settings of one method.
    pub async fn effective_payment_method(
        &self,
        ctx: &RequestContext,
        business_id: Uuid,
        method: &str,
    ) -> TenantryResult<EffectivePaymentMethod> {
        let key = normalize_method_id(method);
        let entry = self.catalog.require(&key)?;
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(deadline, async {
                self.businesses
                    .get_by_id(ctx.tenant_id(), business_id)
                    .await?;
                let existing = self
                    .overrides
                    .get(ctx.tenant_id(), business_id, &key)
                    .await?;
                Ok(entry.view(existing.as_ref().map(|o| &o.settings)))
            })
            .await
    }

    /// Apply `patch` to the business's override for `method`, creating the
    /// override from catalog defaults on first use.
    ///
    /// Concurrent first writers converge on one override row: the loser of
    /// the insert race patches the winner's row. A patch whose read went stale
    /// is re-read and re-applied, so concurrent patches to different fields
    /// all land.
    pub async fn update_payment_method(
        &self,
        ctx: &RequestContext,
        business_id: Uuid,
        method: &str,
        patch: PaymentMethodPatch,
    ) -> TenantryResult<EffectivePaymentMethod> {
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(deadline, async {
                self.throttle
                    .check(Operation::PaymentMethodUpdate, business_id, ctx.user_id())
                    .await?;

                let key = normalize_method_id(method);
                let entry = self.catalog.require(&key)?;
                PaymentMethodDefinition::validate_patch(&patch)?;

                self.businesses
                    .get_by_id(ctx.tenant_id(), business_id)
                    .await?;
                let (tenant_id, key_ref, patch_ref) = (ctx.tenant_id(), key.as_str(), &patch);
                let saved = self
                    .coordinator
                    .run(Operation::PaymentMethodUpdate.as_str(), deadline, move || {
                        self.upsert(tenant_id, business_id, key_ref, patch_ref)
                    })
                    .await?;
                info!(business_id = %business_id, method = %key, "Payment method updated");
                Ok(entry.view(Some(&saved.settings)))
            })
            .await
    }

    async fn upsert(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
        key: &str,
        patch: &PaymentMethodPatch,
    ) -> TenantryResult<PaymentMethodOverride> {
        if let Some(existing) = self.overrides.get(tenant_id, business_id, key).await? {
            return self.apply(existing, patch).await;
        }

        let settings = self.catalog.patched(key, None, patch)?;
        let created = self
            .overrides
            .insert(CreatePaymentMethodOverride {
                tenant_id,
                business_id,
                method: key.to_string(),
                settings,
            })
            .await;
        match created {
            Ok(row) => Ok(row),
            // A concurrent writer created the row first; patch theirs.
            Err(TenantryError::AlreadyExists { .. }) => {
                debug!(business_id = %business_id, method = %key, "Override created concurrently, patching it");
                let existing = self
                    .overrides
                    .get(tenant_id, business_id, key)
                    .await?
                    .ok_or_else(|| {
                        TenantryError::Internal(format!(
                            "payment method override {key} vanished after conflict"
                        ))
                    })?;
                self.apply(existing, patch).await
            }
            Err(e) => Err(e),
        }
    }

    async fn apply(
        &self,
        existing: PaymentMethodOverride,
        patch: &PaymentMethodPatch,
    ) -> TenantryResult<PaymentMethodOverride> {
        let settings = self
            .catalog
            .patched(&existing.method, Some(&existing.settings), patch)?;
        self.overrides.update(&existing, settings).await
    }
}
