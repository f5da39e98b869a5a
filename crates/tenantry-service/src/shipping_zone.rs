//! Shipping zone service.
//!
//! Zones always belong to one business of the caller's tenant and are priced
//! in that business's currency.

use std::sync::Arc;

use rust_decimal::Decimal;
use tenantry_core::RequestContext;
use tenantry_core::error::TenantryResult;
use tenantry_core::models::shipping_zone::{
    CreateShippingZone, ShippingZone, ShippingZoneDraft, UpdateShippingZone,
};
use tenantry_core::repository::{BusinessRepository, SharedCache, ShippingZoneRepository};
use tracing::info;
use uuid::Uuid;

use crate::config::Operation;
use crate::coordinator::TransactionCoordinator;
use crate::throttle::ThrottleGate;

#[derive(Debug, Clone)]
pub struct NewShippingZone {
    pub name: String,
    pub countries: Vec<String>,
    pub shipping_cost: Decimal,
    pub free_shipping_threshold: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct ShippingZoneChanges {
    pub name: Option<String>,
    pub countries: Option<Vec<String>>,
    pub shipping_cost: Option<Decimal>,
    pub free_shipping_threshold: Option<Decimal>,
}

pub struct ShippingZoneService<B, Z, C>
where
    B: BusinessRepository,
    Z: ShippingZoneRepository,
    C: SharedCache,
{
    businesses: B,
    zones: Z,
    throttle: Arc<ThrottleGate<C>>,
    coordinator: TransactionCoordinator,
}

impl<B, Z, C> ShippingZoneService<B, Z, C>
where
    B: BusinessRepository,
    Z: ShippingZoneRepository,
    C: SharedCache,
{
    pub fn new(
        businesses: B,
        zones: Z,
        throttle: Arc<ThrottleGate<C>>,
        coordinator: TransactionCoordinator,
    ) -> Self {
        Self {
            businesses,
            zones,
            throttle,
            coordinator,
        }
    }

    pub async fn create_zone(
        &self,
        ctx: &RequestContext,
        business_id: Uuid,
        input: NewShippingZone,
    ) -> TenantryResult<ShippingZone> {
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(deadline, async {
                self.throttle
                    .check(Operation::ZoneCreate, business_id, ctx.user_id())
                    .await?;

                let business = self
                    .businesses
                    .get_by_id(ctx.tenant_id(), business_id)
                    .await?;
                let zone = ShippingZoneDraft::new(
                    &input.name,
                    &input.countries,
                    &business.currency,
                    input.shipping_cost,
                    input.free_shipping_threshold,
                )?;
                let zone = self
                    .zones
                    .create(CreateShippingZone {
                        tenant_id: ctx.tenant_id(),
                        business_id,
                        zone,
                    })
                    .await?;
                info!(business_id = %business_id, zone_id = %zone.id, "Shipping zone created");
                Ok(zone)
            })
            .await
    }

    pub async fn get_zone(
        &self,
        ctx: &RequestContext,
        business_id: Uuid,
        zone_id: Uuid,
    ) -> TenantryResult<ShippingZone> {
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(deadline, self.zones.get(ctx.tenant_id(), business_id, zone_id))
            .await
    }

    pub async fn list_zones(
        &self,
        ctx: &RequestContext,
        business_id: Uuid,
    ) -> TenantryResult<Vec<ShippingZone>> {
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(deadline, async {
                self.businesses
                    .get_by_id(ctx.tenant_id(), business_id)
                    .await?;
                self.zones.list(ctx.tenant_id(), business_id).await
            })
            .await
    }

    /// Apply the supplied fields. The zone is re-priced in the business's
    /// current currency.
    pub async fn update_zone(
        &self,
        ctx: &RequestContext,
        business_id: Uuid,
        zone_id: Uuid,
        changes: ShippingZoneChanges,
    ) -> TenantryResult<ShippingZone> {
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(deadline, async {
                self.throttle
                    .check(Operation::ZoneUpdate, business_id, ctx.user_id())
                    .await?;

                let update = UpdateShippingZone {
                    name: changes.name,
                    countries: changes.countries,
                    currency: None,
                    shipping_cost: changes.shipping_cost,
                    free_shipping_threshold: changes.free_shipping_threshold,
                }
                .normalized()?;

                let business = self
                    .businesses
                    .get_by_id(ctx.tenant_id(), business_id)
                    .await?;
                let update = UpdateShippingZone {
                    currency: Some(business.currency),
                    ..update
                };
                self.zones
                    .update(ctx.tenant_id(), business_id, zone_id, update)
                    .await
            })
            .await
    }

    pub async fn delete_zone(
        &self,
        ctx: &RequestContext,
        business_id: Uuid,
        zone_id: Uuid,
    ) -> TenantryResult<()> {
        let deadline = self.coordinator.deadline(ctx);
        self.coordinator
            .within(deadline, async {
                self.throttle
                    .check(Operation::ZoneDelete, business_id, ctx.user_id())
                    .await?;
                self.zones
                    .delete(ctx.tenant_id(), business_id, zone_id)
                    .await?;
                info!(business_id = %business_id, zone_id = %zone_id, "Shipping zone deleted");
                Ok(())
            })
            .await
    }
}
