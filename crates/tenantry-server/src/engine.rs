//! The assembled set of domain services over one database and one cache.

use std::sync::Arc;

use surrealdb::{Connection, Surreal};
use tenantry_core::models::payment_method::standard_catalog;
use tenantry_core::repository::SharedCache;
use tenantry_db::repository::{
    SurrealBusinessRepository, SurrealPaymentMethodRepository, SurrealRecurringExpenseRepository,
    SurrealShippingZoneRepository,
};
use tenantry_service::{
    BusinessService, PaymentMethodService, RecurringExpenseService, ServiceConfig,
    ShippingZoneService, ThrottleGate, TransactionCoordinator,
};

pub struct Engine<D: Connection, C: SharedCache> {
    pub businesses: BusinessService<SurrealBusinessRepository<D>, C>,
    pub shipping_zones:
        ShippingZoneService<SurrealBusinessRepository<D>, SurrealShippingZoneRepository<D>, C>,
    pub payment_methods:
        PaymentMethodService<SurrealBusinessRepository<D>, SurrealPaymentMethodRepository<D>, C>,
    pub recurring_expenses: RecurringExpenseService<
        SurrealBusinessRepository<D>,
        SurrealRecurringExpenseRepository<D>,
        C,
    >,
}

impl<D: Connection, C: SharedCache> Engine<D, C> {
    /// Wire every service to `db`. All of them share one throttle gate, so
    /// budgets are counted in `cache` regardless of which service is called.
    pub fn new(db: Surreal<D>, cache: C, config: &ServiceConfig) -> Self {
        let gate = Arc::new(ThrottleGate::new(cache, config.throttle.clone()));
        let coordinator = TransactionCoordinator::from_config(config);
        let businesses = || SurrealBusinessRepository::new(db.clone());

        Self {
            businesses: BusinessService::new(businesses(), gate.clone(), coordinator),
            shipping_zones: ShippingZoneService::new(
                businesses(),
                SurrealShippingZoneRepository::new(db.clone()),
                gate.clone(),
                coordinator,
            ),
            payment_methods: PaymentMethodService::new(
                businesses(),
                SurrealPaymentMethodRepository::new(db.clone()),
                Arc::new(standard_catalog()),
                gate.clone(),
                coordinator,
            ),
            recurring_expenses: RecurringExpenseService::new(
                businesses(),
                SurrealRecurringExpenseRepository::new(db.clone()),
                gate,
                coordinator,
            ),
        }
    }
}
