//! Integration tests for payment method catalog merging and overrides.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rust_decimal_macros::dec;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tenantry_core::RequestContext;
use tenantry_core::error::{TenantryError, TenantryResult};
use tenantry_core::models::business::Business;
use tenantry_core::models::payment_method::{
    CreatePaymentMethodOverride, PaymentMethodOverride, PaymentMethodPatch, PaymentMethodSettings,
    SettingSource, standard_catalog,
};
use tenantry_core::repository::PaymentMethodRepository;
use tenantry_db::repository::{SurrealBusinessRepository, SurrealPaymentMethodRepository};
use tenantry_service::business::NewBusiness;
use tenantry_service::{
    BusinessService, MemoryCache, PaymentMethodService, ThrottleConfig, ThrottleGate,
    TransactionCoordinator,
};
use tokio::sync::Barrier;
use uuid::Uuid;

type Methods = PaymentMethodService<
    SurrealBusinessRepository<Db>,
    SurrealPaymentMethodRepository<Db>,
    MemoryCache,
>;

struct Fixture {
    db: Surreal<Db>,
    methods: Arc<Methods>,
    businesses: BusinessService<SurrealBusinessRepository<Db>, MemoryCache>,
    ctx: RequestContext,
    biz: Business,
}

async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tenantry_db::run_migrations(&db).await.unwrap();

    let gate = Arc::new(ThrottleGate::new(
        MemoryCache::new(),
        ThrottleConfig::unlimited(),
    ));
    let coordinator = TransactionCoordinator::default();
    let businesses = BusinessService::new(
        SurrealBusinessRepository::new(db.clone()),
        gate.clone(),
        coordinator,
    );
    let methods = Arc::new(PaymentMethodService::new(
        SurrealBusinessRepository::new(db.clone()),
        SurrealPaymentMethodRepository::new(db.clone()),
        Arc::new(standard_catalog()),
        gate,
        coordinator,
    ));

    let ctx = RequestContext::new(Uuid::new_v4(), Uuid::new_v4());
    let biz = create(&businesses, &ctx, "acme").await;
    Fixture {
        db,
        methods,
        businesses,
        ctx,
        biz,
    }
}

async fn create(
    businesses: &BusinessService<SurrealBusinessRepository<Db>, MemoryCache>,
    ctx: &RequestContext,
    descriptor: &str,
) -> Business {
    businesses
        .create_business(
            ctx,
            NewBusiness {
                descriptor: descriptor.into(),
                name: "Acme".into(),
                brand: None,
                country_code: "SA".into(),
                currency: "SAR".into(),
                vat_rate: None,
                safety_buffer: None,
                storefront_enabled: true,
                support_email: None,
            },
        )
        .await
        .unwrap()
        .business
}

fn enable() -> PaymentMethodPatch {
    PaymentMethodPatch {
        enabled: Some(true),
        ..Default::default()
    }
}

#[tokio::test]
async fn without_overrides_the_catalog_is_returned_in_order() {
    let f = setup().await;
    let list = f.methods.list_payment_methods(&f.ctx, f.biz.id).await.unwrap();

    let ids: Vec<&str> = list.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(
        ids,
        [
            "cash_on_delivery",
            "bank_transfer",
            "credit_card",
            "tamara",
            "tabby",
            "paypal"
        ]
    );
    assert!(list.iter().all(|m| m.source == SettingSource::Catalog));
    assert!(list[0].enabled && list[1].enabled && !list[2].enabled);
    assert!(list.iter().all(|m| m.fee_percent == dec!(0)));
}

#[tokio::test]
async fn enabling_one_method_changes_only_that_entry() {
    let f = setup().await;
    let before = f.methods.list_payment_methods(&f.ctx, f.biz.id).await.unwrap();

    let tabby = f
        .methods
        .update_payment_method(&f.ctx, f.biz.id, " TABBY ", enable())
        .await
        .unwrap();
    assert!(tabby.enabled);
    assert_eq!(tabby.fee_percent, dec!(0));
    assert_eq!(tabby.source, SettingSource::Override);

    let after = f.methods.list_payment_methods(&f.ctx, f.biz.id).await.unwrap();
    assert_eq!(after.len(), before.len());
    for (old, new) in before.iter().zip(&after) {
        assert_eq!(old.id, new.id);
        if new.id == "tabby" {
            assert_eq!(new, &tabby);
        } else {
            assert_eq!(old, new);
        }
    }
}

#[tokio::test]
async fn later_patches_keep_earlier_fields() {
    let f = setup().await;
    f.methods
        .update_payment_method(
            &f.ctx,
            f.biz.id,
            "credit_card",
            PaymentMethodPatch {
                fee_percent: Some(dec!(0.025)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let card = f
        .methods
        .update_payment_method(
            &f.ctx,
            f.biz.id,
            "credit_card",
            PaymentMethodPatch {
                fee_fixed: Some(dec!(1.00)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(!card.enabled);
    assert_eq!(card.fee_percent, dec!(0.025));
    assert_eq!(card.fee_fixed, dec!(1.00));
    assert_eq!(card.default_fee_percent, dec!(0));

    let effective = f
        .methods
        .effective_payment_method(&f.ctx, f.biz.id, "credit_card")
        .await
        .unwrap();
    assert_eq!(effective, card);
}

#[tokio::test]
async fn invalid_patch_writes_nothing() {
    let f = setup().await;
    let err = f
        .methods
        .update_payment_method(
            &f.ctx,
            f.biz.id,
            "paypal",
            PaymentMethodPatch {
                enabled: Some(true),
                fee_percent: Some(dec!(1.5)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_validation(), "{err:?}");

    let stored = SurrealPaymentMethodRepository::new(f.db.clone())
        .list(f.ctx.tenant_id(), f.biz.id)
        .await
        .unwrap();
    assert!(stored.is_empty());
}

#[tokio::test]
async fn unknown_method_is_not_found() {
    let f = setup().await;
    let err = f
        .methods
        .update_payment_method(&f.ctx, f.biz.id, "bitcoin", enable())
        .await
        .unwrap_err();
    assert!(matches!(err, TenantryError::NotFound { .. }), "{err:?}");

    let err = f
        .methods
        .effective_payment_method(&f.ctx, f.biz.id, "bitcoin")
        .await
        .unwrap_err();
    assert!(matches!(err, TenantryError::NotFound { .. }), "{err:?}");
}

#[tokio::test]
async fn overrides_belong_to_one_business() {
    let f = setup().await;
    let other = create(&f.businesses, &f.ctx, "other").await;

    f.methods
        .update_payment_method(&f.ctx, f.biz.id, "paypal", enable())
        .await
        .unwrap();

    let paypal = f
        .methods
        .effective_payment_method(&f.ctx, other.id, "paypal")
        .await
        .unwrap();
    assert!(!paypal.enabled);
    assert_eq!(paypal.source, SettingSource::Catalog);

    let stranger = RequestContext::new(Uuid::new_v4(), f.ctx.user_id());
    let err = f
        .methods
        .list_payment_methods(&stranger, f.biz.id)
        .await
        .unwrap_err();
    assert!(matches!(err, TenantryError::NotFound { .. }));
}

#[tokio::test]
async fn concurrent_first_updates_share_one_override() {
    let f = setup().await;

    let enable_task = {
        let methods = f.methods.clone();
        let ctx = f.ctx.clone();
        let id = f.biz.id;
        tokio::spawn(async move {
            methods
                .update_payment_method(&ctx, id, "tamara", enable())
                .await
        })
    };
    let fee_task = {
        let methods = f.methods.clone();
        let ctx = f.ctx.clone();
        let id = f.biz.id;
        tokio::spawn(async move {
            methods
                .update_payment_method(
                    &ctx,
                    id,
                    "tamara",
                    PaymentMethodPatch {
                        fee_percent: Some(dec!(0.04)),
                        ..Default::default()
                    },
                )
                .await
        })
    };
    enable_task.await.unwrap().unwrap();
    fee_task.await.unwrap().unwrap();

    let stored = SurrealPaymentMethodRepository::new(f.db.clone())
        .list(f.ctx.tenant_id(), f.biz.id)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);

    let tamara = f
        .methods
        .effective_payment_method(&f.ctx, f.biz.id, "tamara")
        .await
        .unwrap();
    assert!(tamara.enabled);
    assert_eq!(tamara.fee_percent, dec!(0.04));
}

/// Holds the first two override reads until both have happened, so two
/// writers start from the same row.
struct LockstepReads {
    inner: SurrealPaymentMethodRepository<Db>,
    barrier: Barrier,
    reads: AtomicUsize,
}

impl PaymentMethodRepository for LockstepReads {
    async fn list(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
    ) -> TenantryResult<Vec<PaymentMethodOverride>> {
        self.inner.list(tenant_id, business_id).await
    }

    async fn get(
        &self,
        tenant_id: Uuid,
        business_id: Uuid,
        method: &str,
    ) -> TenantryResult<Option<PaymentMethodOverride>> {
        let row = self.inner.get(tenant_id, business_id, method).await;
        if self.reads.fetch_add(1, Ordering::SeqCst) < 2 {
            self.barrier.wait().await;
        }
        row
    }

    async fn insert(
        &self,
        input: CreatePaymentMethodOverride,
    ) -> TenantryResult<PaymentMethodOverride> {
        self.inner.insert(input).await
    }

    async fn update(
        &self,
        current: &PaymentMethodOverride,
        settings: PaymentMethodSettings,
    ) -> TenantryResult<PaymentMethodOverride> {
        self.inner.update(current, settings).await
    }
}

#[tokio::test]
async fn concurrent_patches_to_an_existing_override_both_land() {
    let f = setup().await;
    f.methods
        .update_payment_method(
            &f.ctx,
            f.biz.id,
            "tamara",
            PaymentMethodPatch {
                fee_fixed: Some(dec!(2)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let gate = Arc::new(ThrottleGate::new(
        MemoryCache::new(),
        ThrottleConfig::unlimited(),
    ));
    let lockstep = Arc::new(PaymentMethodService::new(
        SurrealBusinessRepository::new(f.db.clone()),
        LockstepReads {
            inner: SurrealPaymentMethodRepository::new(f.db.clone()),
            barrier: Barrier::new(2),
            reads: AtomicUsize::new(0),
        },
        Arc::new(standard_catalog()),
        gate,
        TransactionCoordinator::new(5, None),
    ));

    let patches = [
        enable(),
        PaymentMethodPatch {
            fee_percent: Some(dec!(0.04)),
            ..Default::default()
        },
    ];
    let tasks: Vec<_> = patches
        .into_iter()
        .map(|patch| {
            let methods = lockstep.clone();
            let ctx = f.ctx.clone();
            let id = f.biz.id;
            tokio::spawn(async move {
                methods
                    .update_payment_method(&ctx, id, "tamara", patch)
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let stored = SurrealPaymentMethodRepository::new(f.db.clone())
        .get(f.ctx.tenant_id(), f.biz.id, "tamara")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.settings.enabled);
    assert_eq!(stored.settings.fee_percent, dec!(0.04));
    assert_eq!(stored.settings.fee_fixed, dec!(2));
    assert_eq!(stored.version, 2);
}
