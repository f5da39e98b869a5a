//! Integration tests for the Business repository using in-memory SurrealDB.

use chrono::Utc;
use rust_decimal_macros::dec;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tenantry_core::Descriptor;
use tenantry_core::error::TenantryError;
use tenantry_core::models::business::{CreateBusiness, ProvisionBusiness, UpdateBusiness};
use tenantry_core::models::shipping_zone::ShippingZoneDraft;
use tenantry_core::repository::{
    BusinessRepository, Pagination, PaymentMethodRepository, RecurringExpenseRepository,
    ShippingZoneRepository,
};
use tenantry_db::repository::{
    SurrealBusinessRepository, SurrealPaymentMethodRepository, SurrealRecurringExpenseRepository,
    SurrealShippingZoneRepository,
};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tenantry_db::run_migrations(&db).await.unwrap();
    db
}

fn new_business(tenant_id: Uuid, descriptor: &str) -> CreateBusiness {
    CreateBusiness {
        tenant_id,
        descriptor: Descriptor::parse(descriptor).unwrap(),
        name: "Acme Store".into(),
        brand: Some("Acme".into()),
        country_code: "SA".into(),
        currency: "SAR".into(),
        vat_rate: dec!(0.15),
        safety_buffer: dec!(0),
        storefront_enabled: false,
        support_email: None,
    }
}

fn provision_input(tenant_id: Uuid, descriptor: &str) -> ProvisionBusiness {
    ProvisionBusiness {
        business: new_business(tenant_id, descriptor),
        zones: vec![ShippingZoneDraft::home("SA", "SAR")],
    }
}

#[tokio::test]
async fn provision_creates_business_and_zones() {
    let db = setup().await;
    let repo = SurrealBusinessRepository::new(db.clone());
    let tenant = Uuid::new_v4();

    let (biz, zones) = repo.provision(provision_input(tenant, "acme")).await.unwrap();

    assert_eq!(biz.tenant_id, tenant);
    assert_eq!(biz.descriptor.as_str(), "acme");
    assert_eq!(biz.vat_rate, dec!(0.15));
    assert!(!biz.is_archived());
    assert_eq!(zones.len(), 1);
    assert_eq!(zones[0].business_id, biz.id);
    assert_eq!(zones[0].countries, vec!["SA".to_string()]);

    let fetched = repo.get_by_descriptor(tenant, "acme").await.unwrap();
    assert_eq!(fetched, biz);
}

#[tokio::test]
async fn provision_returns_the_rows_it_stored() {
    let db = setup().await;
    let repo = SurrealBusinessRepository::new(db.clone());
    let tenant = Uuid::new_v4();
    let gcc = ShippingZoneDraft::new(
        "GCC",
        &["AE".to_string(), "KW".to_string()],
        "SAR",
        dec!(30),
        dec!(500),
    )
    .unwrap();
    let input = ProvisionBusiness {
        business: new_business(tenant, "acme"),
        zones: vec![ShippingZoneDraft::home("SA", "SAR"), gcc],
    };

    let (biz, mut zones) = repo.provision(input).await.unwrap();
    assert_eq!(biz.created_at, biz.updated_at);
    assert!(zones.iter().all(|z| z.created_at == biz.created_at));

    assert_eq!(repo.get_by_id(tenant, biz.id).await.unwrap(), biz);
    let mut stored = SurrealShippingZoneRepository::new(db)
        .list(tenant, biz.id)
        .await
        .unwrap();
    stored.sort_by(|a, b| a.name.cmp(&b.name));
    zones.sort_by(|a, b| a.name.cmp(&b.name));
    assert_eq!(stored, zones);
}

#[tokio::test]
async fn duplicate_descriptor_is_rejected_within_tenant_only() {
    let db = setup().await;
    let repo = SurrealBusinessRepository::new(db);
    let tenant = Uuid::new_v4();

    repo.provision(provision_input(tenant, "acme")).await.unwrap();
    let err = repo
        .provision(provision_input(tenant, "acme"))
        .await
        .unwrap_err();
    assert!(matches!(err, TenantryError::AlreadyExists { .. }), "{err:?}");

    repo.provision(provision_input(Uuid::new_v4(), "acme"))
        .await
        .unwrap();
    assert_eq!(repo.count(tenant, true).await.unwrap(), 1);
}

#[tokio::test]
async fn failed_zone_rolls_back_the_business() {
    let db = setup().await;
    let repo = SurrealBusinessRepository::new(db.clone());
    let tenant = Uuid::new_v4();

    let mut input = provision_input(tenant, "rollback");
    input.zones.push(ShippingZoneDraft::home("SA", "SAR"));

    let err = repo.provision(input).await.unwrap_err();
    assert!(
        matches!(err, TenantryError::AlreadyExists { ref entity, .. } if entity == "shipping_zone"),
        "{err:?}"
    );

    assert_eq!(repo.count(tenant, true).await.unwrap(), 0);
    assert!(!repo.descriptor_exists(tenant, "rollback").await.unwrap());
    let mut result = db.query("SELECT * FROM shipping_zone").await.unwrap();
    let zones: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert!(zones.is_empty());
}

#[tokio::test]
async fn rows_of_other_tenants_are_not_found() {
    let db = setup().await;
    let repo = SurrealBusinessRepository::new(db);
    let (biz, _) = repo
        .provision(provision_input(Uuid::new_v4(), "mine"))
        .await
        .unwrap();

    let other = Uuid::new_v4();
    assert!(matches!(
        repo.get_by_id(other, biz.id).await,
        Err(TenantryError::NotFound { .. })
    ));
    assert!(matches!(
        repo.update(other, biz.id, UpdateBusiness::default()).await,
        Err(TenantryError::NotFound { .. })
    ));
    assert!(matches!(
        repo.delete(other, biz.id).await,
        Err(TenantryError::NotFound { .. })
    ));
}

#[tokio::test]
async fn update_changes_only_supplied_fields() {
    let db = setup().await;
    let repo = SurrealBusinessRepository::new(db);
    let tenant = Uuid::new_v4();
    let (biz, _) = repo.provision(provision_input(tenant, "acme")).await.unwrap();

    let updated = repo
        .update(
            tenant,
            biz.id,
            UpdateBusiness {
                descriptor: Some(Descriptor::parse("acme-two").unwrap()),
                brand: Some(None),
                vat_rate: Some(dec!(0.05)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.descriptor.as_str(), "acme-two");
    assert_eq!(updated.brand, None);
    assert_eq!(updated.vat_rate, dec!(0.05));
    assert_eq!(updated.name, biz.name);
    assert!(updated.updated_at >= biz.updated_at);
}

#[tokio::test]
async fn renaming_onto_taken_descriptor_fails() {
    let db = setup().await;
    let repo = SurrealBusinessRepository::new(db);
    let tenant = Uuid::new_v4();
    repo.provision(provision_input(tenant, "first")).await.unwrap();
    let (second, _) = repo.provision(provision_input(tenant, "second")).await.unwrap();

    let err = repo
        .update(
            tenant,
            second.id,
            UpdateBusiness {
                descriptor: Some(Descriptor::parse("first").unwrap()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TenantryError::AlreadyExists { .. }), "{err:?}");
}

#[tokio::test]
async fn archived_businesses_are_hidden_unless_requested() {
    let db = setup().await;
    let repo = SurrealBusinessRepository::new(db);
    let tenant = Uuid::new_v4();
    let (a, _) = repo.provision(provision_input(tenant, "a-shop")).await.unwrap();
    repo.provision(provision_input(tenant, "b-shop")).await.unwrap();

    let archived = repo
        .set_archived(tenant, a.id, Some(Utc::now()))
        .await
        .unwrap();
    assert!(archived.is_archived());

    let active = repo
        .list(tenant, false, Pagination::default())
        .await
        .unwrap();
    assert_eq!(active.total, 1);
    assert_eq!(active.items[0].descriptor.as_str(), "b-shop");

    let all = repo.list(tenant, true, Pagination::default()).await.unwrap();
    assert_eq!(all.total, 2);

    // Archived descriptors stay reserved.
    assert!(repo.descriptor_exists(tenant, "a-shop").await.unwrap());

    let restored = repo.set_archived(tenant, a.id, None).await.unwrap();
    assert!(!restored.is_archived());
    assert_eq!(repo.count(tenant, false).await.unwrap(), 2);
}

#[tokio::test]
async fn list_paginates_in_creation_order() {
    let db = setup().await;
    let repo = SurrealBusinessRepository::new(db);
    let tenant = Uuid::new_v4();
    for d in ["shop-1", "shop-2", "shop-3"] {
        repo.provision(provision_input(tenant, d)).await.unwrap();
    }

    let page = repo
        .list(tenant, false, Pagination { offset: 1, limit: 1 })
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].descriptor.as_str(), "shop-2");
}

#[tokio::test]
async fn delete_cascades_to_dependents() {
    use tenantry_core::models::payment_method::{
        CreatePaymentMethodOverride, PaymentMethodSettings,
    };
    use tenantry_core::models::recurring_expense::{CreateRecurringExpense, Frequency};

    let db = setup().await;
    let repo = SurrealBusinessRepository::new(db.clone());
    let zones = SurrealShippingZoneRepository::new(db.clone());
    let methods = SurrealPaymentMethodRepository::new(db.clone());
    let expenses = SurrealRecurringExpenseRepository::new(db.clone());
    let tenant = Uuid::new_v4();

    let (biz, _) = repo.provision(provision_input(tenant, "doomed")).await.unwrap();
    methods
        .insert(CreatePaymentMethodOverride {
            tenant_id: tenant,
            business_id: biz.id,
            method: "paypal".into(),
            settings: PaymentMethodSettings {
                enabled: true,
                fee_percent: dec!(0.03),
                fee_fixed: dec!(1),
            },
        })
        .await
        .unwrap();
    expenses
        .create(CreateRecurringExpense {
            tenant_id: tenant,
            business_id: biz.id,
            frequency: Frequency::Monthly,
            start_date: chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: None,
            amount: dec!(500),
            currency: "SAR".into(),
            category: "rent".into(),
            note: None,
        })
        .await
        .unwrap();

    repo.delete(tenant, biz.id).await.unwrap();

    assert!(matches!(
        repo.get_by_id(tenant, biz.id).await,
        Err(TenantryError::NotFound { .. })
    ));
    assert!(zones.list(tenant, biz.id).await.unwrap().is_empty());
    assert!(methods.list(tenant, biz.id).await.unwrap().is_empty());
    let remaining = expenses
        .list(tenant, biz.id, None, Pagination::default())
        .await
        .unwrap();
    assert_eq!(remaining.total, 0);
}
