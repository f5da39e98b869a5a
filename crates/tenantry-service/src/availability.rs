//! Descriptor availability.
//!
//! The read-side check is optimistic; the unique index on
//! `(tenant_id, descriptor)` is the final authority. Every write path that
//! sets a descriptor passes its error through [`translate_conflict`], so a
//! race lost at commit time still reports `DescriptorTaken`.

use tenantry_core::Descriptor;
use tenantry_core::error::{TenantryError, TenantryResult};
use tenantry_core::repository::BusinessRepository;
use uuid::Uuid;

/// Canonical form of a raw descriptor.
pub fn normalize(raw: &str) -> TenantryResult<Descriptor> {
    Descriptor::parse(raw)
}

pub async fn is_available<R: BusinessRepository>(
    repo: &R,
    tenant_id: Uuid,
    descriptor: &Descriptor,
) -> TenantryResult<bool> {
    Ok(!repo.descriptor_exists(tenant_id, descriptor.as_str()).await?)
}

/// Fail with `DescriptorTaken` unless `candidate` is free or is `current`.
///
/// Returns `false` when `candidate` equals `current`, so callers can skip
/// writing an unchanged descriptor.
pub async fn ensure_available<R: BusinessRepository>(
    repo: &R,
    tenant_id: Uuid,
    candidate: &Descriptor,
    current: Option<&Descriptor>,
) -> TenantryResult<bool> {
    if current == Some(candidate) {
        return Ok(false);
    }
    if is_available(repo, tenant_id, candidate).await? {
        Ok(true)
    } else {
        Err(taken(candidate))
    }
}

/// Map a unique violation on the business table to `DescriptorTaken`.
pub fn translate_conflict(err: TenantryError, descriptor: &Descriptor) -> TenantryError {
    match err {
        TenantryError::AlreadyExists { ref entity, .. } if entity == "business" => {
            taken(descriptor)
        }
        other => other,
    }
}

fn taken(descriptor: &Descriptor) -> TenantryError {
    TenantryError::DescriptorTaken {
        descriptor: descriptor.to_string(),
    }
}
