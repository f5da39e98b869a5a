//! Tenantry Core: domain types shared by every tenantry crate.
//!
//! This crate provides:
//! - The error taxonomy ([`error::TenantryError`])
//! - Descriptor normalization ([`descriptor`])
//! - The generic lifecycle transition table ([`lifecycle`])
//! - The catalog/override merge ([`catalog`])
//! - Domain models ([`models`])
//! - Repository and cache ports ([`repository`])
//!
//! Nothing in here performs I/O; adapters live in `tenantry-db` and
//! `tenantry-service`.

pub mod catalog;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod repository;

pub use context::{Actor, RequestContext};
pub use descriptor::Descriptor;
pub use error::{TenantryError, TenantryResult};
