//! Domain models for the tenantry engine.

pub mod business;
pub mod order;
pub mod payment_method;
pub mod recurring_expense;
pub mod shipping_zone;
