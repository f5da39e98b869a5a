//! Tenantry services: business provisioning, shipping zones, payment
//! methods and recurring expenses, plus the throttle gate and provisioning
//! coordinator they share.

pub mod availability;
pub mod business;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod payment_method;
pub mod recurring_expense;
pub mod shipping_zone;
pub mod throttle;

pub use business::BusinessService;
pub use cache::MemoryCache;
#[cfg(feature = "redis")]
pub use cache::RedisCache;
pub use config::{Operation, ServiceConfig, ThrottleConfig, ThrottleRule};
pub use coordinator::TransactionCoordinator;
pub use error::CacheError;
pub use payment_method::PaymentMethodService;
pub use recurring_expense::RecurringExpenseService;
pub use shipping_zone::ShippingZoneService;
pub use throttle::ThrottleGate;
