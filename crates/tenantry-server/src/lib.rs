//! Tenantry Server: configuration loading and service wiring for the
//! process entry point.

pub mod config;
pub mod engine;

pub use config::{AppConfig, CacheBackend, CacheConfig};
pub use engine::Engine;
