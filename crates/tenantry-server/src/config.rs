//! Process configuration, read from a TOML file.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use tenantry_db::DbConfig;
use tenantry_service::ServiceConfig;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "TENANTRY_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db: DbConfig,
    pub service: ServiceConfig,
    pub cache: CacheConfig,
    /// Used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db: DbConfig::default(),
            service: ServiceConfig::default(),
            cache: CacheConfig::default(),
            log_filter: "tenantry=info".into(),
        }
    }
}

impl AppConfig {
    /// Load from the file named by [`CONFIG_ENV`], or defaults when unset.
    pub fn from_env() -> anyhow::Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Redis connection URL.
    pub url: String,
    /// Prepended verbatim to every counter key.
    pub key_prefix: String,
    /// How often the in-process cache drops expired counters.
    pub purge_interval_ms: u64,
}

impl CacheConfig {
    pub fn purge_interval(&self) -> Duration {
        Duration::from_millis(self.purge_interval_ms.max(1))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            url: "redis://127.0.0.1:6379".into(),
            key_prefix: "tenantry:".into(),
            purge_interval_ms: 60_000,
        }
    }
}
