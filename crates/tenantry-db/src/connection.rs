//! Connecting the engine to a SurrealDB server.
//!
//! Tests and embedded deployments skip this module and open an in-memory
//! `Surreal<Db>` directly; repositories are generic over the connection.

use serde::Deserialize;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::{info, warn};

use crate::error::DbError;
use crate::schema::run_migrations;

/// The `[db]` section of the server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// `host:port` of the SurrealDB WebSocket endpoint.
    pub url: String,
    pub namespace: String,
    pub database: String,
    /// Root sign-in is skipped unless both are set.
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "tenantry".into(),
            database: "main".into(),
            username: Some("root".into()),
            password: Some("root".into()),
        }
    }
}

impl DbConfig {
    fn credentials(&self) -> Option<Root> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Root {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), DbError> {
        for (field, value) in [
            ("url", &self.url),
            ("namespace", &self.namespace),
            ("database", &self.database),
        ] {
            if value.trim().is_empty() {
                return Err(DbError::Connection(format!("db.{field} is empty")));
            }
        }
        Ok(())
    }
}

/// An open WebSocket session with the tenantry namespace selected.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        config.validate()?;
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let db = Surreal::new::<Ws>(&config.url)
            .await
            .map_err(|e| DbError::Connection(format!("{}: {e}", config.url)))?;
        match config.credentials() {
            Some(root) => {
                db.signin(root).await?;
            }
            None => warn!("No SurrealDB credentials configured, connecting unauthenticated"),
        }
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        Ok(Self { db })
    }

    /// Bring the selected database up to the current schema.
    pub async fn migrate(&self) -> Result<(), DbError> {
        run_migrations(&self.db).await
    }

    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_sign_in_as_root() {
        let config = DbConfig::default();
        assert_eq!(config.namespace, "tenantry");
        assert!(config.credentials().is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_credentials_skip_sign_in() {
        let config: DbConfig = serde_json::from_value(serde_json::json!({
            "url": "db.internal:8000",
            "password": null,
        }))
        .unwrap();
        assert_eq!(config.url, "db.internal:8000");
        assert_eq!(config.database, "main");
        assert!(config.credentials().is_none());
    }

    #[test]
    fn blank_namespace_is_rejected_before_connecting() {
        let config = DbConfig {
            namespace: " ".into(),
            ..DbConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, DbError::Connection(ref m) if m.contains("namespace")));
    }
}
