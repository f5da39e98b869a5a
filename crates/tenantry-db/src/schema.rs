//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode. UUIDs, decimals and
//! calendar dates are stored as strings; enums are stored as strings with
//! ASSERT constraints. The unique indexes below are relied on by the
//! services as the final defense against concurrent duplicate writes.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Businesses (tenant scope)
-- =======================================================================
DEFINE TABLE business SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE business TYPE string;
DEFINE FIELD descriptor ON TABLE business TYPE string \
    ASSERT string::len($value) >= 2 AND string::len($value) <= 63;
DEFINE FIELD name ON TABLE business TYPE string;
DEFINE FIELD brand ON TABLE business TYPE option<string>;
DEFINE FIELD country_code ON TABLE business TYPE string \
    ASSERT string::len($value) = 2;
DEFINE FIELD currency ON TABLE business TYPE string \
    ASSERT string::len($value) = 3;
DEFINE FIELD vat_rate ON TABLE business TYPE string DEFAULT '0';
DEFINE FIELD safety_buffer ON TABLE business TYPE string DEFAULT '0';
DEFINE FIELD storefront_enabled ON TABLE business TYPE bool \
    DEFAULT false;
DEFINE FIELD support_email ON TABLE business TYPE option<string>;
DEFINE FIELD archived_at ON TABLE business TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE business TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE business TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_business_tenant_descriptor ON TABLE business \
    COLUMNS tenant_id, descriptor UNIQUE;
DEFINE INDEX idx_business_tenant ON TABLE business COLUMNS tenant_id;

-- =======================================================================
-- Shipping zones (business scope)
-- =======================================================================
DEFINE TABLE shipping_zone SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE shipping_zone TYPE string;
DEFINE FIELD business_id ON TABLE shipping_zone TYPE string;
DEFINE FIELD name ON TABLE shipping_zone TYPE string;
DEFINE FIELD countries ON TABLE shipping_zone TYPE array<string> \
    ASSERT array::len($value) > 0;
DEFINE FIELD currency ON TABLE shipping_zone TYPE string;
DEFINE FIELD shipping_cost ON TABLE shipping_zone TYPE string;
DEFINE FIELD free_shipping_threshold ON TABLE shipping_zone TYPE string;
DEFINE FIELD created_at ON TABLE shipping_zone TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE shipping_zone TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_shipping_zone_business_name ON TABLE shipping_zone \
    COLUMNS business_id, name UNIQUE;

-- =======================================================================
-- Payment method overrides (business scope)
-- =======================================================================
DEFINE TABLE payment_method_override SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE payment_method_override TYPE string;
DEFINE FIELD business_id ON TABLE payment_method_override TYPE string;
DEFINE FIELD method ON TABLE payment_method_override TYPE string;
DEFINE FIELD enabled ON TABLE payment_method_override TYPE bool;
DEFINE FIELD fee_percent ON TABLE payment_method_override TYPE string;
DEFINE FIELD fee_fixed ON TABLE payment_method_override TYPE string;
DEFINE FIELD version ON TABLE payment_method_override TYPE int DEFAULT 0;
DEFINE FIELD created_at ON TABLE payment_method_override TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE payment_method_override TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_payment_method_override_business_method \
    ON TABLE payment_method_override COLUMNS business_id, method UNIQUE;

-- =======================================================================
-- Recurring expenses (business scope)
-- =======================================================================
DEFINE TABLE recurring_expense SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE recurring_expense TYPE string;
DEFINE FIELD business_id ON TABLE recurring_expense TYPE string;
DEFINE FIELD frequency ON TABLE recurring_expense TYPE string \
    ASSERT $value IN ['daily', 'weekly', 'monthly', 'yearly'];
DEFINE FIELD start_date ON TABLE recurring_expense TYPE string;
DEFINE FIELD end_date ON TABLE recurring_expense TYPE option<string>;
DEFINE FIELD next_date ON TABLE recurring_expense TYPE string;
DEFINE FIELD amount ON TABLE recurring_expense TYPE string;
DEFINE FIELD currency ON TABLE recurring_expense TYPE string;
DEFINE FIELD category ON TABLE recurring_expense TYPE string;
DEFINE FIELD note ON TABLE recurring_expense TYPE option<string>;
DEFINE FIELD status ON TABLE recurring_expense TYPE string \
    ASSERT $value IN ['active', 'paused', 'ended', 'canceled'];
DEFINE FIELD created_at ON TABLE recurring_expense TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE recurring_expense TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_recurring_expense_business ON TABLE recurring_expense \
    COLUMNS business_id;
";

/// Apply every migration newer than the highest recorded version.
///
/// Safe to call on every startup.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Tracking table (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "v{} '{}' failed: {e}",
                migration.version, migration.name
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!("recording v{} failed: {e}", migration.version))
            })?;
    }

    let latest = MIGRATIONS.last().map_or(0, |m| m.version);
    info!(version = latest.max(current_version), "Schema up to date");
    Ok(())
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniqueness_indexes_are_declared() {
        for index in [
            "idx_business_tenant_descriptor",
            "idx_shipping_zone_business_name",
            "idx_payment_method_override_business_method",
        ] {
            let line = SCHEMA_V1
                .lines()
                .position(|l| l.contains(index))
                .unwrap_or_else(|| panic!("{index} missing"));
            let decl: String = SCHEMA_V1.lines().skip(line).take(2).collect();
            assert!(decl.contains("UNIQUE"), "{index} must be UNIQUE");
        }
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }
}
