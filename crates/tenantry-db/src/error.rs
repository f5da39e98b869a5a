//! Database-specific error types and conversions.
//!
//! SurrealDB reports constraint and commit failures as statement errors
//! carrying only a message, so they are classified here by message text
//! into the cases callers act on: unique violations and retryable
//! transaction conflicts.

use tenantry_core::error::TenantryError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Unique constraint violated on {entity}: {detail}")]
    UniqueViolation { entity: String, detail: String },

    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Invalid stored value: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

const UNIQUE_MARKER: &str = "already contains";
const RETRYABLE_MARKERS: &[&str] = &["can be retried", "read or write conflict"];
const CANCELLED_MARKER: &str = "failed transaction";

/// Unique indexes and the table that owns each.
const UNIQUE_INDEXES: &[(&str, &str)] = &[
    ("idx_business_tenant_descriptor", "business"),
    ("idx_shipping_zone_business_name", "shipping_zone"),
    (
        "idx_payment_method_override_business_method",
        "payment_method_override",
    ),
];

impl DbError {
    /// Classify one statement error.
    pub(crate) fn from_statement(entity: &str, message: String) -> Self {
        if message.contains(UNIQUE_MARKER) {
            // A transaction may touch several tables; name the one whose
            // index rejected the write.
            let entity = UNIQUE_INDEXES
                .iter()
                .find(|(index, _)| message.contains(index))
                .map_or(entity, |(_, table)| *table);
            Self::UniqueViolation {
                entity: entity.to_string(),
                detail: message,
            }
        } else if RETRYABLE_MARKERS.iter().any(|m| message.contains(m)) {
            Self::TransactionConflict(message)
        } else {
            Self::Query(message)
        }
    }

    /// Classify the errors of a cancelled transaction.
    ///
    /// Every statement of a cancelled transaction reports an error, most of
    /// them only "not executed due to a failed transaction". The root cause
    /// is looked for across all of them, unique violations first.
    pub(crate) fn from_transaction<I>(entity: &str, errors: I) -> Self
    where
        I: IntoIterator<Item = (usize, String)>,
    {
        let mut errors: Vec<(usize, String)> = errors.into_iter().collect();
        errors.sort_by_key(|(idx, _)| *idx);

        if let Some((_, msg)) = errors.iter().find(|(_, m)| m.contains(UNIQUE_MARKER)) {
            return Self::from_statement(entity, msg.clone());
        }
        let root = errors
            .iter()
            .find(|(_, m)| !m.contains(CANCELLED_MARKER))
            .or(errors.first());
        match root {
            Some((_, msg)) => Self::from_statement(entity, msg.clone()),
            None => Self::Query("transaction failed without an error".into()),
        }
    }
}

impl From<DbError> for TenantryError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => TenantryError::NotFound { entity, id },
            DbError::UniqueViolation { entity, detail } => {
                TenantryError::AlreadyExists { entity, detail }
            }
            DbError::TransactionConflict(msg) => TenantryError::TransactionConflict(msg),
            other => TenantryError::Database(other.to_string()),
        }
    }
}
