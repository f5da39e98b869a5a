//! Error types for the tenantry engine.
//!
//! Every variant maps to a stable machine-readable [`code`](TenantryError::code)
//! plus field/value context ([`details`](TenantryError::details)), so callers
//! can render feedback without matching on message text.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TenantryError {
    #[error("validation failed on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("invalid descriptor: {value}")]
    InvalidDescriptor { value: String },

    #[error("descriptor is already taken: {descriptor}")]
    DescriptorTaken { descriptor: String },

    /// Raw uniqueness violation reported by the store, before a service
    /// translates it into a domain-specific error.
    #[error("{entity} already exists: {detail}")]
    AlreadyExists { entity: String, detail: String },

    #[error("conflicting update on {entity}: {message}")]
    Conflict { entity: String, message: String },

    #[error("invalid {entity} status transition from {from} to {to}")]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
    },

    #[error("rate limit exceeded for {operation}")]
    RateLimited { operation: String },

    #[error("entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// Transient serialization conflict; the coordinator retries these.
    #[error("transaction conflict: {0}")]
    TransactionConflict(String),

    #[error("{operation} gave up after {attempts} attempts")]
    RetriesExhausted { operation: String, attempts: u32 },

    #[error("operation deadline exceeded")]
    DeadlineExceeded,

    #[error("database error: {0}")]
    Database(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type TenantryResult<T> = Result<T, TenantryError>;

impl TenantryError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::InvalidDescriptor { .. } => "invalid_descriptor",
            Self::DescriptorTaken { .. } => "descriptor_taken",
            Self::AlreadyExists { .. } => "already_exists",
            Self::Conflict { .. } => "conflict",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::RateLimited { .. } => "rate_limited",
            Self::NotFound { .. } => "not_found",
            Self::TransactionConflict(_) => "transaction_conflict",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Database(_) => "database_error",
            Self::Cache(_) => "cache_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Field/value context for the API layer.
    pub fn details(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Validation { field, .. } => vec![("field", field.clone())],
            Self::InvalidDescriptor { value } => vec![
                ("descriptor", value.clone()),
                ("hint", "use lowercase letters, numbers, and hyphens".into()),
            ],
            Self::DescriptorTaken { descriptor } => vec![("descriptor", descriptor.clone())],
            Self::AlreadyExists { entity, detail } => {
                vec![("entity", entity.clone()), ("detail", detail.clone())]
            }
            Self::Conflict { entity, .. } => vec![("entity", entity.clone())],
            Self::InvalidTransition { entity, from, to } => vec![
                ("entity", entity.clone()),
                ("from", from.clone()),
                ("to", to.clone()),
            ],
            Self::RateLimited { operation } => vec![("operation", operation.clone())],
            Self::NotFound { entity, id } => vec![("entity", entity.clone()), ("id", id.clone())],
            Self::RetriesExhausted {
                operation,
                attempts,
            } => vec![
                ("operation", operation.clone()),
                ("attempts", attempts.to_string()),
            ],
            Self::TransactionConflict(_)
            | Self::DeadlineExceeded
            | Self::Database(_)
            | Self::Cache(_)
            | Self::Internal(_) => Vec::new(),
        }
    }

    /// Malformed or out-of-range input, rejected before any write.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::InvalidDescriptor { .. })
    }

    /// Whether the end user may simply resubmit the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransactionConflict(_)
                | Self::RetriesExhausted { .. }
                | Self::RateLimited { .. }
                | Self::DeadlineExceeded
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            TenantryError::DescriptorTaken {
                descriptor: "acme".into()
            }
            .code(),
            "descriptor_taken"
        );
        assert_eq!(
            TenantryError::RateLimited {
                operation: "business:create".into()
            }
            .code(),
            "rate_limited"
        );
        assert_eq!(TenantryError::DeadlineExceeded.code(), "deadline_exceeded");
    }

    #[test]
    fn invalid_descriptor_carries_offending_value() {
        let err = TenantryError::InvalidDescriptor {
            value: "Bad Value".into(),
        };
        assert!(err.is_validation());
        assert!(
            err.details()
                .iter()
                .any(|(k, v)| *k == "descriptor" && v == "Bad Value")
        );
    }

    #[test]
    fn retries_exhausted_is_user_retryable() {
        let err = TenantryError::RetriesExhausted {
            operation: "business:create".into(),
            attempts: 3,
        };
        assert!(err.is_retryable());
        assert!(!TenantryError::not_found("business", "x").is_retryable());
    }
}
