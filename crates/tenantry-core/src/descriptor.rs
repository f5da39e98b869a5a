//! Tenant-unique, URL-safe descriptors.
//!
//! A descriptor is 2–63 characters of lowercase letters, digits and
//! hyphens, starting with a letter or digit. Input is trimmed and
//! lower-cased before validation, and only the canonical form is ever
//! compared or persisted.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{TenantryError, TenantryResult};

static DESCRIPTOR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]{1,62}$").expect("descriptor pattern"));

/// A normalized descriptor. Construct via [`Descriptor::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Descriptor(String);

impl Descriptor {
    /// Normalize and validate a raw, human-entered descriptor.
    pub fn parse(raw: &str) -> TenantryResult<Self> {
        normalize(raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// The canonical form of `raw`, or the reason it cannot be a descriptor.
pub fn normalize(raw: &str) -> TenantryResult<String> {
    let value = raw.trim().to_lowercase();
    if value.is_empty() {
        return Err(TenantryError::validation(
            "descriptor",
            "descriptor is required",
        ));
    }
    if !DESCRIPTOR_PATTERN.is_match(&value) {
        return Err(TenantryError::InvalidDescriptor { value });
    }
    Ok(value)
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Descriptor {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Descriptor {
    type Error = TenantryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Descriptor> for String {
    fn from(value: Descriptor) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_lowercases() {
        assert_eq!(normalize("  FOO-Bar ").unwrap(), "foo-bar");
    }

    #[test]
    fn empty_is_a_validation_error() {
        let err = normalize("").unwrap_err();
        assert!(matches!(err, TenantryError::Validation { ref field, .. } if field == "descriptor"));
        assert!(normalize("   ").unwrap_err().is_validation());
    }

    #[test]
    fn single_character_is_too_short() {
        let err = normalize("a").unwrap_err();
        assert_eq!(
            err,
            TenantryError::InvalidDescriptor {
                value: "a".into()
            }
        );
    }

    #[test]
    fn length_bounds() {
        assert!(normalize("ab").is_ok());
        let max = format!("a{}", "b".repeat(62));
        assert_eq!(max.len(), 63);
        assert!(normalize(&max).is_ok());
        let over = format!("a{}", "b".repeat(63));
        assert!(normalize(&over).is_err());
    }

    #[test]
    fn rejects_leading_hyphen_and_symbols() {
        assert!(normalize("-acme").is_err());
        assert!(normalize("acme_store").is_err());
        assert!(normalize("acme store").is_err());
        assert!(normalize("9-lives").is_ok());
    }

    #[test]
    fn invalid_value_is_reported_normalized() {
        let err = Descriptor::parse(" Acme Store ").unwrap_err();
        assert_eq!(
            err,
            TenantryError::InvalidDescriptor {
                value: "acme store".into()
            }
        );
    }

    #[test]
    fn deserialization_normalizes() {
        let d: Descriptor = serde_json::from_str("\" My-Shop \"").unwrap();
        assert_eq!(d.as_str(), "my-shop");
        assert!(serde_json::from_str::<Descriptor>("\"x\"").is_err());
    }
}
