//! Dataset identity validation.
//!
//! A dataset is identified by `(name, version)`. `latest` and `_ALL_` are reserved tokens that must never be
//! stored as an actual version string.

use crate::error::{CatalogError, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Maximum length of a version string.
pub const MAX_VERSION_LEN: usize = 40;

/// Reserved version tokens. Never stored, always resolved by the Catalog.
pub const RESERVED_LATEST: &str = "latest";
pub const RESERVED_ALL: &str = "_ALL_";

fn name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[-a-z_0-9]+$").expect("static regex"))
}

/// Validate a dataset name against `[-a-z_0-9]+`.
pub fn validate_dataset_name(name: &str) -> Result<()> {
    if name.is_empty() || !name_pattern().is_match(name) {
        return Err(CatalogError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Validate a literal version string intended for storage.
///
/// Rejects the empty string, strings over [`MAX_VERSION_LEN`], and the
/// reserved token `latest`.
pub fn validate_stored_version(version: &str) -> Result<()> {
    if version.is_empty() {
        return Err(CatalogError::InvalidVersion(
            version.to_string(),
            "version cannot be empty",
        ));
    }
    if version.len() > MAX_VERSION_LEN {
        return Err(CatalogError::InvalidVersion(
            version.to_string(),
            "version exceeds 40 characters",
        ));
    }
    if version == RESERVED_LATEST {
        return Err(CatalogError::InvalidVersion(
            version.to_string(),
            "'latest' is reserved and cannot be stored as a version",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_names() {
        assert!(validate_dataset_name("population").is_ok());
        assert!(validate_dataset_name("test-dataset_1").is_ok());
    }

    #[test]
    fn rejects_invalid_names() {
        assert!(validate_dataset_name("").is_err());
        assert!(validate_dataset_name("Has-Upper").is_err());
        assert!(validate_dataset_name("has space").is_err());
        assert!(validate_dataset_name("has.dot").is_err());
    }

    #[test]
    fn rejects_reserved_and_oversized_versions() {
        assert!(validate_stored_version("latest").is_err());
        assert!(validate_stored_version("").is_err());
        assert!(validate_stored_version(&"v".repeat(41)).is_err());
        assert!(validate_stored_version("v1").is_ok());
        assert!(validate_stored_version("_ALL_").is_ok()); // reserved only at the removal call site
    }
}
