//! Admission checks applied before a declaration is stored
//!
//! The controller assumes a resource's statement and target never change
//! after creation; these checks are where that is enforced.

use crate::resource::{DatabaseTarget, ManagedResource};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Maximum length of a resource name
pub const MAX_NAME_LEN: usize = 253;

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9.]*[a-z0-9])?$").expect("name pattern is valid")
});

/// A declaration rejected at the API boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid name '{name}': must be lowercase alphanumerics, '-' or '.', at most 253 characters")]
    InvalidName { name: String },

    #[error("Field 'forProvider.{field}' must not be empty")]
    EmptyStatement { field: &'static str },

    #[error("Field 'forProvider.{field}' is immutable")]
    Immutable { field: &'static str },
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.len() > MAX_NAME_LEN || !NAME_PATTERN.is_match(name) {
        return Err(ValidationError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Check a new declaration
pub fn validate_create(resource: &dyn ManagedResource) -> Result<(), ValidationError> {
    validate_name(resource.name())?;
    if resource.statement().trim().is_empty() {
        return Err(ValidationError::EmptyStatement {
            field: resource.kind().statement_field(),
        });
    }
    Ok(())
}

/// Check a declaration replacing a stored one of the same kind and name
pub fn validate_update(
    stored: &dyn ManagedResource,
    incoming: &dyn ManagedResource,
) -> Result<(), ValidationError> {
    validate_create(incoming)?;

    if stored.statement() != incoming.statement() {
        return Err(ValidationError::Immutable {
            field: incoming.kind().statement_field(),
        });
    }

    let (old, new): (&DatabaseTarget, &DatabaseTarget) = (stored.target(), incoming.target());
    if old.database != new.database {
        return Err(ValidationError::Immutable { field: "database" });
    }
    if old.database_ref != new.database_ref {
        return Err(ValidationError::Immutable {
            field: "databaseRef",
        });
    }
    if old.database_selector != new.database_selector {
        return Err(ValidationError::Immutable {
            field: "databaseSelector",
        });
    }
    Ok(())
}
