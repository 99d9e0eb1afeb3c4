//! Field-level validation rules for plugin manifests.

use crate::error::{RegistryError, Result};

fn invalid(field: &str, message: impl Into<String>) -> RegistryError {
    RegistryError::Validation {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Validate a plugin or provider name.
///
/// Names must be kebab-case: non-empty, lowercase letters / digits / hyphens,
/// starting with a letter, no leading/trailing/doubled hyphens.
pub fn validate_name(field: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    if !name.chars().next().is_some_and(|c| c.is_ascii_lowercase()) {
        return Err(invalid(field, "must start with a lowercase letter"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid(
            field,
            "must be kebab-case (lowercase letters, digits, hyphens)",
        ));
    }
    if name.ends_with('-') || name.contains("--") {
        return Err(invalid(field, "malformed hyphenation"));
    }
    Ok(())
}

/// Validate a semver-style version string: 2 or 3 numeric components with
/// optional pre-release/build suffix, no leading zeros.
pub fn validate_version(version: &str) -> Result<()> {
    if version.is_empty() {
        return Err(invalid("version", "must not be empty"));
    }

    let core = version.split(['-', '+']).next().unwrap_or(version);
    let parts: Vec<&str> = core.split('.').collect();

    if parts.len() < 2 || parts.len() > 3 {
        return Err(invalid(
            "version",
            format!("'{version}' must have 2 or 3 numeric components"),
        ));
    }

    for part in &parts {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid(
                "version",
                format!("component '{part}' must be a number"),
            ));
        }
        if part.len() > 1 && part.starts_with('0') {
            return Err(invalid(
                "version",
                format!("component '{part}' has a leading zero"),
            ));
        }
    }

    Ok(())
}
