//! Fully-qualified name and identifier handling
//!
//! Tessera addresses every typed instance as `<namespace>.<Type>#<id>`,
//! e.g. `org.acme.vehicle.Car#CAR-001`. Type names are dotted segments;
//! the final segment is the short type name, everything before it is the
//! namespace.

use crate::errors::{Result, StoreError};
use once_cell::sync::Lazy;
use regex::Regex;

/// Separator between a fully-qualified type and an instance identifier.
pub const IDENTIFIER_SEPARATOR: char = '#';

static TYPE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    // Dotted segments, each starting with a letter or underscore.
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .unwrap_or_else(|e| panic!("invalid built-in type name pattern: {}", e))
});

/// Validate a fully-qualified type name.
///
/// # Arguments
/// * `name` - Candidate name, e.g. `org.acme.Car`
///
/// # Errors
/// Returns `InvalidTypeName` for empty names or names with malformed segments
pub fn validate_type_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StoreError::InvalidTypeName(
            "type name must be a non-empty string".to_string(),
        ));
    }
    if !TYPE_NAME_RE.is_match(name) {
        return Err(StoreError::InvalidTypeName(format!(
            "'{}' must contain only dotted segments of letters, numbers, and underscores",
            name
        )));
    }
    Ok(())
}

/// Namespace portion of a fully-qualified type name.
///
/// `org.acme.Car` -> `org.acme`; a bare name has an empty namespace.
pub fn namespace_of(fqn: &str) -> &str {
    match fqn.rfind('.') {
        Some(idx) => &fqn[..idx],
        None => "",
    }
}

/// Short (unqualified) portion of a fully-qualified type name.
pub fn short_name_of(fqn: &str) -> &str {
    match fqn.rfind('.') {
        Some(idx) => &fqn[idx + 1..],
        None => fqn,
    }
}

/// Split a fully-qualified identifier into (type, id).
///
/// # Errors
/// Returns `InvalidIdentifier` if the separator is missing or either side
/// is empty
pub fn split_fqi(fqi: &str) -> Result<(&str, &str)> {
    let idx = fqi
        .find(IDENTIFIER_SEPARATOR)
        .ok_or_else(|| StoreError::InvalidIdentifier(fqi.to_string()))?;
    let (class, id) = (&fqi[..idx], &fqi[idx + 1..]);
    if class.is_empty() || id.is_empty() {
        return Err(StoreError::InvalidIdentifier(fqi.to_string()));
    }
    Ok((class, id))
}

/// Format a fully-qualified identifier from a type name and an id.
pub fn format_fqi(class: &str, id: &str) -> String {
    format!("{}{}{}", class, IDENTIFIER_SEPARATOR, id)
}
