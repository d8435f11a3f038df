//! Boundary validators for route names and request paths.
//!
//! Every public API that accepts a name or a path runs it through these
//! before touching the core, so the inner modules can assume well-formed
//! input.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::ConfigError;
use crate::UNKNOWN_ROUTE;

#[allow(clippy::expect_used)]
static SEGMENT_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9-_]+$").expect("segment name pattern is valid"));

#[allow(clippy::expect_used)]
static PARAM_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("param name pattern is valid"));

/// Validate a local (dot-free) route name.
pub fn validate_segment_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::InvalidRouteName {
            name: name.to_string(),
            reason: "name is empty".to_string(),
        });
    }
    if name.starts_with("@@") {
        return Err(ConfigError::InvalidRouteName {
            name: name.to_string(),
            reason: "the '@@' prefix is reserved for system routes".to_string(),
        });
    }
    if !SEGMENT_NAME_RE.is_match(name) {
        return Err(ConfigError::InvalidRouteName {
            name: name.to_string(),
            reason: "allowed characters are [a-zA-Z0-9-_]".to_string(),
        });
    }
    Ok(())
}

/// Validate a full dotted route name as used in lookups and navigation.
///
/// The system pseudo-route name is accepted as-is.
pub fn validate_route_name(name: &str) -> Result<(), ConfigError> {
    if name == UNKNOWN_ROUTE {
        return Ok(());
    }
    if name.is_empty() {
        return Err(ConfigError::InvalidRouteName {
            name: name.to_string(),
            reason: "name is empty".to_string(),
        });
    }
    for segment in name.split('.') {
        validate_segment_name(segment)?;
    }
    Ok(())
}

/// Validate a parameter name as it appears in a path pattern.
pub fn validate_param_name(path: &str, name: &str) -> Result<(), ConfigError> {
    if !PARAM_NAME_RE.is_match(name) {
        return Err(ConfigError::InvalidPath {
            path: path.to_string(),
            reason: format!("invalid param name '{name}'"),
        });
    }
    Ok(())
}

/// Whether an incoming request path is shaped like something the matcher
/// should even look at: leading slash, no empty segments.
#[must_use]
pub fn is_matchable_path(path: &str) -> bool {
    if path.is_empty() || !path.starts_with('/') {
        return false;
    }
    let pathname = path.split(['?', '#']).next().unwrap_or(path);
    !pathname.contains("//")
}
