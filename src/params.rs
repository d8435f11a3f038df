//! Parameter maps and the serializable-value contract.
//!
//! Route parameters are maps from parameter name to [`serde_json::Value`].
//! The `Value` representation structurally enforces most of the
//! serializability contract: functions, class instances, symbols, and cyclic
//! references cannot be expressed, and `serde_json::Number` cannot hold NaN
//! or an infinity. What remains to check at the boundary is nesting depth.

use serde_json::Value;
use std::collections::HashMap;

use crate::errors::ConfigError;

/// Parameter map attached to route states and navigation requests.
pub type Params = HashMap<String, Value>;

/// Maximum nesting depth accepted inside a single parameter value.
pub const MAX_PARAM_DEPTH: usize = 16;

/// Validate that every value in the map stays within the serializable
/// contract.
///
/// `serde_json::Value` already rules out non-finite numbers and cyclic
/// structures, so the walk only enforces the depth bound.
pub fn validate_params(params: &Params) -> Result<(), ConfigError> {
    for (name, value) in params {
        if value_depth(value) > MAX_PARAM_DEPTH {
            return Err(ConfigError::InvalidParamValue {
                route: String::new(),
                param: name.clone(),
                reason: format!("nested deeper than {MAX_PARAM_DEPTH} levels"),
            });
        }
    }
    Ok(())
}

fn value_depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(value_depth).max().unwrap_or(0),
        Value::Object(map) => 1 + map.values().map(value_depth).max().unwrap_or(0),
        _ => 1,
    }
}

/// Merge maps left to right; later maps override earlier ones.
#[must_use]
pub fn merge(layers: &[&Params]) -> Params {
    let mut out = Params::new();
    for layer in layers {
        for (k, v) in layer.iter() {
            out.insert(k.clone(), v.clone());
        }
    }
    out
}

/// Deep equality over two parameter maps: identical key sets and
/// element-wise equal values (arrays compared element by element).
#[must_use]
pub fn params_equal(a: &Params, b: &Params) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().all(|(k, v)| b.get(k) == Some(v))
}

/// Whether every entry of `candidate` is present and equal in `reference`.
///
/// Used by the non-strict active-route test, where the caller only pins the
/// params it cares about.
#[must_use]
pub fn params_subset(candidate: &Params, reference: &Params) -> bool {
    candidate.iter().all(|(k, v)| reference.get(k) == Some(v))
}

/// Render a value into a single path segment.
///
/// Only scalars can appear in a URL path position; arrays and objects are
/// rejected by returning `None`.
#[must_use]
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
