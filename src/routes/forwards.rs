//! Transitive resolution of static forward declarations.

use std::collections::HashMap;

use crate::errors::ConfigError;
use crate::route_tree::{missing_forward_params, RouteTree};

/// Upper bound on forward-chain length during resolution.
pub const MAX_FORWARD_DEPTH: usize = 32;

/// Flatten `source -> target` declarations into `source -> terminal`.
///
/// Detects cycles with a visited list and enforces [`MAX_FORWARD_DEPTH`].
/// Every terminal must be a defined route. The result is idempotent:
/// resolving a resolved target is the identity.
pub(crate) fn resolve_forward_map(
    declared: &HashMap<String, String>,
    tree: &RouteTree,
) -> Result<HashMap<String, String>, ConfigError> {
    let mut resolved = HashMap::with_capacity(declared.len());
    for source in declared.keys() {
        let mut visited: Vec<String> = vec![source.clone()];
        let mut current = source.clone();
        while let Some(next) = declared.get(&current) {
            if visited.iter().any(|seen| seen == next) {
                let mut chain = visited;
                chain.push(next.clone());
                return Err(ConfigError::CyclicForward { chain });
            }
            if visited.len() >= MAX_FORWARD_DEPTH {
                return Err(ConfigError::ForwardDepthExceeded {
                    source: source.clone(),
                    limit: MAX_FORWARD_DEPTH,
                });
            }
            visited.push(next.clone());
            current = next.clone();
        }
        if !tree.contains(&current) {
            return Err(ConfigError::UnknownRoute { name: current });
        }
        resolved.insert(source.clone(), current);
    }
    Ok(resolved)
}

/// Enforce the parameter-compatibility rule: the target's URL params must
/// be a subset of the source's.
pub(crate) fn check_forward_params(
    tree: &RouteTree,
    source: &str,
    target: &str,
) -> Result<(), ConfigError> {
    let missing =
        missing_forward_params(tree, source, target).ok_or_else(|| ConfigError::UnknownRoute {
            name: target.to_string(),
        })?;
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ForwardParamMismatch {
            source: source.to_string(),
            target: target.to_string(),
            missing,
        })
    }
}
