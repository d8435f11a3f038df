//! Bidirectional path <-> route resolution over a compiled tree.
//!
//! The matcher is a snapshot type: it shares the tree it was built from and
//! stays valid even while the router swaps in a newer tree, so in-flight
//! transitions always observe consistent routing.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::errors::ConfigError;
use crate::options::{Options, QueryParamsMode, TrailingSlashMode};
use crate::params::{scalar_to_string, Params};
use crate::validation::is_matchable_path;

use super::path::{build_query, encode_segment, parse_query, PathPart};
use super::tree::RouteTree;

/// Where a matched parameter was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// Declared in the path pattern (`:name` or `*name`)
    Url,
    /// Declared after `?` in the pattern
    Query,
}

/// Per-segment record of each declared parameter's kind.
pub type SegmentParamMap = HashMap<String, HashMap<String, ParamKind>>;

/// Successful resolution of a path against the tree.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// Full dotted name of the matched route
    pub name: String,
    /// Extracted URL and query parameters
    pub params: Params,
    /// The path as supplied by the caller
    pub path: String,
    /// Declaration origin of every parameter, per segment
    pub param_origins: SegmentParamMap,
}

/// Bidirectional resolver built from a [`RouteTree`] snapshot.
#[derive(Debug, Clone)]
pub struct Matcher {
    tree: Arc<RouteTree>,
}

impl Matcher {
    pub(crate) fn new(tree: Arc<RouteTree>) -> Self {
        Matcher { tree }
    }

    /// The tree snapshot this matcher resolves against.
    #[must_use]
    pub fn tree(&self) -> &RouteTree {
        &self.tree
    }

    /// Whether a route with this full name exists.
    #[must_use]
    pub fn has_route(&self, name: &str) -> bool {
        self.tree.contains(name)
    }

    /// Full names of the segments leading to `name`, inclusive.
    #[must_use]
    pub fn segments_by_name(&self, name: &str) -> Option<Vec<String>> {
        let chain = self.tree.chain(name)?;
        Some(chain.iter().map(|n| n.full_name.clone()).collect())
    }

    /// Resolve a request path to a route, its params, and their origins.
    ///
    /// Returns `None` for malformed input (no leading slash, doubled
    /// slashes), unmatched paths, undeclared query params in strict mode,
    /// and trailing-slash mismatches in strict mode.
    #[must_use]
    pub fn match_path(&self, path: &str, opts: &Options) -> Option<MatchOutcome> {
        if !is_matchable_path(path) {
            debug!(path = %path, "Path rejected before matching");
            return None;
        }

        let mut remainder = path;
        let root_path = self.tree.root_path();
        if !root_path.is_empty() {
            remainder = path.strip_prefix(root_path)?;
            if remainder.is_empty() {
                remainder = "/";
            }
            if !remainder.starts_with('/') {
                return None;
            }
        }

        let (pathname_raw, query_raw) = match remainder.split_once('?') {
            Some((p, q)) => (p, q),
            None => (remainder, ""),
        };
        let query_raw = query_raw.split('#').next().unwrap_or("");
        let pathname_raw = pathname_raw.split('#').next().unwrap_or(pathname_raw);

        let had_trailing = pathname_raw.len() > 1 && pathname_raw.ends_with('/');
        let pathname = if had_trailing {
            &pathname_raw[..pathname_raw.len() - 1]
        } else {
            pathname_raw
        };

        let comps: Vec<&str> = if pathname == "/" {
            Vec::new()
        } else {
            pathname[1..].split('/').collect()
        };

        let enc = opts.url_params_encoding;
        let (chain, url_params) = self.tree.find_match(&comps, enc)?;
        let leaf = *chain.last()?;

        if opts.trailing_slash == TrailingSlashMode::Strict
            && pathname != "/"
            && had_trailing != leaf.spec.trailing_slash
        {
            debug!(path = %path, route = %leaf.full_name, "Trailing-slash mismatch in strict mode");
            return None;
        }

        let declared_query: Vec<&str> = chain
            .iter()
            .flat_map(|n| n.spec.query_params.iter().map(String::as_str))
            .collect();

        let mut params = Params::new();
        for (name, value) in url_params {
            params.insert(name, Value::String(value));
        }

        let query_pairs = parse_query(query_raw, &opts.query_formats, enc);
        match opts.effective_query_params_mode() {
            QueryParamsMode::Strict => {
                if query_pairs
                    .iter()
                    .any(|(k, _)| !declared_query.contains(&k.as_str()))
                {
                    debug!(path = %path, route = %leaf.full_name, "Undeclared query param in strict mode");
                    return None;
                }
                params.extend(query_pairs);
            }
            QueryParamsMode::Loose => {
                params.extend(
                    query_pairs
                        .into_iter()
                        .filter(|(k, _)| declared_query.contains(&k.as_str())),
                );
            }
            QueryParamsMode::Default => {
                params.extend(query_pairs);
            }
        }

        let mut param_origins = SegmentParamMap::new();
        for node in &chain {
            let mut kinds = HashMap::new();
            for name in node.spec.url_param_names() {
                kinds.insert(name.to_string(), ParamKind::Url);
            }
            for name in &node.spec.query_params {
                kinds.insert(name.clone(), ParamKind::Query);
            }
            param_origins.insert(node.full_name.clone(), kinds);
        }

        Some(MatchOutcome {
            name: leaf.full_name.clone(),
            params,
            path: path.to_string(),
            param_origins,
        })
    }

    /// Build the canonical path for a route from its params.
    ///
    /// Declared URL params must be present and scalar; declared query
    /// params are appended when present; remaining params become extra
    /// query pairs in sorted order.
    pub fn build_path(
        &self,
        name: &str,
        params: &Params,
        opts: &Options,
    ) -> Result<String, ConfigError> {
        let chain = self
            .tree
            .chain(name)
            .ok_or_else(|| ConfigError::UnknownRoute {
                name: name.to_string(),
            })?;

        let enc = opts.url_params_encoding;
        let mut out = String::from(self.tree.root_path());
        let mut url_param_names: Vec<&str> = Vec::new();

        for node in &chain {
            for part in &node.spec.parts {
                match part {
                    PathPart::Literal(lit) => {
                        out.push('/');
                        out.push_str(lit);
                    }
                    PathPart::Param { name: pname, constraint } => {
                        url_param_names.push(pname);
                        let value =
                            params
                                .get(pname)
                                .ok_or_else(|| ConfigError::MissingUrlParam {
                                    route: name.to_string(),
                                    param: pname.clone(),
                                })?;
                        let rendered =
                            scalar_to_string(value).ok_or_else(|| ConfigError::InvalidParamValue {
                                route: name.to_string(),
                                param: pname.clone(),
                                reason: "URL params must be scalar".to_string(),
                            })?;
                        if let Some(re) = constraint {
                            if !re.is_match(&rendered) {
                                return Err(ConfigError::ConstraintViolation {
                                    route: name.to_string(),
                                    param: pname.clone(),
                                    value: rendered,
                                });
                            }
                        }
                        out.push('/');
                        out.push_str(&encode_segment(&rendered, enc, false));
                    }
                    PathPart::Splat { name: pname } => {
                        url_param_names.push(pname);
                        // A splat with no value builds to nothing
                        if let Some(value) = params.get(pname) {
                            let rendered = scalar_to_string(value).ok_or_else(|| {
                                ConfigError::InvalidParamValue {
                                    route: name.to_string(),
                                    param: pname.clone(),
                                    reason: "splat params must be scalar".to_string(),
                                }
                            })?;
                            out.push('/');
                            out.push_str(&encode_segment(&rendered, enc, true));
                        }
                    }
                }
            }
        }

        if out.is_empty() {
            out.push('/');
        }

        let leaf = chain.last().map_or(false, |n| n.spec.trailing_slash);
        match opts.trailing_slash {
            TrailingSlashMode::Never => {
                while out.len() > 1 && out.ends_with('/') {
                    out.pop();
                }
            }
            TrailingSlashMode::Always => {
                if !out.ends_with('/') {
                    out.push('/');
                }
            }
            TrailingSlashMode::Preserve | TrailingSlashMode::Strict => {
                if leaf && !out.ends_with('/') {
                    out.push('/');
                }
            }
        }

        let declared_query: Vec<&str> = chain
            .iter()
            .flat_map(|n| n.spec.query_params.iter().map(String::as_str))
            .collect();

        let mut pairs: Vec<(String, Value)> = Vec::new();
        for key in &declared_query {
            if let Some(value) = params.get(*key) {
                pairs.push(((*key).to_string(), value.clone()));
            }
        }
        let mut extras: Vec<&String> = params
            .keys()
            .filter(|k| {
                !url_param_names.contains(&k.as_str()) && !declared_query.contains(&k.as_str())
            })
            .collect();
        extras.sort();
        for key in extras {
            if let Some(value) = params.get(key) {
                pairs.push((key.clone(), value.clone()));
            }
        }

        let query = build_query(&pairs, &opts.query_formats, enc);
        if !query.is_empty() {
            out.push('?');
            out.push_str(&query);
        }

        Ok(out)
    }
}

/// Shorthand used by forward validation: the URL params of `target` must be
/// a subset of the URL params of `source`.
pub(crate) fn missing_forward_params(
    tree: &RouteTree,
    source: &str,
    target: &str,
) -> Option<Vec<String>> {
    let source_params = tree.url_params(source)?;
    let target_params = tree.url_params(target)?;
    Some(
        target_params
            .into_iter()
            .filter(|p| !source_params.contains(p))
            .collect(),
    )
}
