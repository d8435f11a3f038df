//! Router configuration: immutable-after-start options and registry limits.
//!
//! [`Options`] holds the path-semantics and navigation defaults supplied at
//! construction. The four options that change how paths are interpreted
//! (`trailing_slash`, `query_params_mode`, `url_params_encoding`,
//! `rewrite_path_on_match`) are sealed once the router has started; the
//! router enforces the seal, this module only records which keys it covers.

mod limits;

pub use limits::Limits;

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::params::Params;

/// Trailing-slash policy for matching and building paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingSlashMode {
    /// Permissive match; built paths keep whatever the pattern declares
    #[default]
    Preserve,
    /// Permissive match; built paths never end in a slash
    Never,
    /// Permissive match; built paths always end in a slash
    Always,
    /// Exact match required; built paths keep the pattern's form
    Strict,
}

impl fmt::Display for TrailingSlashMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrailingSlashMode::Preserve => "preserve",
            TrailingSlashMode::Never => "never",
            TrailingSlashMode::Always => "always",
            TrailingSlashMode::Strict => "strict",
        };
        f.write_str(s)
    }
}

impl FromStr for TrailingSlashMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preserve" => Ok(TrailingSlashMode::Preserve),
            "never" => Ok(TrailingSlashMode::Never),
            "always" => Ok(TrailingSlashMode::Always),
            "strict" => Ok(TrailingSlashMode::Strict),
            other => Err(format!("unknown trailing-slash mode '{other}'")),
        }
    }
}

/// Policy for query parameters the matched route does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryParamsMode {
    /// Undeclared query params are preserved in the matched params
    #[default]
    Default,
    /// Any undeclared query param fails the match
    Strict,
    /// Undeclared query params are silently discarded
    Loose,
}

impl fmt::Display for QueryParamsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryParamsMode::Default => "default",
            QueryParamsMode::Strict => "strict",
            QueryParamsMode::Loose => "loose",
        };
        f.write_str(s)
    }
}

impl FromStr for QueryParamsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(QueryParamsMode::Default),
            "strict" => Ok(QueryParamsMode::Strict),
            "loose" => Ok(QueryParamsMode::Loose),
            other => Err(format!("unknown query-params mode '{other}'")),
        }
    }
}

/// Percent-encoding profile applied to URL parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UrlParamsEncoding {
    /// Component-style encoding; decode leaves `+` as a literal plus
    #[default]
    Default,
    /// Encode but re-expose URI reserved characters (`;,/?:@&=+$#`)
    Uri,
    /// Full component encoding, reserved characters included
    UriComponent,
    /// No encoding or decoding at all
    None,
}

impl fmt::Display for UrlParamsEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UrlParamsEncoding::Default => "default",
            UrlParamsEncoding::Uri => "uri",
            UrlParamsEncoding::UriComponent => "uriComponent",
            UrlParamsEncoding::None => "none",
        };
        f.write_str(s)
    }
}

impl FromStr for UrlParamsEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(UrlParamsEncoding::Default),
            "uri" => Ok(UrlParamsEncoding::Uri),
            "uriComponent" => Ok(UrlParamsEncoding::UriComponent),
            "none" => Ok(UrlParamsEncoding::None),
            other => Err(format!("unknown url-params encoding '{other}'")),
        }
    }
}

/// How array-valued query parameters are written and read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayFormat {
    /// `tag=a&tag=b`
    #[default]
    Repeat,
    /// `tag[]=a&tag[]=b`
    Brackets,
    /// `tag[0]=a&tag[1]=b`
    Index,
}

/// Query-string formatting knobs (the `queryParams` option record).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryFormats {
    /// Array serialization style
    pub array_format: ArrayFormat,
}

/// Where the router should go when started without a usable path.
#[derive(Clone, Default)]
pub enum DefaultRoute {
    /// No fallback configured
    #[default]
    None,
    /// A fixed route name
    Name(String),
    /// A callback deciding the route at start time
    Resolver(Arc<dyn Fn() -> Option<String> + Send + Sync>),
}

impl DefaultRoute {
    pub(crate) fn resolve(&self) -> Option<String> {
        match self {
            DefaultRoute::None => None,
            DefaultRoute::Name(name) => Some(name.clone()),
            DefaultRoute::Resolver(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultRoute::None => f.write_str("DefaultRoute::None"),
            DefaultRoute::Name(name) => write!(f, "DefaultRoute::Name({name:?})"),
            DefaultRoute::Resolver(_) => f.write_str("DefaultRoute::Resolver(..)"),
        }
    }
}

/// Router-wide configuration supplied at construction.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Fallback route used by `start` when no path is given or matchable
    pub default_route: DefaultRoute,
    /// Build an `UNKNOWN_ROUTE` state instead of failing when a path does
    /// not match
    pub allow_not_found: bool,
    /// Trailing-slash policy (sealed after start)
    pub trailing_slash: TrailingSlashMode,
    /// Undeclared-query-param policy (sealed after start)
    pub query_params_mode: QueryParamsMode,
    /// Percent-encoding profile for URL params (sealed after start)
    pub url_params_encoding: UrlParamsEncoding,
    /// Replace the matched path with its canonical rebuilt form
    /// (sealed after start)
    pub rewrite_path_on_match: bool,
    /// Router-level default params per route name, merged under route-level
    /// defaults
    pub default_params: HashMap<String, Params>,
    /// Query-string formatting
    pub query_formats: QueryFormats,
    /// Legacy alias: `Some(true)` forces strict query-param mode,
    /// `Some(false)` forces loose
    pub strict_query_params: Option<bool>,
}

impl Options {
    /// The query-param mode after applying the legacy
    /// `strict_query_params` alias.
    #[must_use]
    pub fn effective_query_params_mode(&self) -> QueryParamsMode {
        match self.strict_query_params {
            Some(true) => QueryParamsMode::Strict,
            Some(false) => QueryParamsMode::Loose,
            None => self.query_params_mode,
        }
    }
}

/// Per-navigation options recognised by `navigate`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NavigationOptions {
    /// Replace the current history entry instead of pushing (host glue hint)
    pub replace: bool,
    /// Re-run the transition even if the target equals the current state
    pub reload: bool,
    /// Like `reload`, and additionally skips the same-state comparison
    pub force: bool,
    /// Commit without emitting `TRANSITION_START` or running guards and
    /// middleware
    pub skip_transition: bool,
    /// Free-form origin tag for host applications
    pub source: Option<String>,
    /// Opaque host state carried on the committed state's meta
    pub state: Option<Value>,
    /// Free-form metadata carried on the committed state's meta
    pub metadata: HashMap<String, Value>,
}

impl NavigationOptions {
    /// Options used by `start` for the initial navigation.
    #[must_use]
    pub fn replacing() -> Self {
        NavigationOptions {
            replace: true,
            ..NavigationOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trips() {
        for mode in ["preserve", "never", "always", "strict"] {
            let parsed: TrailingSlashMode = mode.parse().unwrap();
            assert_eq!(parsed.to_string(), mode);
        }
        assert!("sometimes".parse::<TrailingSlashMode>().is_err());
    }

    #[test]
    fn test_strict_query_params_alias() {
        let mut opts = Options::default();
        assert_eq!(opts.effective_query_params_mode(), QueryParamsMode::Default);
        opts.strict_query_params = Some(true);
        assert_eq!(opts.effective_query_params_mode(), QueryParamsMode::Strict);
        opts.strict_query_params = Some(false);
        assert_eq!(opts.effective_query_params_mode(), QueryParamsMode::Loose);
    }
}
