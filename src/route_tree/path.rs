//! Path-pattern compilation and URL component codecs.
//!
//! A pattern is a sequence of slash-separated parts followed by an optional
//! query declaration:
//!
//! ```text
//! /users/:id<\d+>/files/*rest?sort&filter
//! ```
//!
//! Each part is literal, a named parameter (`:name`, optionally constrained
//! by a regex in angle brackets), or a splat (`*name`) consuming the
//! remainder of the path. Everything after `?` declares query parameters.

use regex::Regex;
use serde_json::Value;

use crate::errors::ConfigError;
use crate::options::{ArrayFormat, QueryFormats, UrlParamsEncoding};
use crate::params::scalar_to_string;
use crate::validation::validate_param_name;

/// One compiled component of a path pattern.
#[derive(Debug, Clone)]
pub enum PathPart {
    /// Matches its text exactly
    Literal(String),
    /// Matches any single component, optionally constrained
    Param {
        /// Parameter name
        name: String,
        /// Anchored constraint regex, when declared
        constraint: Option<Regex>,
    },
    /// Matches the remainder of the path, slashes included
    Splat {
        /// Parameter name
        name: String,
    },
}

impl PathPart {
    /// Ordering rank used when sorting sibling routes: literals match
    /// first, then params, then splats.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            PathPart::Literal(_) => 0,
            PathPart::Param { .. } => 2,
            PathPart::Splat { .. } => 3,
        }
    }
}

/// A compiled path pattern for a single route.
#[derive(Debug, Clone)]
pub struct PathSpec {
    /// The pattern as declared
    pub raw: String,
    /// Compiled path components
    pub parts: Vec<PathPart>,
    /// Query parameters declared after `?`
    pub query_params: Vec<String>,
    /// Whether the pattern declared a trailing slash
    pub trailing_slash: bool,
}

impl PathSpec {
    /// Compile a pattern. See the module docs for the grammar.
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let (path_part, query_part) = match pattern.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (pattern, None),
        };

        let mut query_params = Vec::new();
        if let Some(q) = query_part {
            for token in q.split('&') {
                let token = token.strip_prefix(':').unwrap_or(token);
                if token.is_empty() {
                    return Err(ConfigError::InvalidPath {
                        path: pattern.to_string(),
                        reason: "empty query param declaration".to_string(),
                    });
                }
                validate_param_name(pattern, token)?;
                query_params.push(token.to_string());
            }
        }

        if !path_part.is_empty() && !path_part.starts_with('/') {
            return Err(ConfigError::InvalidPath {
                path: pattern.to_string(),
                reason: "path must start with '/'".to_string(),
            });
        }

        let mut trailing_slash = false;
        let mut body = path_part;
        if body.len() > 1 && body.ends_with('/') {
            trailing_slash = true;
            body = &body[..body.len() - 1];
        }

        let mut parts = Vec::new();
        if !body.is_empty() && body != "/" {
            for component in body[1..].split('/') {
                if component.is_empty() {
                    return Err(ConfigError::InvalidPath {
                        path: pattern.to_string(),
                        reason: "empty path segment".to_string(),
                    });
                }
                parts.push(Self::parse_component(pattern, component)?);
            }
        }

        if let Some(pos) = parts.iter().position(|p| matches!(p, PathPart::Splat { .. })) {
            if pos + 1 != parts.len() {
                return Err(ConfigError::InvalidPath {
                    path: pattern.to_string(),
                    reason: "splat must be the final segment".to_string(),
                });
            }
        }

        Ok(PathSpec {
            raw: pattern.to_string(),
            parts,
            query_params,
            trailing_slash,
        })
    }

    fn parse_component(pattern: &str, component: &str) -> Result<PathPart, ConfigError> {
        if let Some(rest) = component.strip_prefix(':') {
            let (name, constraint) = match rest.split_once('<') {
                Some((name, tail)) => {
                    let inner = tail.strip_suffix('>').ok_or_else(|| ConfigError::InvalidPath {
                        path: pattern.to_string(),
                        reason: format!("unterminated constraint in segment ':{rest}'"),
                    })?;
                    let regex =
                        Regex::new(&format!("^(?:{inner})$")).map_err(|e| ConfigError::InvalidPath {
                            path: pattern.to_string(),
                            reason: format!("invalid constraint for ':{name}': {e}"),
                        })?;
                    (name, Some(regex))
                }
                None => (rest, None),
            };
            validate_param_name(pattern, name)?;
            return Ok(PathPart::Param {
                name: name.to_string(),
                constraint,
            });
        }
        if let Some(name) = component.strip_prefix('*') {
            validate_param_name(pattern, name)?;
            return Ok(PathPart::Splat {
                name: name.to_string(),
            });
        }
        Ok(PathPart::Literal(component.to_string()))
    }

    /// Names of the URL parameters (params and splats) this pattern declares.
    #[must_use]
    pub fn url_param_names(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                PathPart::Param { name, .. } | PathPart::Splat { name } => Some(name.as_str()),
                PathPart::Literal(_) => None,
            })
            .collect()
    }

    pub(crate) fn first_rank(&self) -> u8 {
        self.parts.first().map_or(1, PathPart::rank)
    }
}

/// Encoded forms of the URI reserved set, re-exposed by the `uri` profile.
const URI_RESERVED: &[(&str, &str)] = &[
    ("%3B", ";"),
    ("%2C", ","),
    ("%2F", "/"),
    ("%3F", "?"),
    ("%3A", ":"),
    ("%40", "@"),
    ("%26", "&"),
    ("%3D", "="),
    ("%2B", "+"),
    ("%24", "$"),
    ("%23", "#"),
];

/// Encode a value into a path segment position.
pub(crate) fn encode_segment(value: &str, enc: UrlParamsEncoding, keep_slashes: bool) -> String {
    let encoded = match enc {
        UrlParamsEncoding::None => return value.to_string(),
        UrlParamsEncoding::Uri => {
            let mut s = urlencoding::encode(value).into_owned();
            for (from, to) in URI_RESERVED {
                s = s.replace(from, to);
            }
            s
        }
        UrlParamsEncoding::Default | UrlParamsEncoding::UriComponent => {
            urlencoding::encode(value).into_owned()
        }
    };
    if keep_slashes {
        encoded.replace("%2F", "/")
    } else {
        encoded
    }
}

/// Encode a value into a query key or value position. Reserved characters
/// are never re-exposed here, they would corrupt the query structure.
pub(crate) fn encode_query_component(value: &str, enc: UrlParamsEncoding) -> String {
    match enc {
        UrlParamsEncoding::None => value.to_string(),
        _ => urlencoding::encode(value).into_owned(),
    }
}

/// Decode a percent-encoded value. `+` stays a literal plus. Undecodable
/// input is passed through untouched.
pub(crate) fn decode_component(value: &str, enc: UrlParamsEncoding) -> String {
    match enc {
        UrlParamsEncoding::None => value.to_string(),
        _ => urlencoding::decode(value)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| value.to_string()),
    }
}

/// Parse a raw query string into ordered key/value pairs.
///
/// Valueless keys become `true`. Repeated keys (or the configured array
/// syntax) accumulate into arrays in appearance order.
pub(crate) fn parse_query(
    query: &str,
    formats: &QueryFormats,
    enc: UrlParamsEncoding,
) -> Vec<(String, Value)> {
    let mut out: Vec<(String, Value)> = Vec::new();
    for token in query.split('&') {
        if token.is_empty() {
            continue;
        }
        let (raw_key, raw_val) = match token.split_once('=') {
            Some((k, v)) => (k, Some(v)),
            None => (token, None),
        };
        let mut key = decode_component(raw_key, enc);
        let mut array_token = false;
        match formats.array_format {
            ArrayFormat::Brackets => {
                if let Some(base) = key.strip_suffix("[]") {
                    key = base.to_string();
                    array_token = true;
                }
            }
            ArrayFormat::Index => {
                if let (Some(open), true) = (key.rfind('['), key.ends_with(']')) {
                    let idx = &key[open + 1..key.len() - 1];
                    if !idx.is_empty() && idx.bytes().all(|b| b.is_ascii_digit()) {
                        key.truncate(open);
                        array_token = true;
                    }
                }
            }
            ArrayFormat::Repeat => {}
        }
        let value = match raw_val {
            Some(v) => Value::String(decode_component(v, enc)),
            None => Value::Bool(true),
        };
        if let Some((_, existing)) = out.iter_mut().find(|(k, _)| *k == key) {
            match existing {
                Value::Array(items) => items.push(value),
                other => {
                    let prev = other.take();
                    *other = Value::Array(vec![prev, value]);
                }
            }
        } else if array_token {
            out.push((key, Value::Array(vec![value])));
        } else {
            out.push((key, value));
        }
    }
    out
}

/// Serialize key/value pairs into a query string. `Null` values are
/// omitted, `true` renders as a valueless key, arrays follow the configured
/// array format.
pub(crate) fn build_query(
    pairs: &[(String, Value)],
    formats: &QueryFormats,
    enc: UrlParamsEncoding,
) -> String {
    let mut parts: Vec<String> = Vec::new();
    for (key, value) in pairs {
        let ekey = encode_query_component(key, enc);
        match value {
            Value::Null => {}
            Value::Bool(true) => parts.push(ekey),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    let Some(s) = scalar_to_string(item) else {
                        continue;
                    };
                    // Bool(true) inside an array keeps its textual form
                    let k = match formats.array_format {
                        ArrayFormat::Repeat => ekey.clone(),
                        ArrayFormat::Brackets => format!("{ekey}[]"),
                        ArrayFormat::Index => format!("{ekey}[{i}]"),
                    };
                    parts.push(format!("{}={}", k, encode_query_component(&s, enc)));
                }
            }
            other => {
                if let Some(s) = scalar_to_string(other) {
                    parts.push(format!("{}={}", ekey, encode_query_component(&s, enc)));
                }
            }
        }
    }
    parts.join("&")
}
