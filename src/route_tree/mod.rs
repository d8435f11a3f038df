//! # Route Tree Module
//!
//! Compiles route definitions into an immutable trie and resolves paths
//! against it in both directions.
//!
//! ## Overview
//!
//! The tree is responsible for:
//! - Compiling path patterns (`/users/:id<\d+>`, `/files/*rest`, `?q&page`)
//!   into per-route [`PathSpec`]s
//! - Matching request paths to routes while extracting URL params
//! - Building canonical paths back from a route name and params
//! - Reporting per-segment parameter metadata (URL vs query origin)
//!
//! ## Architecture
//!
//! Resolution is a two-phase process:
//!
//! 1. **Compilation**: every route mutation rebuilds the whole tree from
//!    the definition list. Siblings are sorted literal-first so static
//!    fragments win over parameterised ones.
//!
//! 2. **Matching**: the request path is split into components and walked
//!    through the trie with backtracking. Parameter extractions are pushed
//!    and popped as branches are tried, so a failed branch leaves no trace.
//!
//! Trees are never mutated in place after compilation. The router holds the
//! current tree behind an atomic swap; a [`Matcher`] captures one snapshot
//! and resolves against it for its whole lifetime.

mod matcher;
mod path;
mod tree;

pub use matcher::{MatchOutcome, Matcher, ParamKind, SegmentParamMap};
pub use path::{PathPart, PathSpec};
pub use tree::{MatchedParams, RouteNode, RouteTree, MAX_INLINE_PARAMS};

pub(crate) use matcher::missing_forward_params;
