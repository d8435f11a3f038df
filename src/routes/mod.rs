//! # Routes Module
//!
//! Owns route definitions and everything derived from them: the compiled
//! tree, the matcher, forward maps, per-route default params, param codecs,
//! and custom fields.
//!
//! ## Mutation model
//!
//! The definition list is the single source of truth. Every mutation
//! (`add`, `remove`, `update`, `clear`) re-derives a complete [`RouteTable`]
//! from it; if derivation fails the definition list is rolled back and the
//! previous table stays live. The router publishes tables through an atomic
//! swap, so readers never observe a half-built table.
//!
//! ## Forwarding
//!
//! Static forwards are resolved transitively into a flat name-to-name map
//! at build time, with cycle and depth checks. Dynamic forwards (callbacks)
//! are resolved at request time and never cached.

mod config;
mod forwards;

pub(crate) use config::RouteStore;
pub use config::RouteTable;
pub use forwards::MAX_FORWARD_DEPTH;

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::lifecycle::GuardSpec;
use crate::params::Params;

/// Callback deciding a forward target from the navigation params.
///
/// Must be synchronous; the engine calls it inline during resolution.
pub type ForwardFn = dyn Fn(&Params) -> String + Send + Sync;

/// A user-supplied parameter codec. Returning `None` keeps the params the
/// codec was given (the lenient contract for misbehaving codecs).
pub type ParamCodec = dyn Fn(&Params) -> Option<Params> + Send + Sync;

/// Where a route forwards to.
#[derive(Clone)]
pub enum ForwardTarget {
    /// A fixed route name, resolved transitively at table build time
    Static(String),
    /// A callback resolved on every request
    Dynamic(Arc<ForwardFn>),
}

impl fmt::Debug for ForwardTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForwardTarget::Static(name) => write!(f, "ForwardTarget::Static({name:?})"),
            ForwardTarget::Dynamic(_) => f.write_str("ForwardTarget::Dynamic(..)"),
        }
    }
}

/// Immutable description of a route, supplied by the host application.
///
/// Built with the fluent constructors:
///
/// ```
/// use wayfarer::routes::RouteDefinition;
///
/// let users = RouteDefinition::new("users", "/users")
///     .child(RouteDefinition::new("detail", "/:id"))
///     .with_default_param("page", 1.into());
/// ```
#[derive(Clone)]
pub struct RouteDefinition {
    /// Local, dot-free name
    pub name: String,
    /// Path pattern fragment
    pub path: String,
    /// Nested child routes
    pub children: Vec<RouteDefinition>,
    /// Forward declaration, if any
    pub forward_to: Option<ForwardTarget>,
    /// Params filled in when the navigation does not supply them
    pub default_params: Params,
    /// Codec applied to params before building a path
    pub encode_params: Option<Arc<ParamCodec>>,
    /// Codec applied to params after matching a path
    pub decode_params: Option<Arc<ParamCodec>>,
    /// Activation guard registered when the route is added
    pub can_activate: Option<GuardSpec>,
    /// Deactivation guard registered when the route is added
    pub can_deactivate: Option<GuardSpec>,
    /// Unrestricted custom fields, retrievable via `get_route_config`
    pub extra: HashMap<String, Value>,
}

impl RouteDefinition {
    /// A route with the given local name and path fragment.
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        RouteDefinition {
            name: name.into(),
            path: path.into(),
            children: Vec::new(),
            forward_to: None,
            default_params: Params::new(),
            encode_params: None,
            decode_params: None,
            can_activate: None,
            can_deactivate: None,
            extra: HashMap::new(),
        }
    }

    /// Append a child route.
    #[must_use]
    pub fn child(mut self, child: RouteDefinition) -> Self {
        self.children.push(child);
        self
    }

    /// Append several child routes.
    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = RouteDefinition>) -> Self {
        self.children.extend(children);
        self
    }

    /// Forward to a fixed route name.
    #[must_use]
    pub fn forward_to(mut self, target: impl Into<String>) -> Self {
        self.forward_to = Some(ForwardTarget::Static(target.into()));
        self
    }

    /// Forward through a callback evaluated on every request.
    #[must_use]
    pub fn forward_to_fn(
        mut self,
        f: impl Fn(&Params) -> String + Send + Sync + 'static,
    ) -> Self {
        self.forward_to = Some(ForwardTarget::Dynamic(Arc::new(f)));
        self
    }

    /// Replace the default params wholesale.
    #[must_use]
    pub fn with_default_params(mut self, params: Params) -> Self {
        self.default_params = params;
        self
    }

    /// Set one default param.
    #[must_use]
    pub fn with_default_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.default_params.insert(name.into(), value);
        self
    }

    /// Install a param encoder.
    #[must_use]
    pub fn encode_params(
        mut self,
        f: impl Fn(&Params) -> Option<Params> + Send + Sync + 'static,
    ) -> Self {
        self.encode_params = Some(Arc::new(f));
        self
    }

    /// Install a param decoder.
    #[must_use]
    pub fn decode_params(
        mut self,
        f: impl Fn(&Params) -> Option<Params> + Send + Sync + 'static,
    ) -> Self {
        self.decode_params = Some(Arc::new(f));
        self
    }

    /// Attach an activation guard.
    #[must_use]
    pub fn can_activate(mut self, guard: GuardSpec) -> Self {
        self.can_activate = Some(guard);
        self
    }

    /// Attach a deactivation guard.
    #[must_use]
    pub fn can_deactivate(mut self, guard: GuardSpec) -> Self {
        self.can_deactivate = Some(guard);
        self
    }

    /// Attach a custom field.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

impl fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("children", &self.children)
            .field("forward_to", &self.forward_to)
            .field("default_params", &self.default_params)
            .field("has_encoder", &self.encode_params.is_some())
            .field("has_decoder", &self.decode_params.is_some())
            .field("has_can_activate", &self.can_activate.is_some())
            .field("has_can_deactivate", &self.can_deactivate.is_some())
            .field("extra", &self.extra)
            .finish()
    }
}

/// Partial update applied by `update_route`. Unset fields keep their
/// current value; the double-`Option` fields distinguish "leave alone"
/// from "clear".
#[derive(Clone, Default)]
pub struct RoutePatch {
    /// Replace the path fragment
    pub path: Option<String>,
    /// Replace (`Some(Some(..))`) or clear (`Some(None)`) the forward
    pub forward_to: Option<Option<ForwardTarget>>,
    /// Replace the default params
    pub default_params: Option<Params>,
    /// Replace or clear the encoder
    pub encode_params: Option<Option<Arc<ParamCodec>>>,
    /// Replace or clear the decoder
    pub decode_params: Option<Option<Arc<ParamCodec>>>,
    /// Replace the custom fields
    pub extra: Option<HashMap<String, Value>>,
}

impl RoutePatch {
    /// An empty patch.
    #[must_use]
    pub fn new() -> Self {
        RoutePatch::default()
    }

    /// Replace the path fragment.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Forward to a fixed route name.
    #[must_use]
    pub fn forward_to(mut self, target: impl Into<String>) -> Self {
        self.forward_to = Some(Some(ForwardTarget::Static(target.into())));
        self
    }

    /// Remove any forward declaration.
    #[must_use]
    pub fn clear_forward(mut self) -> Self {
        self.forward_to = Some(None);
        self
    }

    /// Replace the default params.
    #[must_use]
    pub fn default_params(mut self, params: Params) -> Self {
        self.default_params = Some(params);
        self
    }

    /// Replace the custom fields.
    #[must_use]
    pub fn extra(mut self, extra: HashMap<String, Value>) -> Self {
        self.extra = Some(extra);
        self
    }
}

impl fmt::Debug for RoutePatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutePatch")
            .field("path", &self.path)
            .field("forward_to", &self.forward_to)
            .field("default_params", &self.default_params)
            .field("touches_encoder", &self.encode_params.is_some())
            .field("touches_decoder", &self.decode_params.is_some())
            .field("extra", &self.extra)
            .finish()
    }
}
