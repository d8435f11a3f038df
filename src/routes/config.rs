//! Definition store and derived route table.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::errors::ConfigError;
use crate::params::Params;
use crate::route_tree::{Matcher, RouteTree};

use super::forwards::{check_forward_params, resolve_forward_map};
use super::{ForwardFn, ForwardTarget, ParamCodec, RouteDefinition, RoutePatch};

/// Mutable source of truth: the route definition list plus the root path.
///
/// Derivation into a [`RouteTable`] is a separate step so that callers can
/// attempt it, and on failure keep both the old definitions and the old
/// table (mutations are atomic).
pub(crate) struct RouteStore {
    pub defs: Vec<RouteDefinition>,
    pub root_path: String,
}

impl RouteStore {
    pub(crate) fn new() -> Self {
        RouteStore {
            defs: Vec::new(),
            root_path: String::new(),
        }
    }

    pub(crate) fn find(&self, full_name: &str) -> Option<&RouteDefinition> {
        let mut defs = &self.defs;
        let mut found = None;
        for segment in full_name.split('.') {
            found = defs.iter().find(|d| d.name == segment);
            defs = &found?.children;
        }
        found
    }

    /// Append definitions under `parent` (or at the top level).
    pub(crate) fn add(
        &mut self,
        new_defs: Vec<RouteDefinition>,
        parent: Option<&str>,
    ) -> Result<(), ConfigError> {
        let target = match parent {
            None => &mut self.defs,
            Some(p) => {
                let parent_def = self.node_mut(p).ok_or_else(|| ConfigError::UnknownRoute {
                    name: p.to_string(),
                })?;
                &mut parent_def.children
            }
        };
        for def in &new_defs {
            if target.iter().any(|d| d.name == def.name) {
                let full = match parent {
                    None => def.name.clone(),
                    Some(p) => format!("{p}.{}", def.name),
                };
                return Err(ConfigError::DuplicateRoute { name: full });
            }
        }
        target.extend(new_defs);
        Ok(())
    }

    fn node_mut(&mut self, full_name: &str) -> Option<&mut RouteDefinition> {
        let mut segments = full_name.split('.');
        let first = segments.next()?;
        let mut node = self.defs.iter_mut().find(|d| d.name == first)?;
        for segment in segments {
            node = node.children.iter_mut().find(|d| d.name == segment)?;
        }
        Some(node)
    }

    /// Remove the route and its whole subtree; returns the removed subtree.
    pub(crate) fn remove(&mut self, full_name: &str) -> Option<RouteDefinition> {
        match full_name.rsplit_once('.') {
            None => {
                let idx = self.defs.iter().position(|d| d.name == full_name)?;
                Some(self.defs.remove(idx))
            }
            Some((parent, local)) => {
                let parent_def = self.node_mut(parent)?;
                let idx = parent_def.children.iter().position(|d| d.name == local)?;
                Some(parent_def.children.remove(idx))
            }
        }
    }

    /// Clear any static forward pointing at one of the removed names.
    pub(crate) fn purge_forwards_to(&mut self, removed: &[String]) {
        fn walk(defs: &mut [RouteDefinition], removed: &[String]) {
            for def in defs {
                if let Some(ForwardTarget::Static(target)) = &def.forward_to {
                    if removed.iter().any(|r| r == target) {
                        def.forward_to = None;
                    }
                }
                walk(&mut def.children, removed);
            }
        }
        walk(&mut self.defs, removed);
    }

    /// Apply a partial update to one route.
    pub(crate) fn patch(&mut self, full_name: &str, patch: &RoutePatch) -> Result<(), ConfigError> {
        let def = self
            .node_mut(full_name)
            .ok_or_else(|| ConfigError::UnknownRoute {
                name: full_name.to_string(),
            })?;
        if let Some(path) = &patch.path {
            def.path = path.clone();
        }
        if let Some(forward) = &patch.forward_to {
            def.forward_to = forward.clone();
        }
        if let Some(params) = &patch.default_params {
            def.default_params = params.clone();
        }
        if let Some(encoder) = &patch.encode_params {
            def.encode_params = encoder.clone();
        }
        if let Some(decoder) = &patch.decode_params {
            def.decode_params = decoder.clone();
        }
        if let Some(extra) = &patch.extra {
            def.extra = extra.clone();
        }
        Ok(())
    }

    /// Full names of a definition subtree, the root included.
    pub(crate) fn subtree_names(def: &RouteDefinition, parent: &str) -> Vec<String> {
        let full = if parent.is_empty() {
            def.name.clone()
        } else {
            format!("{parent}.{}", def.name)
        };
        let mut out = vec![full.clone()];
        for child in &def.children {
            out.extend(Self::subtree_names(child, &full));
        }
        out
    }
}

/// Everything derived from the definition list, rebuilt atomically on
/// every mutation. Maps are keyed by full dotted route name.
#[derive(Clone)]
pub struct RouteTable {
    /// The compiled tree snapshot
    pub tree: Arc<RouteTree>,
    /// Resolver bound to the same snapshot
    pub matcher: Matcher,
    /// Transitive closure of static forwards
    pub resolved_forwards: HashMap<String, String>,
    /// Dynamic forward callbacks, resolved per request
    pub dynamic_forwards: HashMap<String, Arc<ForwardFn>>,
    /// Route-level default params
    pub default_params: HashMap<String, Params>,
    /// Per-route param encoders
    pub encoders: HashMap<String, Arc<ParamCodec>>,
    /// Per-route param decoders
    pub decoders: HashMap<String, Arc<ParamCodec>>,
    /// Per-route custom fields
    pub custom: HashMap<String, HashMap<String, Value>>,
}

impl RouteTable {
    /// A table with no routes.
    #[must_use]
    pub(crate) fn empty() -> Self {
        let tree = Arc::new(RouteTree::new(""));
        RouteTable {
            matcher: Matcher::new(Arc::clone(&tree)),
            tree,
            resolved_forwards: HashMap::new(),
            dynamic_forwards: HashMap::new(),
            default_params: HashMap::new(),
            encoders: HashMap::new(),
            decoders: HashMap::new(),
            custom: HashMap::new(),
        }
    }

    /// Derive a full table from the store. Fails without side effects.
    pub(crate) fn build(store: &RouteStore) -> Result<Self, ConfigError> {
        let mut tree = RouteTree::new(&store.root_path);
        let mut static_forwards: HashMap<String, String> = HashMap::new();
        let mut dynamic_forwards: HashMap<String, Arc<ForwardFn>> = HashMap::new();
        let mut default_params: HashMap<String, Params> = HashMap::new();
        let mut encoders: HashMap<String, Arc<ParamCodec>> = HashMap::new();
        let mut decoders: HashMap<String, Arc<ParamCodec>> = HashMap::new();
        let mut custom: HashMap<String, HashMap<String, Value>> = HashMap::new();

        fn register(
            tree: &mut RouteTree,
            parent: &str,
            def: &RouteDefinition,
            static_forwards: &mut HashMap<String, String>,
            dynamic_forwards: &mut HashMap<String, Arc<ForwardFn>>,
            default_params: &mut HashMap<String, Params>,
            encoders: &mut HashMap<String, Arc<ParamCodec>>,
            decoders: &mut HashMap<String, Arc<ParamCodec>>,
            custom: &mut HashMap<String, HashMap<String, Value>>,
        ) -> Result<(), ConfigError> {
            tree.add_node(parent, &def.name, &def.path)?;
            let full = if parent.is_empty() {
                def.name.clone()
            } else {
                format!("{parent}.{}", def.name)
            };
            match &def.forward_to {
                Some(ForwardTarget::Static(target)) => {
                    static_forwards.insert(full.clone(), target.clone());
                }
                Some(ForwardTarget::Dynamic(f)) => {
                    dynamic_forwards.insert(full.clone(), Arc::clone(f));
                }
                None => {}
            }
            if !def.default_params.is_empty() {
                default_params.insert(full.clone(), def.default_params.clone());
            }
            if let Some(encoder) = &def.encode_params {
                encoders.insert(full.clone(), Arc::clone(encoder));
            }
            if let Some(decoder) = &def.decode_params {
                decoders.insert(full.clone(), Arc::clone(decoder));
            }
            if !def.extra.is_empty() {
                custom.insert(full.clone(), def.extra.clone());
            }
            for child in &def.children {
                register(
                    tree,
                    &full,
                    child,
                    static_forwards,
                    dynamic_forwards,
                    default_params,
                    encoders,
                    decoders,
                    custom,
                )?;
            }
            Ok(())
        }

        for def in &store.defs {
            register(
                &mut tree,
                "",
                def,
                &mut static_forwards,
                &mut dynamic_forwards,
                &mut default_params,
                &mut encoders,
                &mut decoders,
                &mut custom,
            )?;
        }
        tree.finalize();

        let resolved_forwards = resolve_forward_map(&static_forwards, &tree)?;
        for (source, target) in &static_forwards {
            check_forward_params(&tree, source, target)?;
        }

        info!(
            routes_count = tree.route_names().len(),
            forwards_count = resolved_forwards.len(),
            root_path = %store.root_path,
            "Route table rebuilt"
        );

        let tree = Arc::new(tree);
        Ok(RouteTable {
            matcher: Matcher::new(Arc::clone(&tree)),
            tree,
            resolved_forwards,
            dynamic_forwards,
            default_params,
            encoders,
            decoders,
            custom,
        })
    }
}
