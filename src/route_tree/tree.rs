//! The compiled route tree.
//!
//! Routes form a trie keyed by their dotted names; each node owns the
//! compiled [`PathSpec`] for its own pattern fragment. The full path of a
//! route is the concatenation of the fragments along its chain. Trees are
//! immutable once built: every route mutation builds a fresh tree and swaps
//! it in atomically, so in-flight transitions keep the snapshot they
//! started with.

use smallvec::SmallVec;

use crate::errors::ConfigError;
use crate::options::UrlParamsEncoding;
use crate::validation::validate_segment_name;

use super::path::{decode_component, PathPart, PathSpec};

/// Maximum number of extracted URL params before heap allocation. Most
/// route chains declare well under eight.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated storage for params extracted during a match. Duplicate
/// names may appear when ancestor segments reuse a name; conversion into a
/// map keeps the last occurrence (last write wins).
pub type MatchedParams = SmallVec<[(String, String); MAX_INLINE_PARAMS]>;

/// One route in the compiled tree.
#[derive(Debug, Clone)]
pub struct RouteNode {
    /// Local (dot-free) name
    pub name: String,
    /// Full dotted name from the root
    pub full_name: String,
    /// Compiled pattern fragment for this node
    pub spec: PathSpec,
    /// Child routes, sorted literal-first for matching
    pub children: Vec<RouteNode>,
}

impl RouteNode {
    fn new(name: String, full_name: String, spec: PathSpec) -> Self {
        RouteNode {
            name,
            full_name,
            spec,
            children: Vec::new(),
        }
    }

    /// Try to consume this node's own parts from the front of `comps`.
    /// Returns how many components were used; extracted params are pushed
    /// onto `params` (callers truncate on backtrack).
    fn match_own(
        &self,
        comps: &[&str],
        enc: UrlParamsEncoding,
        params: &mut MatchedParams,
    ) -> Option<usize> {
        let mut used = 0;
        for part in &self.spec.parts {
            match part {
                PathPart::Literal(lit) => {
                    let comp = comps.get(used)?;
                    if *comp != lit && decode_component(comp, enc) != *lit {
                        return None;
                    }
                    used += 1;
                }
                PathPart::Param { name, constraint } => {
                    let comp = comps.get(used)?;
                    let decoded = decode_component(comp, enc);
                    if let Some(re) = constraint {
                        if !re.is_match(&decoded) {
                            return None;
                        }
                    }
                    params.push((name.clone(), decoded));
                    used += 1;
                }
                PathPart::Splat { name } => {
                    let rest: Vec<String> = comps[used..]
                        .iter()
                        .map(|c| decode_component(c, enc))
                        .collect();
                    params.push((name.clone(), rest.join("/")));
                    used = comps.len();
                }
            }
        }
        Some(used)
    }
}

/// Immutable compiled route tree.
#[derive(Debug, Clone)]
pub struct RouteTree {
    root: RouteNode,
    root_path: String,
}

impl RouteTree {
    /// An empty tree with the given root path prefix.
    #[must_use]
    pub fn new(root_path: &str) -> Self {
        #[allow(clippy::expect_used)]
        let spec = PathSpec::parse("").expect("empty pattern always parses");
        RouteTree {
            root: RouteNode::new(String::new(), String::new(), spec),
            root_path: root_path.trim_end_matches('/').to_string(),
        }
    }

    /// The path prefix applied before matching and when building.
    #[must_use]
    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    /// Insert a route under `parent` (empty string for top level).
    pub(crate) fn add_node(
        &mut self,
        parent: &str,
        name: &str,
        path: &str,
    ) -> Result<(), ConfigError> {
        validate_segment_name(name)?;
        let spec = PathSpec::parse(path)?;
        let full_name = if parent.is_empty() {
            name.to_string()
        } else {
            format!("{parent}.{name}")
        };
        let parent_node = if parent.is_empty() {
            &mut self.root
        } else {
            self.get_mut(parent)
                .ok_or_else(|| ConfigError::UnknownRoute {
                    name: parent.to_string(),
                })?
        };
        if parent_node.children.iter().any(|c| c.name == name) {
            return Err(ConfigError::DuplicateRoute { name: full_name });
        }
        parent_node
            .children
            .push(RouteNode::new(name.to_string(), full_name, spec));
        Ok(())
    }

    /// Sort siblings so literal fragments match before params and splats.
    /// Call once after the last insertion.
    pub(crate) fn finalize(&mut self) {
        fn sort(node: &mut RouteNode) {
            node.children.sort_by_key(|c| c.spec.first_rank());
            for child in &mut node.children {
                sort(child);
            }
        }
        sort(&mut self.root);
    }

    fn get_mut(&mut self, full_name: &str) -> Option<&mut RouteNode> {
        let mut node = &mut self.root;
        for segment in full_name.split('.') {
            node = node.children.iter_mut().find(|c| c.name == segment)?;
        }
        Some(node)
    }

    /// Look up a node by its full dotted name.
    #[must_use]
    pub fn get(&self, full_name: &str) -> Option<&RouteNode> {
        let mut node = &self.root;
        for segment in full_name.split('.') {
            node = node.children.iter().find(|c| c.name == segment)?;
        }
        Some(node)
    }

    /// Whether a route with this full name exists.
    #[must_use]
    pub fn contains(&self, full_name: &str) -> bool {
        self.get(full_name).is_some()
    }

    /// The node chain from the top level down to `full_name`, inclusive.
    #[must_use]
    pub fn chain(&self, full_name: &str) -> Option<Vec<&RouteNode>> {
        let mut node = &self.root;
        let mut chain = Vec::new();
        for segment in full_name.split('.') {
            node = node.children.iter().find(|c| c.name == segment)?;
            chain.push(node);
        }
        Some(chain)
    }

    /// All full route names, depth first.
    #[must_use]
    pub fn route_names(&self) -> Vec<String> {
        fn walk(node: &RouteNode, out: &mut Vec<String>) {
            for child in &node.children {
                out.push(child.full_name.clone());
                walk(child, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.root, &mut out);
        out
    }

    /// URL parameter names declared along the chain of `full_name`,
    /// ancestors included.
    #[must_use]
    pub fn url_params(&self, full_name: &str) -> Option<Vec<String>> {
        let chain = self.chain(full_name)?;
        let mut out = Vec::new();
        for node in chain {
            for name in node.spec.url_param_names() {
                if !out.iter().any(|n| n == name) {
                    out.push(name.to_string());
                }
            }
        }
        Some(out)
    }

    /// Query parameter names declared along the chain of `full_name`.
    #[must_use]
    pub fn declared_query_params(&self, full_name: &str) -> Option<Vec<String>> {
        let chain = self.chain(full_name)?;
        let mut out = Vec::new();
        for node in chain {
            for name in &node.spec.query_params {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
        }
        Some(out)
    }

    /// Match path components against the tree. Returns the matched node
    /// chain (top level first) and the extracted URL params.
    pub(crate) fn find_match<'t>(
        &'t self,
        comps: &[&str],
        enc: UrlParamsEncoding,
    ) -> Option<(Vec<&'t RouteNode>, MatchedParams)> {
        fn search<'t>(
            node: &'t RouteNode,
            comps: &[&str],
            enc: UrlParamsEncoding,
            params: &mut MatchedParams,
            chain: &mut Vec<&'t RouteNode>,
        ) -> bool {
            if comps.is_empty() && !chain.is_empty() {
                return true;
            }
            for child in &node.children {
                let checkpoint = params.len();
                if let Some(used) = child.match_own(comps, enc, params) {
                    chain.push(child);
                    if search(child, &comps[used..], enc, params, chain) {
                        return true;
                    }
                    chain.pop();
                }
                params.truncate(checkpoint);
            }
            false
        }

        let mut params = MatchedParams::new();
        let mut chain = Vec::new();
        if search(&self.root, comps, enc, &mut params, &mut chain) {
            Some((chain, params))
        } else {
            None
        }
    }
}
