//! # State Module
//!
//! Route states, their metadata, equality semantics, and the namespace
//! holding the current and previous state.
//!
//! States are immutable after construction and shared behind `Arc`; the
//! engine never hands out a mutable reference, so a state observed by a
//! listener can never change underneath it. Identifiers are strictly
//! monotonic per router instance and survive `stop()`.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::options::NavigationOptions;
use crate::params::{params_equal, Params};
use crate::route_tree::{ParamKind, SegmentParamMap};
use crate::UNKNOWN_ROUTE;

/// Metadata attached to states produced by the engine.
#[derive(Debug, Clone, Serialize)]
pub struct StateMeta {
    /// Strictly monotonic per-router identifier
    pub id: u64,
    /// Declaration origin of each parameter, per segment
    pub params: SegmentParamMap,
    /// The navigation options the state was created under
    pub options: NavigationOptions,
    /// Whether the state was reached through a guard redirect
    pub redirected: bool,
}

/// A resolved route state: name, params, and the path they render to.
#[derive(Debug, Clone, Serialize)]
pub struct State {
    /// Full dotted route name
    pub name: String,
    /// URL and query parameters
    pub params: Params,
    /// The path this state corresponds to
    pub path: String,
    /// Engine metadata; absent on hand-built states
    pub meta: Option<StateMeta>,
}

impl State {
    /// A bare state with no metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, params: Params, path: impl Into<String>) -> Self {
        State {
            name: name.into(),
            params,
            path: path.into(),
            meta: None,
        }
    }

    /// Whether this is the reserved not-found pseudo-state.
    #[must_use]
    pub fn is_unknown_route(&self) -> bool {
        self.name == UNKNOWN_ROUTE
    }

    /// The subset of params declared in the path pattern (URL params).
    ///
    /// Falls back to all params when the state carries no metadata.
    #[must_use]
    pub fn url_params(&self) -> Params {
        let Some(meta) = &self.meta else {
            return self.params.clone();
        };
        let mut url_names: Vec<&str> = Vec::new();
        for kinds in meta.params.values() {
            for (name, kind) in kinds {
                if *kind == ParamKind::Url {
                    url_names.push(name);
                }
            }
        }
        self.params
            .iter()
            .filter(|(k, _)| url_names.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// State equality.
///
/// With `ignore_query` the comparison covers the name and URL params only;
/// otherwise every param must agree (same key sets, element-wise equal
/// values).
#[must_use]
pub fn are_states_equal(a: &State, b: &State, ignore_query: bool) -> bool {
    if a.name != b.name {
        return false;
    }
    if ignore_query {
        params_equal(&a.url_params(), &b.url_params())
    } else {
        params_equal(&a.params, &b.params)
    }
}

/// The result of resolving a forward declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardedState {
    /// Final route name after forwarding
    pub name: String,
    /// Params merged across source defaults, target defaults, and the
    /// caller's params
    pub params: Params,
}

/// Current/previous state pair plus the monotonic id source.
pub(crate) struct StateNamespace {
    current: RwLock<Option<Arc<State>>>,
    previous: RwLock<Option<Arc<State>>>,
    next_id: AtomicU64,
}

impl StateNamespace {
    pub(crate) fn new() -> Self {
        StateNamespace {
            current: RwLock::new(None),
            previous: RwLock::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn current(&self) -> Option<Arc<State>> {
        self.current.read().unwrap().clone()
    }

    pub(crate) fn previous(&self) -> Option<Arc<State>> {
        self.previous.read().unwrap().clone()
    }

    /// Allocate the next state id. Never resets, not even on `stop()`.
    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Push the current state into `previous` and install the new one.
    pub(crate) fn commit(&self, state: Arc<State>) {
        let mut current = self.current.write().unwrap();
        let mut previous = self.previous.write().unwrap();
        *previous = current.take();
        *current = Some(state);
    }

    /// Install a state without touching `previous` (external sync).
    pub(crate) fn set(&self, state: Option<Arc<State>>) {
        let mut current = self.current.write().unwrap();
        *current = state;
    }

    /// Forget both states; the id counter is preserved.
    pub(crate) fn clear(&self) {
        let mut current = self.current.write().unwrap();
        let mut previous = self.previous.write().unwrap();
        *current = None;
        *previous = None;
    }
}

/// Build the meta param map for a hand-made state: every param is treated
/// as a URL param of the single named segment.
#[must_use]
pub(crate) fn synthetic_param_origins(name: &str, params: &Params) -> SegmentParamMap {
    let mut kinds = HashMap::new();
    for key in params.keys() {
        kinds.insert(key.clone(), ParamKind::Url);
    }
    let mut map = SegmentParamMap::new();
    map.insert(name.to_string(), kinds);
    map
}
