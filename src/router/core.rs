//! The router: construction, route mutation, path operations, state
//! operations, events, plugins, guards, middleware, dependencies, and
//! navigation.

use arc_swap::ArcSwap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::dependencies::{Dependencies, Dependency};
use crate::errors::{ConfigError, ErrorCode, NavigationError};
use crate::events::{channels, EventBus, EventPayload, ListenerFn, Subscription};
use crate::lifecycle::{
    GuardFn, GuardKind, GuardResult, GuardSpec, LifecycleRegistry, RedirectTarget,
};
use crate::options::{Limits, NavigationOptions, Options};
use crate::params::{merge, params_subset, Params};
use crate::route_tree::{MatchOutcome, ParamKind, SegmentParamMap};
use crate::routes::{RouteDefinition, RoutePatch, RouteStore, RouteTable};
use crate::state::{
    are_states_equal, synthetic_param_origins, ForwardedState, State, StateMeta, StateNamespace,
};
use crate::transition::{self, TransitionToken};
use crate::validation::validate_route_name;
use crate::UNKNOWN_ROUTE;

/// The routing engine.
///
/// All methods take `&self`; the router is `Send + Sync` and is typically
/// shared behind an `Arc` when navigations are issued from more than one
/// thread.
pub struct Router {
    pub(crate) options: RwLock<Options>,
    limits: Limits,
    dependencies: Dependencies,
    pub(crate) bus: Arc<EventBus>,
    lifecycle: LifecycleRegistry,
    plugins: Arc<crate::plugins::PluginRegistry>,
    store: Mutex<RouteStore>,
    table: ArcSwap<RouteTable>,
    pub(crate) namespace: StateNamespace,
    pub(crate) active_transition: Mutex<Option<Arc<TransitionToken>>>,
    pub(crate) active: AtomicBool,
    pub(crate) started: AtomicBool,
}

impl Router {
    /// A router with the given options and environment-derived limits.
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self::with_limits(options, Limits::from_env())
    }

    /// A router with explicit limits.
    #[must_use]
    pub fn with_limits(options: Options, limits: Limits) -> Self {
        Router {
            options: RwLock::new(options),
            dependencies: Dependencies::new(limits.max_dependencies),
            bus: Arc::new(EventBus::new(&limits)),
            lifecycle: LifecycleRegistry::new(&limits),
            plugins: Arc::new(crate::plugins::PluginRegistry::new(&limits)),
            store: Mutex::new(RouteStore::new()),
            table: ArcSwap::from_pointee(RouteTable::empty()),
            namespace: StateNamespace::new(),
            active_transition: Mutex::new(None),
            active: AtomicBool::new(false),
            started: AtomicBool::new(false),
            limits,
        }
    }

    /// The configured limits.
    #[must_use]
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// A clone of the current options.
    #[must_use]
    pub fn options(&self) -> Options {
        self.options.read().unwrap().clone()
    }

    /// Replace the options. Once the router has started, the
    /// path-semantics options are sealed and must keep their values.
    pub fn set_options(&self, new: Options) -> Result<(), ConfigError> {
        if self.is_started() {
            let current = self.options.read().unwrap();
            if current.trailing_slash != new.trailing_slash {
                return Err(ConfigError::OptionSealed {
                    option: "trailing_slash",
                });
            }
            // The legacy strict_query_params alias feeds into the effective
            // query-param mode, so it is sealed together with it.
            if current.query_params_mode != new.query_params_mode
                || current.strict_query_params != new.strict_query_params
            {
                return Err(ConfigError::OptionSealed {
                    option: "query_params_mode",
                });
            }
            if current.url_params_encoding != new.url_params_encoding {
                return Err(ConfigError::OptionSealed {
                    option: "url_params_encoding",
                });
            }
            if current.rewrite_path_on_match != new.rewrite_path_on_match {
                return Err(ConfigError::OptionSealed {
                    option: "rewrite_path_on_match",
                });
            }
        }
        *self.options.write().unwrap() = new;
        Ok(())
    }

    pub(crate) fn lifecycle(&self) -> &LifecycleRegistry {
        &self.lifecycle
    }

    pub(crate) fn current_table(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    pub(crate) fn emit(&self, channel: &str, payload: EventPayload) {
        if let Err(e) = self.bus.emit(channel, &payload) {
            error!(channel = %channel, error = %e, "Event emission failed");
        }
    }

    // ------------------------------------------------------------------
    // Route definition
    // ------------------------------------------------------------------

    /// Add a single top-level route.
    pub fn add_route(&self, def: RouteDefinition) -> Result<(), ConfigError> {
        self.add_routes(vec![def], None)
    }

    /// Add routes under `parent` (or at the top level). Atomic: on any
    /// failure the definition list, the compiled table, and the guard
    /// registries are left exactly as they were.
    pub fn add_routes(
        &self,
        defs: Vec<RouteDefinition>,
        parent: Option<&str>,
    ) -> Result<(), ConfigError> {
        let mut store = self.store.lock().unwrap();
        let backup = store.defs.clone();
        store.add(defs.clone(), parent)?;
        let table = match RouteTable::build(&store) {
            Ok(table) => table,
            Err(e) => {
                store.defs = backup;
                return Err(e);
            }
        };
        let mut registered = Vec::new();
        let prefix = parent.unwrap_or("");
        if let Err(e) = self.register_definition_guards(&defs, prefix, &mut registered) {
            self.lifecycle.remove_routes(&registered);
            store.defs = backup;
            return Err(e);
        }
        self.table.store(Arc::new(table));
        Ok(())
    }

    fn register_definition_guards(
        &self,
        defs: &[RouteDefinition],
        prefix: &str,
        registered: &mut Vec<String>,
    ) -> Result<(), ConfigError> {
        for def in defs {
            let full = if prefix.is_empty() {
                def.name.clone()
            } else {
                format!("{prefix}.{}", def.name)
            };
            if def.forward_to.is_some()
                && (def.can_activate.is_some() || def.can_deactivate.is_some())
            {
                warn!(
                    route = %full,
                    "Route declares both a forward and lifecycle guards; forwarding takes \
                     precedence and the guards will not run"
                );
            }
            if let Some(spec) = &def.can_activate {
                self.lifecycle
                    .add_guard(self, GuardKind::Activate, &full, spec)?;
                registered.push(full.clone());
            }
            if let Some(spec) = &def.can_deactivate {
                self.lifecycle
                    .add_guard(self, GuardKind::Deactivate, &full, spec)?;
                registered.push(full.clone());
            }
            self.register_definition_guards(&def.children, &full, registered)?;
        }
        Ok(())
    }

    /// Remove a route and its descendants. Refused while the route is the
    /// current state or an ancestor of it. Static forwards pointing at
    /// removed routes are purged.
    pub fn remove_route(&self, name: &str) -> Result<(), ConfigError> {
        validate_route_name(name)?;
        if let Some(current) = self.namespace.current() {
            if current.name == name || current.name.starts_with(&format!("{name}.")) {
                return Err(ConfigError::RouteInUse {
                    name: name.to_string(),
                });
            }
        }
        let mut store = self.store.lock().unwrap();
        let backup = store.defs.clone();
        let removed = store
            .remove(name)
            .ok_or_else(|| ConfigError::UnknownRoute {
                name: name.to_string(),
            })?;
        let parent = name.rsplit_once('.').map(|(p, _)| p).unwrap_or("");
        let removed_names = RouteStore::subtree_names(&removed, parent);
        store.purge_forwards_to(&removed_names);
        match RouteTable::build(&store) {
            Ok(table) => {
                self.table.store(Arc::new(table));
                self.lifecycle.remove_routes(&removed_names);
                info!(route = %name, removed_count = removed_names.len(), "Route removed");
                Ok(())
            }
            Err(e) => {
                store.defs = backup;
                Err(e)
            }
        }
    }

    /// Apply a partial update to one route. The updated definition list is
    /// validated (forward cycles included) before anything is committed.
    pub fn update_route(&self, name: &str, patch: RoutePatch) -> Result<(), ConfigError> {
        validate_route_name(name)?;
        let mut store = self.store.lock().unwrap();
        let backup = store.defs.clone();
        store.patch(name, &patch)?;
        match RouteTable::build(&store) {
            Ok(table) => {
                self.table.store(Arc::new(table));
                info!(route = %name, "Route updated");
                Ok(())
            }
            Err(e) => {
                store.defs = backup;
                Err(e)
            }
        }
    }

    /// Drop every route. Refused while a transition is in flight.
    pub fn clear_routes(&self) -> Result<(), ConfigError> {
        if self.active_transition.lock().unwrap().is_some() {
            return Err(ConfigError::TransitionInProgress);
        }
        let mut store = self.store.lock().unwrap();
        let all_names: Vec<String> = self.current_table().tree.route_names();
        store.defs.clear();
        let table = RouteTable::build(&store)?;
        self.table.store(Arc::new(table));
        self.lifecycle.remove_routes(&all_names);
        info!(cleared_count = all_names.len(), "Route table cleared");
        Ok(())
    }

    /// Whether a route with this full name is defined.
    #[must_use]
    pub fn has_route(&self, name: &str) -> bool {
        self.current_table().tree.contains(name)
    }

    /// The definition of a route, if present.
    #[must_use]
    pub fn get_route(&self, name: &str) -> Option<RouteDefinition> {
        let store = self.store.lock().unwrap();
        store.find(name).cloned()
    }

    /// The custom fields attached to a route definition.
    #[must_use]
    pub fn get_route_config(&self, name: &str) -> Option<HashMap<String, Value>> {
        self.current_table().custom.get(name).cloned()
    }

    /// Set the path prefix applied to all matching and building.
    pub fn set_root_path(&self, root_path: &str) -> Result<(), ConfigError> {
        if !root_path.is_empty() && !root_path.starts_with('/') {
            return Err(ConfigError::InvalidPath {
                path: root_path.to_string(),
                reason: "root path must be empty or start with '/'".to_string(),
            });
        }
        let mut store = self.store.lock().unwrap();
        let previous = std::mem::replace(&mut store.root_path, root_path.to_string());
        match RouteTable::build(&store) {
            Ok(table) => {
                self.table.store(Arc::new(table));
                Ok(())
            }
            Err(e) => {
                store.root_path = previous;
                Err(e)
            }
        }
    }

    /// The configured root path.
    #[must_use]
    pub fn get_root_path(&self) -> String {
        self.store.lock().unwrap().root_path.clone()
    }

    // ------------------------------------------------------------------
    // Path operations
    // ------------------------------------------------------------------

    /// Resolve a path to a state: tree match, default params, decoder,
    /// optional canonical-path rewrite, forward resolution.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<State> {
        let table = self.current_table();
        let opts = self.options();
        let outcome = table.matcher.match_path(path, &opts)?;
        Some(self.state_from_match(&table, &opts, outcome, NavigationOptions::default(), false))
    }

    /// Build the path for a route from params, applying the route's
    /// encoder first.
    pub fn build_path(&self, name: &str, params: &Params) -> Result<String, ConfigError> {
        validate_route_name(name)?;
        if name == UNKNOWN_ROUTE {
            return Ok(params
                .get("path")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string());
        }
        let table = self.current_table();
        let opts = self.options();
        self.build_path_with(&table, &opts, name, params)
    }

    fn build_path_with(
        &self,
        table: &RouteTable,
        opts: &Options,
        name: &str,
        params: &Params,
    ) -> Result<String, ConfigError> {
        let encoded;
        let params = match table.encoders.get(name) {
            Some(encoder) => match encoder(params) {
                Some(p) => {
                    encoded = p;
                    &encoded
                }
                None => params,
            },
            None => params,
        };
        table.matcher.build_path(name, params, opts)
    }

    fn state_from_match(
        &self,
        table: &RouteTable,
        opts: &Options,
        outcome: MatchOutcome,
        nav: NavigationOptions,
        redirected: bool,
    ) -> State {
        let MatchOutcome {
            name: matched,
            params: extracted,
            path,
            param_origins,
        } = outcome;

        let defaults = defaults_for(table, opts, &matched);
        let mut params = merge(&[&defaults, &extracted]);

        if let Some(decoder) = table.decoders.get(&matched) {
            if let Some(decoded) = decoder(&params) {
                params = decoded;
            }
        }

        let mut final_path = path;
        if opts.rewrite_path_on_match {
            if let Ok(rebuilt) = self.build_path_with(table, opts, &matched, &params) {
                final_path = rebuilt;
            }
        }

        let mut final_name = matched.clone();
        if let Some(target) = table.resolved_forwards.get(&matched) {
            final_name = target.clone();
        } else if let Some(forward) = table.dynamic_forwards.get(&matched) {
            let target = forward(&params);
            if table.tree.contains(&target) {
                final_name = target;
            } else {
                warn!(
                    source = %matched,
                    target = %target,
                    "Dynamic forward returned an unknown route, keeping the matched route"
                );
            }
        }

        State {
            name: final_name,
            params,
            path: final_path,
            meta: Some(StateMeta {
                id: self.namespace.next_id(),
                params: param_origins,
                options: nav,
                redirected,
            }),
        }
    }

    // ------------------------------------------------------------------
    // State operations
    // ------------------------------------------------------------------

    /// The current state, if the router holds one.
    #[must_use]
    pub fn get_state(&self) -> Option<Arc<State>> {
        self.namespace.current()
    }

    /// The state before the current one.
    #[must_use]
    pub fn get_previous_state(&self) -> Option<Arc<State>> {
        self.namespace.previous()
    }

    /// Install a state without running a transition (external history
    /// sync). `previous` is left untouched.
    pub fn set_state(&self, state: State) {
        self.namespace.set(Some(Arc::new(state)));
    }

    /// A state with a fresh id and synthetic metadata. No forwarding, no
    /// defaults, no path building.
    #[must_use]
    pub fn make_state(&self, name: &str, params: Params, path: &str) -> State {
        let origins = synthetic_param_origins(name, &params);
        State {
            name: name.to_string(),
            params,
            path: path.to_string(),
            meta: Some(StateMeta {
                id: self.namespace.next_id(),
                params: origins,
                options: NavigationOptions::default(),
                redirected: false,
            }),
        }
    }

    /// The reserved not-found state for a path.
    #[must_use]
    pub fn make_not_found_state(&self, path: &str) -> State {
        self.make_not_found_state_with(path, &NavigationOptions::default())
    }

    pub(crate) fn make_not_found_state_with(&self, path: &str, nav: &NavigationOptions) -> State {
        let mut params = Params::new();
        params.insert("path".to_string(), Value::String(path.to_string()));
        State {
            name: UNKNOWN_ROUTE.to_string(),
            params,
            path: path.to_string(),
            meta: Some(StateMeta {
                id: self.namespace.next_id(),
                params: SegmentParamMap::new(),
                options: nav.clone(),
                redirected: false,
            }),
        }
    }

    /// Resolve forwarding and defaults for a route, then build its
    /// canonical path and metadata.
    pub fn build_state(&self, name: &str, params: &Params) -> Result<State, ConfigError> {
        self.build_state_arc(name, params, &NavigationOptions::default(), false)
            .map(|state| (*state).clone())
    }

    pub(crate) fn build_state_arc(
        &self,
        name: &str,
        params: &Params,
        nav: &NavigationOptions,
        redirected: bool,
    ) -> Result<Arc<State>, ConfigError> {
        validate_route_name(name)?;
        if name == UNKNOWN_ROUTE {
            let path = params
                .get("path")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            return Ok(Arc::new(self.make_not_found_state_with(&path, nav)));
        }
        let table = self.current_table();
        let opts = self.options();
        let forwarded = self.forward_state_with(&table, &opts, name, params)?;
        let path = self.build_path_with(&table, &opts, &forwarded.name, &forwarded.params)?;
        let origins = origins_for(&table, &forwarded.name);
        Ok(Arc::new(State {
            name: forwarded.name,
            params: forwarded.params,
            path,
            meta: Some(StateMeta {
                id: self.namespace.next_id(),
                params: origins,
                options: nav.clone(),
                redirected,
            }),
        }))
    }

    /// Resolve a route's forward chain and merge default params across
    /// source, target, and the provided params.
    pub fn forward_state(
        &self,
        name: &str,
        params: &Params,
    ) -> Result<ForwardedState, ConfigError> {
        validate_route_name(name)?;
        let table = self.current_table();
        let opts = self.options();
        self.forward_state_with(&table, &opts, name, params)
    }

    fn forward_state_with(
        &self,
        table: &RouteTable,
        opts: &Options,
        name: &str,
        params: &Params,
    ) -> Result<ForwardedState, ConfigError> {
        if !table.tree.contains(name) {
            return Err(ConfigError::UnknownRoute {
                name: name.to_string(),
            });
        }
        let target = if let Some(target) = table.resolved_forwards.get(name) {
            target.clone()
        } else if let Some(forward) = table.dynamic_forwards.get(name) {
            let target = forward(params);
            if !table.tree.contains(&target) {
                return Err(ConfigError::UnknownRoute { name: target });
            }
            target
        } else {
            name.to_string()
        };

        let source_defaults = defaults_for(table, opts, name);
        let merged = if target == name {
            merge(&[&source_defaults, params])
        } else {
            let target_defaults = defaults_for(table, opts, &target);
            merge(&[&source_defaults, &target_defaults, params])
        };
        Ok(ForwardedState {
            name: target,
            params: merged,
        })
    }

    /// State equality; see [`are_states_equal`].
    #[must_use]
    pub fn are_states_equal(&self, a: &State, b: &State, ignore_query: bool) -> bool {
        are_states_equal(a, b, ignore_query)
    }

    /// Whether a route is active.
    ///
    /// With the exact current name, full state equality applies (query
    /// params ignored when `ignore_query`). In non-strict mode an ancestor
    /// name counts as active when every provided param matches the current
    /// state's.
    #[must_use]
    pub fn is_active_route(
        &self,
        name: &str,
        params: &Params,
        strict: bool,
        ignore_query: bool,
    ) -> bool {
        let Some(current) = self.namespace.current() else {
            return false;
        };
        if current.name == name {
            match self.build_state_arc(name, params, &NavigationOptions::default(), false) {
                Ok(candidate) => are_states_equal(&candidate, &current, ignore_query),
                Err(_) => false,
            }
        } else if !strict {
            current.name.starts_with(&format!("{name}."))
                && params_subset(params, &current.params)
        } else {
            false
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Register a listener. Pass the same `Arc` twice to trigger the
    /// duplicate-listener protection.
    pub fn add_event_listener(
        &self,
        channel: &str,
        listener: Arc<ListenerFn>,
    ) -> Result<Subscription, ConfigError> {
        self.bus.subscribe(channel, listener)
    }

    /// Register a closure as a listener.
    pub fn on(
        &self,
        channel: &str,
        listener: impl Fn(&EventPayload) + Send + Sync + 'static,
    ) -> Result<Subscription, ConfigError> {
        self.add_event_listener(channel, Arc::new(listener))
    }

    /// Dispatch a payload on a channel, user channels included.
    pub fn invoke_event_listeners(
        &self,
        channel: &str,
        payload: &EventPayload,
    ) -> Result<(), ConfigError> {
        self.bus.emit(channel, payload)
    }

    // ------------------------------------------------------------------
    // Plugins
    // ------------------------------------------------------------------

    /// Install a batch of plugin factories. See the `plugins` module for
    /// the rollback contract.
    pub fn use_plugin(
        &self,
        factories: Vec<crate::plugins::PluginFactory>,
    ) -> Result<crate::plugins::PluginHandle, ConfigError> {
        crate::plugins::install_plugins(self, &self.plugins, &self.bus, factories)
    }

    // ------------------------------------------------------------------
    // Lifecycle handlers
    // ------------------------------------------------------------------

    /// Register (or overwrite) the activation guard of a route.
    pub fn add_activate_guard(&self, route: &str, spec: GuardSpec) -> Result<(), ConfigError> {
        validate_route_name(route)?;
        self.lifecycle
            .add_guard(self, GuardKind::Activate, route, &spec)
    }

    /// Register (or overwrite) the deactivation guard of a route.
    pub fn add_deactivate_guard(&self, route: &str, spec: GuardSpec) -> Result<(), ConfigError> {
        validate_route_name(route)?;
        self.lifecycle
            .add_guard(self, GuardKind::Deactivate, route, &spec)
    }

    /// Drop every activation guard.
    pub fn clear_activate_guards(&self) {
        self.lifecycle.clear_activate();
    }

    /// Drop every deactivation guard.
    pub fn clear_deactivate_guards(&self) {
        self.lifecycle.clear_deactivate();
    }

    /// Synchronous activation probe: missing guard allows, rejection or
    /// panic denies, redirect counts as permissive.
    #[must_use]
    pub fn check_activate_guard(&self, route: &str, to: &State, from: Option<&State>) -> bool {
        self.lifecycle.check_activate_sync(route, to, from)
    }

    /// Append a middleware through its factory.
    pub fn use_middleware(
        &self,
        factory: impl FnOnce(&Router) -> GuardFn,
    ) -> Result<(), ConfigError> {
        self.lifecycle.add_middleware(self, factory)
    }

    /// Append a middleware from a plain closure.
    pub fn use_middleware_fn(
        &self,
        f: impl Fn(&State, Option<&State>) -> GuardResult + Send + Sync + 'static,
    ) -> Result<(), ConfigError> {
        let middleware: GuardFn = Arc::new(f);
        self.use_middleware(move |_| middleware)
    }

    /// Drop every middleware.
    pub fn clear_middleware(&self) {
        self.lifecycle.clear_middleware();
    }

    // ------------------------------------------------------------------
    // Dependencies
    // ------------------------------------------------------------------

    /// The dependency store.
    #[must_use]
    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    /// Insert or overwrite one dependency.
    pub fn set_dependency(
        &self,
        name: impl Into<String>,
        value: Dependency,
    ) -> Result<(), ConfigError> {
        self.dependencies.set(name, value)
    }

    /// Insert a batch of dependencies.
    pub fn set_dependencies(
        &self,
        entries: impl IntoIterator<Item = (String, Dependency)>,
    ) -> Result<(), ConfigError> {
        self.dependencies.set_many(entries)
    }

    /// Fetch a dependency by name.
    #[must_use]
    pub fn get_dependency(&self, name: &str) -> Option<Dependency> {
        self.dependencies.get(name)
    }

    /// Names of all registered dependencies.
    #[must_use]
    pub fn get_dependencies(&self) -> Vec<String> {
        self.dependencies.names()
    }

    /// Whether a dependency exists.
    #[must_use]
    pub fn has_dependency(&self, name: &str) -> bool {
        self.dependencies.has(name)
    }

    /// Remove one dependency.
    pub fn remove_dependency(&self, name: &str) -> bool {
        self.dependencies.remove(name)
    }

    /// Drop every dependency.
    pub fn reset_dependencies(&self) {
        self.dependencies.reset();
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Navigate to a route by name. Blocks until the transition reaches a
    /// terminal outcome.
    pub fn navigate(
        &self,
        name: &str,
        params: Params,
        opts: NavigationOptions,
    ) -> Result<Arc<State>, NavigationError> {
        if !self.is_started() {
            return Err(NavigationError::new(ErrorCode::RouterNotStarted));
        }
        let from = self.namespace.current();
        let to = match self.build_state_arc(name, &params, &opts, false) {
            Ok(to) => to,
            Err(e) => {
                let err = NavigationError::with_message(ErrorCode::RouteNotFound, e.to_string())
                    .context(Some(name), from.as_deref().map(|s| s.name.as_str()));
                self.emit(
                    channels::TRANSITION_ERROR,
                    EventPayload::transition(None, from).with_error(err.clone()),
                );
                return Err(err);
            }
        };
        self.navigate_to_state(to, from, opts)
    }

    /// Navigate to whatever the path resolves to.
    pub fn navigate_to_path(
        &self,
        path: &str,
        opts: NavigationOptions,
    ) -> Result<Arc<State>, NavigationError> {
        if !self.is_started() {
            return Err(NavigationError::new(ErrorCode::RouterNotStarted));
        }
        let from = self.namespace.current();
        let to = match self.resolve_path_state(path, &opts) {
            Some(state) => state,
            None => {
                if self.options.read().unwrap().allow_not_found {
                    Arc::new(self.make_not_found_state_with(path, &opts))
                } else {
                    let err = NavigationError::with_message(
                        ErrorCode::RouteNotFound,
                        format!("no route matches '{path}'"),
                    )
                    .context(None, from.as_deref().map(|s| s.name.as_str()));
                    self.emit(
                        channels::TRANSITION_ERROR,
                        EventPayload::transition(None, from).with_error(err.clone()),
                    );
                    return Err(err);
                }
            }
        };
        self.navigate_to_state(to, from, opts)
    }

    pub(crate) fn resolve_path_state(
        &self,
        path: &str,
        nav: &NavigationOptions,
    ) -> Option<Arc<State>> {
        let table = self.current_table();
        let opts = self.options();
        let outcome = table.matcher.match_path(path, &opts)?;
        Some(Arc::new(self.state_from_match(
            &table,
            &opts,
            outcome,
            nav.clone(),
            false,
        )))
    }

    pub(crate) fn navigate_to_state(
        &self,
        to: Arc<State>,
        from: Option<Arc<State>>,
        opts: NavigationOptions,
    ) -> Result<Arc<State>, NavigationError> {
        if !opts.reload && !opts.force {
            if let Some(from_state) = &from {
                // Same-state comparison uses the default equality: query
                // params ignored, URL params decide.
                if are_states_equal(from_state, &to, true) {
                    debug!(route = %to.name, "Navigation target equals the current state");
                    return Err(NavigationError::new(ErrorCode::SameStates)
                        .context(Some(to.name.as_str()), Some(from_state.name.as_str())));
                }
            }
        }
        self.run_transition(to, from, opts)
    }

    pub(crate) fn run_transition(
        &self,
        to: Arc<State>,
        from: Option<Arc<State>>,
        opts: NavigationOptions,
    ) -> Result<Arc<State>, NavigationError> {
        let token = TransitionToken::new(Arc::clone(&to), from.clone());

        let cancelled_payload = {
            let mut active = self.active_transition.lock().unwrap();
            let cancelled = active.take().and_then(|prev| {
                prev.cancel().then(|| {
                    EventPayload::transition(Some(Arc::clone(&prev.to)), prev.from.clone())
                })
            });
            *active = Some(Arc::clone(&token));
            cancelled
        };
        if let Some(payload) = cancelled_payload {
            info!(
                to = payload.to.as_ref().map_or("", |s| s.name.as_str()),
                "In-flight transition cancelled by a newer navigation"
            );
            self.emit(channels::TRANSITION_CANCEL, payload);
        }

        if !opts.skip_transition {
            self.emit(
                channels::TRANSITION_START,
                EventPayload::transition(Some(Arc::clone(&to)), from.clone()),
            );
        }

        let result = if opts.skip_transition {
            self.commit_transition(&token, Arc::clone(&to), &opts)
        } else {
            transition::run(self, &token, &opts)
        };

        match result {
            Ok(state) => Ok(state),
            Err(err) if err.code == ErrorCode::TransitionCancelled => Err(err),
            Err(err) => {
                self.release_transition(&token);
                self.emit(
                    channels::TRANSITION_ERROR,
                    EventPayload::transition(Some(to), from).with_error(err.clone()),
                );
                Err(err)
            }
        }
    }

    /// Rebuild the target for a guard redirect.
    pub(crate) fn build_redirect_state(
        &self,
        target: &RedirectTarget,
        nav: &NavigationOptions,
    ) -> Result<Arc<State>, NavigationError> {
        self.build_state_arc(&target.name, &target.params, nav, true)
            .map_err(|e| {
                NavigationError::with_message(ErrorCode::RouteNotFound, e.to_string())
                    .context(Some(target.name.as_str()), None)
            })
    }

    /// Commit a finished transition: push the state pair, release the
    /// token, emit `TRANSITION_SUCCESS`. The token is re-checked under the
    /// transition lock so a cancelled pipeline can never commit.
    pub(crate) fn commit_transition(
        &self,
        token: &Arc<TransitionToken>,
        to: Arc<State>,
        opts: &NavigationOptions,
    ) -> Result<Arc<State>, NavigationError> {
        {
            let mut active = self.active_transition.lock().unwrap();
            if token.is_cancelled() {
                return Err(NavigationError::new(ErrorCode::TransitionCancelled).context(
                    Some(to.name.as_str()),
                    token.from.as_deref().map(|s| s.name.as_str()),
                ));
            }
            self.namespace.commit(Arc::clone(&to));
            if let Some(current) = active.as_ref() {
                if Arc::ptr_eq(current, token) {
                    *active = None;
                }
            }
        }
        info!(
            transition_id = %token.id,
            to = %to.name,
            state_id = to.meta.as_ref().map_or(0, |m| m.id),
            "Transition committed"
        );
        self.emit(
            channels::TRANSITION_SUCCESS,
            EventPayload::transition(Some(Arc::clone(&to)), token.from.clone())
                .with_options(opts.clone()),
        );
        Ok(to)
    }

    pub(crate) fn release_transition(&self, token: &Arc<TransitionToken>) {
        let mut active = self.active_transition.lock().unwrap();
        if let Some(current) = active.as_ref() {
            if Arc::ptr_eq(current, token) {
                *active = None;
            }
        }
    }
}

fn defaults_for(table: &RouteTable, opts: &Options, name: &str) -> Params {
    let mut layers: Vec<&Params> = Vec::new();
    if let Some(option_defaults) = opts.default_params.get(name) {
        layers.push(option_defaults);
    }
    if let Some(route_defaults) = table.default_params.get(name) {
        layers.push(route_defaults);
    }
    merge(&layers)
}

fn origins_for(table: &RouteTable, name: &str) -> SegmentParamMap {
    let mut map = SegmentParamMap::new();
    if let Some(chain) = table.tree.chain(name) {
        for node in chain {
            let mut kinds = HashMap::new();
            for param in node.spec.url_param_names() {
                kinds.insert(param.to_string(), ParamKind::Url);
            }
            for query in &node.spec.query_params {
                kinds.insert(query.clone(), ParamKind::Query);
            }
            map.insert(node.full_name.clone(), kinds);
        }
    }
    map
}
