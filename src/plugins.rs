//! Plugin registration: factories, event binding, rollback, teardown.
//!
//! A plugin is a closed record of optional event handlers plus an optional
//! teardown. Factories are invoked sequentially; if any factory fails, every
//! plugin already initialised in the same call is unwound (listeners
//! removed, teardown invoked) before the error is returned, so a partially
//! applied batch can never be observed.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::{error, info, warn};

use crate::errors::ConfigError;
use crate::events::{channels, EventBus, ListenerFn, Subscription};
use crate::options::Limits;
use crate::router::Router;

/// Teardown hook invoked when a plugin batch is unsubscribed or rolled
/// back.
pub type TeardownFn = Arc<dyn Fn() + Send + Sync>;

/// A plugin: optional handlers for the six well-known channels plus an
/// optional teardown. The struct is closed; there is nowhere to put an
/// unknown handler.
#[derive(Default, Clone)]
pub struct Plugin {
    /// Handler for `ROUTER_START`
    pub on_start: Option<Arc<ListenerFn>>,
    /// Handler for `ROUTER_STOP`
    pub on_stop: Option<Arc<ListenerFn>>,
    /// Handler for `TRANSITION_START`
    pub on_transition_start: Option<Arc<ListenerFn>>,
    /// Handler for `TRANSITION_SUCCESS`
    pub on_transition_success: Option<Arc<ListenerFn>>,
    /// Handler for `TRANSITION_ERROR`
    pub on_transition_error: Option<Arc<ListenerFn>>,
    /// Handler for `TRANSITION_CANCEL`
    pub on_transition_cancel: Option<Arc<ListenerFn>>,
    /// Invoked once when the plugin is removed
    pub teardown: Option<TeardownFn>,
}

impl Plugin {
    /// A plugin with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Plugin::default()
    }

    /// Set the `ROUTER_START` handler.
    #[must_use]
    pub fn on_start(mut self, f: impl Fn(&crate::events::EventPayload) + Send + Sync + 'static) -> Self {
        self.on_start = Some(Arc::new(f));
        self
    }

    /// Set the `ROUTER_STOP` handler.
    #[must_use]
    pub fn on_stop(mut self, f: impl Fn(&crate::events::EventPayload) + Send + Sync + 'static) -> Self {
        self.on_stop = Some(Arc::new(f));
        self
    }

    /// Set the `TRANSITION_START` handler.
    #[must_use]
    pub fn on_transition_start(
        mut self,
        f: impl Fn(&crate::events::EventPayload) + Send + Sync + 'static,
    ) -> Self {
        self.on_transition_start = Some(Arc::new(f));
        self
    }

    /// Set the `TRANSITION_SUCCESS` handler.
    #[must_use]
    pub fn on_transition_success(
        mut self,
        f: impl Fn(&crate::events::EventPayload) + Send + Sync + 'static,
    ) -> Self {
        self.on_transition_success = Some(Arc::new(f));
        self
    }

    /// Set the `TRANSITION_ERROR` handler.
    #[must_use]
    pub fn on_transition_error(
        mut self,
        f: impl Fn(&crate::events::EventPayload) + Send + Sync + 'static,
    ) -> Self {
        self.on_transition_error = Some(Arc::new(f));
        self
    }

    /// Set the `TRANSITION_CANCEL` handler.
    #[must_use]
    pub fn on_transition_cancel(
        mut self,
        f: impl Fn(&crate::events::EventPayload) + Send + Sync + 'static,
    ) -> Self {
        self.on_transition_cancel = Some(Arc::new(f));
        self
    }

    /// Set the teardown hook.
    #[must_use]
    pub fn with_teardown(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.teardown = Some(Arc::new(f));
        self
    }

    fn handlers(&self) -> Vec<(&'static str, Arc<ListenerFn>)> {
        let mut out = Vec::new();
        if let Some(h) = &self.on_start {
            out.push((channels::ROUTER_START, Arc::clone(h)));
        }
        if let Some(h) = &self.on_stop {
            out.push((channels::ROUTER_STOP, Arc::clone(h)));
        }
        if let Some(h) = &self.on_transition_start {
            out.push((channels::TRANSITION_START, Arc::clone(h)));
        }
        if let Some(h) = &self.on_transition_success {
            out.push((channels::TRANSITION_SUCCESS, Arc::clone(h)));
        }
        if let Some(h) = &self.on_transition_error {
            out.push((channels::TRANSITION_ERROR, Arc::clone(h)));
        }
        if let Some(h) = &self.on_transition_cancel {
            out.push((channels::TRANSITION_CANCEL, Arc::clone(h)));
        }
        out
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("handler_count", &self.handlers().len())
            .field("has_teardown", &self.teardown.is_some())
            .finish()
    }
}

/// Plugin factory: invoked once per `use_plugin` call, synchronously.
pub type PluginFactory = Arc<dyn Fn(&Router) -> Result<Plugin, ConfigError> + Send + Sync>;

/// Committed plugin factories.
pub(crate) struct PluginRegistry {
    factories: Mutex<Vec<PluginFactory>>,
    max_plugins: usize,
}

impl PluginRegistry {
    pub(crate) fn new(limits: &Limits) -> Self {
        PluginRegistry {
            factories: Mutex::new(Vec::new()),
            max_plugins: limits.max_plugins,
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.factories.lock().unwrap().len()
    }

    fn commit(&self, batch: &[PluginFactory]) {
        let mut factories = self.factories.lock().unwrap();
        factories.extend(batch.iter().map(Arc::clone));
    }

    fn withdraw(&self, batch: &[PluginFactory]) {
        let mut factories = self.factories.lock().unwrap();
        factories.retain(|f| !batch.iter().any(|b| Arc::ptr_eq(f, b)));
    }
}

struct InitialisedPlugin {
    subscriptions: Vec<Subscription>,
    teardown: Option<TeardownFn>,
}

impl InitialisedPlugin {
    fn unwind(self) {
        for sub in &self.subscriptions {
            sub.unsubscribe();
        }
        if let Some(teardown) = self.teardown {
            if catch_unwind(AssertUnwindSafe(|| teardown())).is_err() {
                error!("Plugin teardown panicked");
            }
        }
    }
}

/// Handle over one `use_plugin` batch: removes every listener the batch
/// registered and runs the plugins' teardowns. Idempotent.
pub struct PluginHandle {
    plugins: Mutex<Vec<InitialisedPlugin>>,
    batch: Vec<PluginFactory>,
    registry: Weak<PluginRegistry>,
    done: AtomicBool,
}

impl PluginHandle {
    /// Remove the batch. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        let plugins: Vec<InitialisedPlugin> = self.plugins.lock().unwrap().drain(..).collect();
        for plugin in plugins {
            plugin.unwind();
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.withdraw(&self.batch);
        }
        info!(plugin_count = self.batch.len(), "Plugin batch removed");
    }
}

/// Initialise a batch of plugin factories against the router.
pub(crate) fn install_plugins(
    router: &Router,
    registry: &Arc<PluginRegistry>,
    bus: &Arc<EventBus>,
    factories: Vec<PluginFactory>,
) -> Result<PluginHandle, ConfigError> {
    // Deduplicate within the batch
    let mut batch: Vec<PluginFactory> = Vec::new();
    for factory in factories {
        if batch.iter().any(|f| Arc::ptr_eq(f, &factory)) {
            warn!("Duplicate plugin factory in batch ignored");
            continue;
        }
        batch.push(factory);
    }

    let mut initialised: Vec<InitialisedPlugin> = Vec::new();
    let mut failure: Option<ConfigError> = None;

    for factory in &batch {
        if let Err(e) = Limits::admit(
            registry.count() + initialised.len(),
            registry.max_plugins,
            "plugin",
        ) {
            failure = Some(e);
            break;
        }
        let plugin = match factory(router) {
            Ok(plugin) => plugin,
            Err(e) => {
                failure = Some(e);
                break;
            }
        };
        let mut subscriptions = Vec::new();
        let mut subscribe_error = None;
        for (channel, handler) in plugin.handlers() {
            match bus.subscribe(channel, handler) {
                Ok(sub) => subscriptions.push(sub),
                Err(e) => {
                    subscribe_error = Some(e);
                    break;
                }
            }
        }
        if let Some(e) = subscribe_error {
            for sub in &subscriptions {
                sub.unsubscribe();
            }
            failure = Some(e);
            break;
        }
        initialised.push(InitialisedPlugin {
            subscriptions,
            teardown: plugin.teardown.clone(),
        });
    }

    if let Some(e) = failure {
        error!(
            error = %e,
            initialised = initialised.len(),
            "Plugin batch failed, rolling back"
        );
        for plugin in initialised.into_iter().rev() {
            plugin.unwind();
        }
        return Err(e);
    }

    registry.commit(&batch);
    info!(plugin_count = batch.len(), "Plugin batch installed");
    Ok(PluginHandle {
        plugins: Mutex::new(initialised),
        batch,
        registry: Arc::downgrade(registry),
        done: AtomicBool::new(false),
    })
}
