//! Per-route guards and router-wide middleware.
//!
//! Guards are registered as either a constant or a factory. Factories run
//! exactly once, at registration, receiving the router so they can capture
//! dependencies; the compiled guard function is what the transition
//! pipeline invokes. Middleware shares the guard calling convention and
//! runs between deactivation and activation for every transition.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use tracing::{error, warn};

use crate::errors::ConfigError;
use crate::options::Limits;
use crate::params::Params;
use crate::router::Router;
use crate::state::State;

/// A guard's positive verdicts.
#[derive(Clone)]
pub enum GuardOutcome {
    /// Let the transition continue
    Allow,
    /// Veto the transition
    Deny,
    /// Abandon the current target and navigate to this one instead
    Redirect(RedirectTarget),
}

impl fmt::Debug for GuardOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardOutcome::Allow => f.write_str("Allow"),
            GuardOutcome::Deny => f.write_str("Deny"),
            GuardOutcome::Redirect(t) => write!(f, "Redirect({})", t.name),
        }
    }
}

/// Where a redirecting guard sends the transition.
#[derive(Debug, Clone)]
pub struct RedirectTarget {
    /// Route name to navigate to
    pub name: String,
    /// Params for the redirect target
    pub params: Params,
}

impl RedirectTarget {
    /// Redirect to a route with no params.
    #[must_use]
    pub fn to(name: impl Into<String>) -> Self {
        RedirectTarget {
            name: name.into(),
            params: Params::new(),
        }
    }

    /// Redirect to a route with params.
    #[must_use]
    pub fn with_params(name: impl Into<String>, params: Params) -> Self {
        RedirectTarget {
            name: name.into(),
            params,
        }
    }
}

/// A guard's failure verdict; the message is preserved as the emitted
/// error's detail.
#[derive(Debug, Clone, Default)]
pub struct GuardRejection {
    /// Why the guard rejected
    pub message: Option<String>,
}

impl GuardRejection {
    /// A rejection with a reason.
    #[must_use]
    pub fn because(message: impl Into<String>) -> Self {
        GuardRejection {
            message: Some(message.into()),
        }
    }
}

/// What a guard or middleware invocation produces.
pub type GuardResult = Result<GuardOutcome, GuardRejection>;

/// A compiled guard or middleware function. Receives the target state and
/// the state the transition leaves from. May block.
pub type GuardFn = Arc<dyn Fn(&State, Option<&State>) -> GuardResult + Send + Sync>;

/// Factory producing a guard function, invoked once at registration.
pub type GuardFactory = Arc<dyn Fn(&Router) -> GuardFn + Send + Sync>;

/// Registration-time form of a guard: a constant verdict or a factory.
#[derive(Clone)]
pub enum GuardSpec {
    /// `true` always allows, `false` always denies
    Constant(bool),
    /// Compiled once with access to the router
    Factory(GuardFactory),
}

impl GuardSpec {
    /// A guard factory from a plain closure.
    pub fn factory(f: impl Fn(&Router) -> GuardFn + Send + Sync + 'static) -> Self {
        GuardSpec::Factory(Arc::new(f))
    }

    /// Shorthand for a factory that ignores the router.
    pub fn from_fn(
        f: impl Fn(&State, Option<&State>) -> GuardResult + Send + Sync + 'static,
    ) -> Self {
        let guard: GuardFn = Arc::new(f);
        GuardSpec::Factory(Arc::new(move |_| Arc::clone(&guard)))
    }

    fn compile(&self, router: &Router) -> GuardFn {
        match self {
            GuardSpec::Constant(allow) => {
                let allow = *allow;
                let guard: GuardFn = Arc::new(move |_to: &State, _from: Option<&State>| {
                    if allow {
                        Ok(GuardOutcome::Allow)
                    } else {
                        Ok(GuardOutcome::Deny)
                    }
                });
                guard
            }
            GuardSpec::Factory(factory) => factory(router),
        }
    }
}

impl fmt::Debug for GuardSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardSpec::Constant(allow) => write!(f, "GuardSpec::Constant({allow})"),
            GuardSpec::Factory(_) => f.write_str("GuardSpec::Factory(..)"),
        }
    }
}

/// Invoke a guard, converting panics into rejections so one misbehaving
/// guard cannot take the pipeline down with it.
pub(crate) fn invoke_guard(guard: &GuardFn, to: &State, from: Option<&State>) -> GuardResult {
    match catch_unwind(AssertUnwindSafe(|| guard(to, from))) {
        Ok(result) => result,
        Err(panic) => {
            let message = format!("{panic:?}");
            error!(panic_message = %message, "Guard panicked");
            Err(GuardRejection::because("guard panicked"))
        }
    }
}

/// Which registry a guard belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GuardKind {
    Activate,
    Deactivate,
}

/// Compiled guards keyed by route name, plus the middleware chain.
pub(crate) struct LifecycleRegistry {
    can_activate: RwLock<HashMap<String, GuardFn>>,
    can_deactivate: RwLock<HashMap<String, GuardFn>>,
    middleware: RwLock<Vec<GuardFn>>,
    max_handlers: usize,
    max_middleware: usize,
}

impl LifecycleRegistry {
    pub(crate) fn new(limits: &Limits) -> Self {
        LifecycleRegistry {
            can_activate: RwLock::new(HashMap::new()),
            can_deactivate: RwLock::new(HashMap::new()),
            middleware: RwLock::new(Vec::new()),
            max_handlers: limits.max_lifecycle_handlers,
            max_middleware: limits.max_middleware,
        }
    }

    pub(crate) fn add_guard(
        &self,
        router: &Router,
        kind: GuardKind,
        route: &str,
        spec: &GuardSpec,
    ) -> Result<(), ConfigError> {
        let compiled = spec.compile(router);
        let map = match kind {
            GuardKind::Activate => &self.can_activate,
            GuardKind::Deactivate => &self.can_deactivate,
        };
        let existing = map.read().unwrap().contains_key(route);
        if existing {
            warn!(
                route = %route,
                kind = ?kind,
                "Overwriting a previously registered guard"
            );
        } else {
            let total = self.handler_count();
            Limits::admit(total, self.max_handlers, "lifecycle handler")?;
        }
        map.write().unwrap().insert(route.to_string(), compiled);
        Ok(())
    }

    fn handler_count(&self) -> usize {
        let a = self.can_activate.read().unwrap().len();
        let d = self.can_deactivate.read().unwrap().len();
        a + d
    }

    pub(crate) fn guard(&self, kind: GuardKind, route: &str) -> Option<GuardFn> {
        let map = match kind {
            GuardKind::Activate => &self.can_activate,
            GuardKind::Deactivate => &self.can_deactivate,
        };
        let guards = map.read().unwrap();
        guards.get(route).map(Arc::clone)
    }

    /// Drop guards for routes that no longer exist.
    pub(crate) fn remove_routes(&self, routes: &[String]) {
        let mut activate = self.can_activate.write().unwrap();
        let mut deactivate = self.can_deactivate.write().unwrap();
        for route in routes {
            activate.remove(route);
            deactivate.remove(route);
        }
    }

    pub(crate) fn clear_activate(&self) {
        self.can_activate.write().unwrap().clear();
    }

    pub(crate) fn clear_deactivate(&self) {
        self.can_deactivate.write().unwrap().clear();
    }

    /// Synchronous activation probe: a missing guard allows, a redirect is
    /// treated as permissive, a rejection or panic denies.
    pub(crate) fn check_activate_sync(&self, route: &str, to: &State, from: Option<&State>) -> bool {
        let Some(guard) = self.guard(GuardKind::Activate, route) else {
            return true;
        };
        match invoke_guard(&guard, to, from) {
            Ok(GuardOutcome::Allow | GuardOutcome::Redirect(_)) => true,
            Ok(GuardOutcome::Deny) | Err(_) => false,
        }
    }

    pub(crate) fn add_middleware(
        &self,
        router: &Router,
        factory: impl FnOnce(&Router) -> GuardFn,
    ) -> Result<(), ConfigError> {
        let count = self.middleware.read().unwrap().len();
        Limits::admit(count, self.max_middleware, "middleware")?;
        let compiled = factory(router);
        self.middleware.write().unwrap().push(compiled);
        Ok(())
    }

    pub(crate) fn middleware_snapshot(&self) -> Vec<GuardFn> {
        let middleware = self.middleware.read().unwrap();
        middleware.iter().map(Arc::clone).collect()
    }

    pub(crate) fn clear_middleware(&self) {
        self.middleware.write().unwrap().clear();
    }
}
