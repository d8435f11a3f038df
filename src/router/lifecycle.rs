//! Router lifecycle: two-phase start, stop, and explicit cancellation.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

use crate::errors::{ErrorCode, NavigationError};
use crate::events::{channels, EventPayload};
use crate::options::NavigationOptions;
use crate::params::Params;
use crate::state::State;

use super::Router;

impl Router {
    /// Whether `start` has been called and `stop` has not.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Whether the initial navigation has completed.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Start the router at a path.
    ///
    /// Phase A flips the active flag so concurrent starts fail with
    /// `ROUTER_ALREADY_STARTED`; phase B runs the initial navigation
    /// (`replace: true`) through the regular pipeline. Only on success does
    /// the router count as started and `ROUTER_START` fire. An empty path
    /// falls back to the configured default route.
    pub fn start(&self, path: &str) -> Result<Arc<State>, NavigationError> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(NavigationError::new(ErrorCode::RouterAlreadyStarted));
        }
        let nav = NavigationOptions::replacing();
        let target = match self.resolve_start_target(path, &nav) {
            Ok(target) => target,
            Err(e) => {
                self.active.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        self.finish_start(target, nav)
    }

    /// Start the router at an explicit state, skipping path resolution.
    pub fn start_with_state(&self, state: State) -> Result<Arc<State>, NavigationError> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(NavigationError::new(ErrorCode::RouterAlreadyStarted));
        }
        self.finish_start(Arc::new(state), NavigationOptions::replacing())
    }

    fn finish_start(
        &self,
        to: Arc<State>,
        nav: NavigationOptions,
    ) -> Result<Arc<State>, NavigationError> {
        match self.run_transition(to, None, nav) {
            Ok(state) => {
                self.started.store(true, Ordering::SeqCst);
                info!(route = %state.name, path = %state.path, "Router started");
                self.emit(
                    channels::ROUTER_START,
                    EventPayload::transition(Some(Arc::clone(&state)), None),
                );
                Ok(state)
            }
            Err(e) => {
                self.active.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn resolve_start_target(
        &self,
        path: &str,
        nav: &NavigationOptions,
    ) -> Result<Arc<State>, NavigationError> {
        if path.is_empty() {
            return self.default_route_state(nav, ErrorCode::NoStartPathOrState);
        }
        if let Some(state) = self.resolve_path_state(path, nav) {
            return Ok(state);
        }
        if self.options().allow_not_found {
            return Ok(Arc::new(self.make_not_found_state_with(path, nav)));
        }
        self.default_route_state(nav, ErrorCode::RouteNotFound)
            .map_err(|e| {
                if e.code == ErrorCode::NoStartPathOrState {
                    NavigationError::with_message(
                        ErrorCode::RouteNotFound,
                        format!("no route matches '{path}'"),
                    )
                } else {
                    e
                }
            })
    }

    fn default_route_state(
        &self,
        nav: &NavigationOptions,
        missing_code: ErrorCode,
    ) -> Result<Arc<State>, NavigationError> {
        // Clone the enum before resolving so a resolver callback runs
        // without holding the options lock.
        let default_route = self.options().default_route;
        match default_route.resolve() {
            Some(name) => self
                .build_state_arc(&name, &Params::new(), nav, false)
                .map_err(|e| {
                    NavigationError::with_message(ErrorCode::RouteNotFound, e.to_string())
                        .context(Some(name.as_str()), None)
                }),
            None => Err(NavigationError::new(missing_code)),
        }
    }

    /// Stop the router: cancel any in-flight transition, forget the state
    /// pair (the id counter survives), emit `ROUTER_STOP`. Calling `stop`
    /// on an inactive router is a no-op.
    pub fn stop(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        self.started.store(false, Ordering::SeqCst);
        self.cancel_in_flight();
        self.namespace.clear();
        info!("Router stopped");
        self.emit(channels::ROUTER_STOP, EventPayload::default());
    }

    /// Cancel the in-flight transition, if any. Returns whether one was
    /// cancelled. Repeated calls are no-ops.
    pub fn cancel(&self) -> bool {
        self.cancel_in_flight()
    }

    fn cancel_in_flight(&self) -> bool {
        let cancelled_payload = {
            let mut active = self.active_transition.lock().unwrap();
            active.take().and_then(|prev| {
                prev.cancel().then(|| {
                    EventPayload::transition(Some(Arc::clone(&prev.to)), prev.from.clone())
                })
            })
        };
        match cancelled_payload {
            Some(payload) => {
                info!(
                    to = payload.to.as_ref().map_or("", |s| s.name.as_str()),
                    "In-flight transition cancelled"
                );
                self.emit(channels::TRANSITION_CANCEL, payload);
                true
            }
            None => false,
        }
    }
}
