//! Named-channel event bus with snapshot dispatch.
//!
//! Six well-known channels cover the router lifecycle; arbitrary user
//! channels work the same way. Dispatch is synchronous and in registration
//! order. The listener list is snapshotted at the start of every dispatch,
//! so listeners added or removed during a dispatch take effect on the next
//! one. A panicking listener is caught and logged; it never interrupts
//! delivery to the rest.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tracing::{debug, error};

use crate::errors::{ConfigError, NavigationError};
use crate::options::{Limits, NavigationOptions};
use crate::state::State;

/// The well-known event channels.
pub mod channels {
    /// Router finished its initial navigation
    pub const ROUTER_START: &str = "ROUTER_START";
    /// Router was stopped
    pub const ROUTER_STOP: &str = "ROUTER_STOP";
    /// A transition passed its pre-checks and began
    pub const TRANSITION_START: &str = "TRANSITION_START";
    /// A transition committed
    pub const TRANSITION_SUCCESS: &str = "TRANSITION_SUCCESS";
    /// A transition failed with an operational error
    pub const TRANSITION_ERROR: &str = "TRANSITION_ERROR";
    /// A transition was cancelled by a newer one, `cancel()`, or `stop()`
    pub const TRANSITION_CANCEL: &str = "TRANSITION_CANCEL";
}

/// What listeners receive. Unused fields stay `None` depending on the
/// channel.
#[derive(Debug, Clone, Default)]
pub struct EventPayload {
    /// Target state of the transition
    pub to: Option<Arc<State>>,
    /// State the transition left from
    pub from: Option<Arc<State>>,
    /// The classified error, on `TRANSITION_ERROR`
    pub error: Option<NavigationError>,
    /// Navigation options, on `TRANSITION_SUCCESS`
    pub options: Option<NavigationOptions>,
}

impl EventPayload {
    /// Payload carrying the transition endpoints.
    #[must_use]
    pub fn transition(to: Option<Arc<State>>, from: Option<Arc<State>>) -> Self {
        EventPayload {
            to,
            from,
            ..EventPayload::default()
        }
    }

    /// Attach an error.
    #[must_use]
    pub fn with_error(mut self, error: NavigationError) -> Self {
        self.error = Some(error);
        self
    }

    /// Attach navigation options.
    #[must_use]
    pub fn with_options(mut self, options: NavigationOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// A registered listener callback.
pub type ListenerFn = dyn Fn(&EventPayload) + Send + Sync;

struct Listener {
    id: u64,
    callback: Arc<ListenerFn>,
}

/// Handle returned by `add_event_listener`. Unsubscribing is explicit and
/// idempotent; dropping the handle leaves the listener registered.
pub struct Subscription {
    bus: Weak<EventBus>,
    channel: String,
    id: u64,
    active: AtomicBool,
}

impl Subscription {
    /// Remove the listener. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            if let Some(bus) = self.bus.upgrade() {
                bus.remove(&self.channel, self.id);
            }
        }
    }
}

/// Listener registry with ordered dispatch, error isolation, and
/// re-entrancy limits.
pub struct EventBus {
    listeners: RwLock<HashMap<String, Vec<Listener>>>,
    next_id: AtomicU64,
    depth: AtomicUsize,
    max_listeners: usize,
    max_depth: usize,
}

impl EventBus {
    pub(crate) fn new(limits: &Limits) -> Self {
        EventBus {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            depth: AtomicUsize::new(0),
            max_listeners: limits.max_listeners,
            max_depth: limits.max_event_depth,
        }
    }

    /// Register a callback on a channel.
    ///
    /// Registering the same callback (same allocation) twice on one channel
    /// is a structural error.
    pub(crate) fn subscribe(
        self: &Arc<Self>,
        channel: &str,
        callback: Arc<ListenerFn>,
    ) -> Result<Subscription, ConfigError> {
        let mut listeners = self.listeners.write().unwrap();
        let entries = listeners.entry(channel.to_string()).or_default();
        if entries
            .iter()
            .any(|l| Arc::ptr_eq(&l.callback, &callback))
        {
            return Err(ConfigError::DuplicateListener {
                channel: channel.to_string(),
            });
        }
        Limits::admit(entries.len(), self.max_listeners, "event listener")?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        entries.push(Listener { id, callback });
        Ok(Subscription {
            bus: Arc::downgrade(self),
            channel: channel.to_string(),
            id,
            active: AtomicBool::new(true),
        })
    }

    fn remove(&self, channel: &str, id: u64) {
        let mut listeners = self.listeners.write().unwrap();
        if let Some(entries) = listeners.get_mut(channel) {
            entries.retain(|l| l.id != id);
        }
    }

    /// Number of listeners currently registered on a channel.
    #[must_use]
    pub fn listener_count(&self, channel: &str) -> usize {
        let listeners = self.listeners.read().unwrap();
        listeners.get(channel).map_or(0, Vec::len)
    }

    /// Dispatch a payload to every listener of the channel, in
    /// registration order.
    pub(crate) fn emit(&self, channel: &str, payload: &EventPayload) -> Result<(), ConfigError> {
        let depth = self.depth.fetch_add(1, Ordering::SeqCst);
        let _guard = DepthGuard { depth: &self.depth };
        if depth >= self.max_depth {
            error!(
                channel = %channel,
                depth = depth + 1,
                max_depth = self.max_depth,
                "Re-entrant event emission exceeded the depth limit"
            );
            return Err(ConfigError::LimitExceeded {
                what: "event depth",
                limit: self.max_depth,
            });
        }

        let snapshot: Vec<Arc<ListenerFn>> = {
            let listeners = self.listeners.read().unwrap();
            listeners
                .get(channel)
                .map(|entries| entries.iter().map(|l| Arc::clone(&l.callback)).collect())
                .unwrap_or_default()
        };

        debug!(
            channel = %channel,
            listener_count = snapshot.len(),
            "Dispatching event"
        );

        for callback in snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(payload))) {
                let panic_message = format!("{panic:?}");
                error!(
                    channel = %channel,
                    panic_message = %panic_message,
                    "Event listener panicked"
                );
            }
        }
        Ok(())
    }
}

struct DepthGuard<'a> {
    depth: &'a AtomicUsize,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::sync::Mutex;

    fn bus() -> Arc<EventBus> {
        Arc::new(EventBus::new(&Limits::default()))
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let bus = bus();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            let cb: Arc<ListenerFn> = Arc::new(move |_| seen.lock().unwrap().push(tag));
            bus.subscribe("chan", cb).unwrap();
        }
        bus.emit("chan", &EventPayload::default()).unwrap();
        assert_eq!(&*seen.lock().unwrap(), &["first", "second", "third"]);
    }

    #[test]
    fn test_duplicate_callback_rejected() {
        let bus = bus();
        let cb: Arc<ListenerFn> = Arc::new(|_| {});
        bus.subscribe("chan", Arc::clone(&cb)).unwrap();
        assert!(matches!(
            bus.subscribe("chan", cb),
            Err(ConfigError::DuplicateListener { .. })
        ));
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let bus = bus();
        let count = Arc::new(Mutex::new(0));
        let c = Arc::clone(&count);
        let sub = bus
            .subscribe("chan", Arc::new(move |_: &EventPayload| *c.lock().unwrap() += 1) as Arc<ListenerFn>)
            .unwrap();
        sub.unsubscribe();
        sub.unsubscribe();
        bus.emit("chan", &EventPayload::default()).unwrap();
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn test_panicking_listener_does_not_halt_delivery() {
        let bus = bus();
        let reached = Arc::new(Mutex::new(false));
        bus.subscribe("chan", Arc::new(|_: &EventPayload| panic!("listener boom")) as Arc<ListenerFn>)
            .unwrap();
        let r = Arc::clone(&reached);
        bus.subscribe("chan", Arc::new(move |_: &EventPayload| *r.lock().unwrap() = true) as Arc<ListenerFn>)
            .unwrap();
        bus.emit("chan", &EventPayload::default()).unwrap();
        assert!(*reached.lock().unwrap());
    }

    #[test]
    fn test_listener_added_during_dispatch_waits_for_next() {
        let bus = bus();
        let count = Arc::new(Mutex::new(0));
        let bus_for_listener = Arc::clone(&bus);
        let count_for_new = Arc::clone(&count);
        bus.subscribe(
            "chan",
            Arc::new(move |_: &EventPayload| {
                let c = Arc::clone(&count_for_new);
                let _ = bus_for_listener
                    .subscribe("chan", Arc::new(move |_: &EventPayload| *c.lock().unwrap() += 1) as Arc<ListenerFn>);
            }) as Arc<ListenerFn>,
        )
        .unwrap();
        bus.emit("chan", &EventPayload::default()).unwrap();
        assert_eq!(*count.lock().unwrap(), 0);
        bus.emit("chan", &EventPayload::default()).unwrap();
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_emission_depth_is_bounded() {
        let limits = Limits {
            max_event_depth: 2,
            ..Limits::default()
        };
        let bus = Arc::new(EventBus::new(&limits));
        let bus_inner = Arc::clone(&bus);
        let failures = Arc::new(Mutex::new(0));
        let f = Arc::clone(&failures);
        bus.subscribe(
            "chan",
            Arc::new(move |payload: &EventPayload| {
                if bus_inner.emit("chan", payload).is_err() {
                    *f.lock().unwrap() += 1;
                }
            }) as Arc<ListenerFn>,
        )
        .unwrap();
        bus.emit("chan", &EventPayload::default()).unwrap();
        assert!(*failures.lock().unwrap() > 0);
    }
}
