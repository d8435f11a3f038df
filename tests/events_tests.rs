#![allow(clippy::unwrap_used, clippy::expect_used)]

//! The event bus through the router API.
//!
//! # Test Coverage
//!
//! - User channels dispatch alongside the well-known channels
//! - Duplicate registration protection and idempotent unsubscribe
//! - Listener panic isolation during real transition events
//! - Payload contents on success and error channels

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use wayfarer::events::{channels, EventPayload, ListenerFn};
use wayfarer::lifecycle::GuardSpec;
use wayfarer::{ErrorCode, NavigationOptions, Params};

mod common;
use common::started_router;

#[test]
fn test_user_channels_dispatch() {
    let router = started_router();
    let count = Arc::new(AtomicUsize::new(0));
    let count_in_listener = Arc::clone(&count);
    router
        .on("app:custom", move |_| {
            count_in_listener.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    router
        .invoke_event_listeners("app:custom", &EventPayload::default())
        .unwrap();
    router
        .invoke_event_listeners("app:other", &EventPayload::default())
        .unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_duplicate_listener_rejected() {
    let router = started_router();
    let listener: Arc<ListenerFn> = Arc::new(|_| {});
    router
        .add_event_listener("app:custom", Arc::clone(&listener))
        .unwrap();
    assert!(router
        .add_event_listener("app:custom", Arc::clone(&listener))
        .is_err());
    // the same callback on a different channel is fine
    router
        .add_event_listener("app:other", listener)
        .unwrap();
}

#[test]
fn test_unsubscribe_stops_delivery_and_is_idempotent() {
    let router = started_router();
    let count = Arc::new(AtomicUsize::new(0));
    let count_in_listener = Arc::clone(&count);
    let sub = router
        .on(channels::TRANSITION_SUCCESS, move |_| {
            count_in_listener.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    router
        .navigate("users", Params::new(), NavigationOptions::default())
        .unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);

    sub.unsubscribe();
    sub.unsubscribe();
    router
        .navigate("orders", Params::new(), NavigationOptions::default())
        .unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_listener_panic_does_not_break_transition() {
    let router = started_router();
    let reached = Arc::new(AtomicUsize::new(0));
    router
        .on(channels::TRANSITION_SUCCESS, |_| panic!("listener boom"))
        .unwrap();
    let reached_in_listener = Arc::clone(&reached);
    router
        .on(channels::TRANSITION_SUCCESS, move |_| {
            reached_in_listener.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    let state = router
        .navigate("users", Params::new(), NavigationOptions::default())
        .unwrap();
    assert_eq!(state.name, "users");
    assert_eq!(reached.load(Ordering::SeqCst), 1);
}

#[test]
fn test_success_payload_carries_states_and_options() {
    let router = started_router();
    let seen: Arc<Mutex<Option<(String, String, bool)>>> = Arc::new(Mutex::new(None));
    let seen_in_listener = Arc::clone(&seen);
    router
        .on(channels::TRANSITION_SUCCESS, move |payload| {
            let to = payload.to.as_ref().unwrap().name.clone();
            let from = payload.from.as_ref().unwrap().name.clone();
            let replace = payload.options.as_ref().unwrap().replace;
            *seen_in_listener.lock().unwrap() = Some((to, from, replace));
        })
        .unwrap();

    let opts = NavigationOptions {
        replace: true,
        ..NavigationOptions::default()
    };
    router.navigate("users", Params::new(), opts).unwrap();
    let (to, from, replace) = seen.lock().unwrap().clone().unwrap();
    assert_eq!(to, "users");
    assert_eq!(from, "home");
    assert!(replace);
}

#[test]
fn test_error_payload_carries_classified_error() {
    let router = started_router();
    router
        .add_activate_guard("users", GuardSpec::Constant(false))
        .unwrap();
    let seen: Arc<Mutex<Option<ErrorCode>>> = Arc::new(Mutex::new(None));
    let seen_in_listener = Arc::clone(&seen);
    router
        .on(channels::TRANSITION_ERROR, move |payload| {
            *seen_in_listener.lock().unwrap() = payload.error.as_ref().map(|e| e.code);
        })
        .unwrap();

    let _ = router.navigate("users", Params::new(), NavigationOptions::default());
    assert_eq!(*seen.lock().unwrap(), Some(ErrorCode::CannotActivate));
}
