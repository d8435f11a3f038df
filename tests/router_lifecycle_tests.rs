#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Router start, stop, and restart semantics.
//!
//! # Test Coverage
//!
//! - Two-phase start: concurrent starts rejected, started only on success
//! - Default-route fallback and the not-found fallback
//! - Start failure resets the active flag so start can be retried
//! - Stop clears state, cancels in-flight transitions, emits events
//! - State ids stay monotonic across stop/start cycles

use serde_json::json;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use wayfarer::errors::ConfigError;
use wayfarer::events::channels;
use wayfarer::lifecycle::{GuardOutcome, GuardSpec};
use wayfarer::options::{DefaultRoute, Options, QueryParamsMode};
use wayfarer::{ErrorCode, NavigationOptions, Params, Router, UNKNOWN_ROUTE};

mod common;
use common::{base_routes, count_of, fresh_router, fresh_router_with, record_events, params};

#[test]
fn test_start_resolves_path_and_emits_router_start() {
    let router = fresh_router();
    let log = record_events(&router);
    let state = router.start("/users/7").unwrap();
    assert_eq!(state.name, "users.detail");
    assert_eq!(state.params.get("id"), Some(&json!("7")));
    assert!(router.is_started());
    assert!(router.is_active());
    assert!(state.meta.as_ref().unwrap().options.replace);
    assert_eq!(count_of(&log, channels::ROUTER_START), 1);
    assert_eq!(count_of(&log, channels::TRANSITION_SUCCESS), 1);
}

#[test]
fn test_second_start_is_rejected() {
    let router = fresh_router();
    router.start("/").unwrap();
    let err = router.start("/users").unwrap_err();
    assert_eq!(err.code, ErrorCode::RouterAlreadyStarted);
}

#[test]
fn test_empty_path_uses_default_route() {
    let options = Options {
        default_route: DefaultRoute::Name("home".to_string()),
        ..Options::default()
    };
    let router = fresh_router_with(options);
    let state = router.start("").unwrap();
    assert_eq!(state.name, "home");
}

#[test]
fn test_empty_path_without_default_route_fails() {
    let router = fresh_router();
    let err = router.start("").unwrap_err();
    assert_eq!(err.code, ErrorCode::NoStartPathOrState);
    assert!(!router.is_active());
    assert!(!router.is_started());
}

#[test]
fn test_invalid_default_route_fails_with_route_not_found() {
    let options = Options {
        default_route: DefaultRoute::Name("ghost".to_string()),
        ..Options::default()
    };
    let router = fresh_router_with(options);
    let err = router.start("").unwrap_err();
    assert_eq!(err.code, ErrorCode::RouteNotFound);
}

#[test]
fn test_unmatched_start_path_falls_back_to_default_route() {
    let options = Options {
        default_route: DefaultRoute::Name("home".to_string()),
        ..Options::default()
    };
    let router = fresh_router_with(options);
    let state = router.start("/nowhere").unwrap();
    assert_eq!(state.name, "home");
}

#[test]
fn test_unmatched_start_path_with_allow_not_found() {
    let options = Options {
        allow_not_found: true,
        ..Options::default()
    };
    let router = fresh_router_with(options);
    let state = router.start("/nowhere").unwrap();
    assert_eq!(state.name, UNKNOWN_ROUTE);
    assert_eq!(state.path, "/nowhere");
}

#[test]
fn test_unmatched_start_path_without_fallbacks_fails() {
    let router = fresh_router();
    let err = router.start("/nowhere").unwrap_err();
    assert_eq!(err.code, ErrorCode::RouteNotFound);
    assert!(!router.is_active());
}

#[test]
fn test_default_route_resolver_callback() {
    let options = Options {
        default_route: DefaultRoute::Resolver(Arc::new(|| Some("orders".to_string()))),
        ..Options::default()
    };
    let router = fresh_router_with(options);
    let state = router.start("").unwrap();
    assert_eq!(state.name, "orders");
}

#[test]
fn test_failed_initial_navigation_resets_active_flag() {
    let router = fresh_router();
    router
        .add_activate_guard("users", GuardSpec::Constant(false))
        .unwrap();

    let err = router.start("/users").unwrap_err();
    assert_eq!(err.code, ErrorCode::CannotActivate);
    assert!(!router.is_active());
    assert!(!router.is_started());
    assert!(router.get_state().is_none());

    // the router can be started again once the guard stops objecting
    router.clear_activate_guards();
    assert_eq!(router.start("/users").unwrap().name, "users");
}

#[test]
fn test_navigate_before_start_is_rejected() {
    let router = fresh_router();
    let err = router
        .navigate("users", Params::new(), NavigationOptions::default())
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::RouterNotStarted);
}

#[test]
fn test_start_with_explicit_state() {
    let router = fresh_router();
    let state = router.make_state("orders", Params::new(), "/orders");
    let committed = router.start_with_state(state).unwrap();
    assert_eq!(committed.name, "orders");
    assert!(router.is_started());
}

#[test]
fn test_stop_clears_state_and_emits() {
    let router = fresh_router();
    router.start("/").unwrap();
    let log = record_events(&router);

    router.stop();
    assert!(!router.is_active());
    assert!(!router.is_started());
    assert!(router.get_state().is_none());
    assert!(router.get_previous_state().is_none());
    assert_eq!(count_of(&log, channels::ROUTER_STOP), 1);

    // stop on an inactive router is a no-op
    router.stop();
    assert_eq!(count_of(&log, channels::ROUTER_STOP), 1);
}

#[test]
fn test_stop_cancels_in_flight_transition() {
    let router = fresh_router();
    router.start("/").unwrap();
    router
        .use_middleware_fn(|to, _| {
            if to.name == "users" {
                thread::sleep(Duration::from_millis(150));
            }
            Ok(GuardOutcome::Allow)
        })
        .unwrap();
    let log = record_events(&router);

    let router_for_thread = Arc::clone(&router);
    let pending = thread::spawn(move || {
        router_for_thread.navigate("users", Params::new(), NavigationOptions::default())
    });
    thread::sleep(Duration::from_millis(40));
    router.stop();

    let err = pending.join().unwrap().unwrap_err();
    assert_eq!(err.code, ErrorCode::TransitionCancelled);
    assert!(router.get_state().is_none());
    assert_eq!(count_of(&log, channels::TRANSITION_CANCEL), 1);
    assert_eq!(count_of(&log, channels::ROUTER_STOP), 1);
}

#[test]
fn test_state_ids_monotonic_across_restart() {
    let router = fresh_router();
    let first = router.start("/").unwrap();
    let first_id = first.meta.as_ref().unwrap().id;

    router.stop();
    let second = router.start("/users").unwrap();
    let second_id = second.meta.as_ref().unwrap().id;
    assert!(
        second_id > first_id,
        "ids keep increasing after stop ({first_id} then {second_id})"
    );
}

#[test]
fn test_ids_increase_per_committed_state() {
    let router = fresh_router();
    router.start("/").unwrap();
    let mut last = router.get_state().unwrap().meta.as_ref().unwrap().id;
    for (route, p) in [
        ("users", Params::new()),
        ("users.detail", params(&[("id", json!("1"))])),
        ("orders", Params::new()),
    ] {
        let state = router
            .navigate(route, p, NavigationOptions::default())
            .unwrap();
        let id = state.meta.as_ref().unwrap().id;
        assert!(id > last);
        last = id;
    }
}

#[test]
fn test_previous_state_tracks_commits() {
    let router = fresh_router();
    router.start("/").unwrap();
    router
        .navigate("users", Params::new(), NavigationOptions::default())
        .unwrap();
    assert_eq!(router.get_state().unwrap().name, "users");
    assert_eq!(router.get_previous_state().unwrap().name, "home");

    router
        .navigate("orders", Params::new(), NavigationOptions::default())
        .unwrap();
    assert_eq!(router.get_previous_state().unwrap().name, "users");
}

#[test]
fn test_path_semantics_options_sealed_after_start() {
    let router = fresh_router();
    router.start("/").unwrap();

    let changed_mode = Options {
        query_params_mode: QueryParamsMode::Strict,
        ..Options::default()
    };
    assert!(matches!(
        router.set_options(changed_mode),
        Err(ConfigError::OptionSealed {
            option: "query_params_mode"
        })
    ));

    // the legacy alias cannot sneak past the seal either
    let changed_alias = Options {
        strict_query_params: Some(true),
        ..Options::default()
    };
    assert!(matches!(
        router.set_options(changed_alias),
        Err(ConfigError::OptionSealed {
            option: "query_params_mode"
        })
    ));

    // unsealed options stay adjustable
    let changed_not_found = Options {
        allow_not_found: true,
        ..Options::default()
    };
    router.set_options(changed_not_found).unwrap();
    assert!(router.options().allow_not_found);
}

#[test]
fn test_routes_can_be_added_before_and_after_start() {
    let router = Router::new(Options::default());
    router.add_routes(base_routes(), None).unwrap();
    router.start("/").unwrap();
    router
        .add_route(wayfarer::routes::RouteDefinition::new("late", "/late"))
        .unwrap();
    let state = router
        .navigate("late", Params::new(), NavigationOptions::default())
        .unwrap();
    assert_eq!(state.path, "/late");
}
