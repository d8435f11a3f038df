#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Plugin registration, rollback, and teardown.
//!
//! # Test Coverage
//!
//! - Handlers bound to the right channels
//! - Sequential initialisation with rollback when a factory fails
//! - Batch unsubscribe removes listeners and runs teardown exactly once
//! - In-batch deduplication and the plugin limit

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use wayfarer::errors::ConfigError;
use wayfarer::options::{Limits, Options};
use wayfarer::plugins::{Plugin, PluginFactory};
use wayfarer::{NavigationOptions, Params, Router};

mod common;
use common::{base_routes, started_router};

fn counting_plugin(successes: Arc<AtomicUsize>, teardowns: Arc<AtomicUsize>) -> PluginFactory {
    Arc::new(move |_router| {
        let successes = Arc::clone(&successes);
        let teardowns = Arc::clone(&teardowns);
        Ok(Plugin::new()
            .on_transition_success(move |_| {
                successes.fetch_add(1, Ordering::SeqCst);
            })
            .with_teardown(move || {
                teardowns.fetch_add(1, Ordering::SeqCst);
            }))
    })
}

#[test]
fn test_plugin_handlers_receive_events() {
    let router = started_router();
    let successes = Arc::new(AtomicUsize::new(0));
    let teardowns = Arc::new(AtomicUsize::new(0));
    router
        .use_plugin(vec![counting_plugin(
            Arc::clone(&successes),
            Arc::clone(&teardowns),
        )])
        .unwrap();

    router
        .navigate("users", Params::new(), NavigationOptions::default())
        .unwrap();
    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(teardowns.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unsubscribe_removes_handlers_and_runs_teardown_once() {
    let router = started_router();
    let successes = Arc::new(AtomicUsize::new(0));
    let teardowns = Arc::new(AtomicUsize::new(0));
    let handle = router
        .use_plugin(vec![counting_plugin(
            Arc::clone(&successes),
            Arc::clone(&teardowns),
        )])
        .unwrap();

    handle.unsubscribe();
    handle.unsubscribe();
    assert_eq!(teardowns.load(Ordering::SeqCst), 1);

    router
        .navigate("users", Params::new(), NavigationOptions::default())
        .unwrap();
    assert_eq!(successes.load(Ordering::SeqCst), 0);
}

#[test]
fn test_failing_factory_rolls_back_the_batch() {
    let router = started_router();
    let successes = Arc::new(AtomicUsize::new(0));
    let teardowns = Arc::new(AtomicUsize::new(0));
    let good = counting_plugin(Arc::clone(&successes), Arc::clone(&teardowns));
    let bad: PluginFactory = Arc::new(|_| {
        Err(ConfigError::LimitExceeded {
            what: "plugin self-check",
            limit: 0,
        })
    });

    assert!(router.use_plugin(vec![good, bad]).is_err());
    // the good plugin was initialised first, then unwound
    assert_eq!(teardowns.load(Ordering::SeqCst), 1);

    router
        .navigate("users", Params::new(), NavigationOptions::default())
        .unwrap();
    assert_eq!(successes.load(Ordering::SeqCst), 0);
}

#[test]
fn test_duplicate_factories_in_batch_are_deduplicated() {
    let router = started_router();
    let successes = Arc::new(AtomicUsize::new(0));
    let teardowns = Arc::new(AtomicUsize::new(0));
    let factory = counting_plugin(Arc::clone(&successes), Arc::clone(&teardowns));
    router
        .use_plugin(vec![Arc::clone(&factory), factory])
        .unwrap();

    router
        .navigate("users", Params::new(), NavigationOptions::default())
        .unwrap();
    assert_eq!(successes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_plugin_hard_limit() {
    let limits = Limits {
        max_plugins: 2,
        ..Limits::default()
    };
    let router = Router::with_limits(Options::default(), limits);
    router.add_routes(base_routes(), None).unwrap();

    let noop = || -> PluginFactory { Arc::new(|_| Ok(Plugin::new().on_start(|_| {}))) };
    router.use_plugin(vec![noop()]).unwrap();
    router.use_plugin(vec![noop()]).unwrap();
    assert!(matches!(
        router.use_plugin(vec![noop()]),
        Err(ConfigError::LimitExceeded { .. })
    ));
}

#[test]
fn test_start_and_stop_reach_plugin_handlers() {
    let router = started_router();
    let stops = Arc::new(AtomicUsize::new(0));
    let stops_in_plugin = Arc::clone(&stops);
    let factory: PluginFactory = Arc::new(move |_| {
        let stops = Arc::clone(&stops_in_plugin);
        Ok(Plugin::new().on_stop(move |_| {
            stops.fetch_add(1, Ordering::SeqCst);
        }))
    });
    router.use_plugin(vec![factory]).unwrap();

    router.stop();
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}
