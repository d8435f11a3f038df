//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use serde_json::Value;
use std::sync::{Arc, Mutex};

use wayfarer::events::channels;
use wayfarer::options::{Limits, Options};
use wayfarer::routes::RouteDefinition;
use wayfarer::{Params, Router};

/// Build a params map from literal pairs.
pub fn params(pairs: &[(&str, Value)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// The route set most tests run against.
pub fn base_routes() -> Vec<RouteDefinition> {
    vec![
        RouteDefinition::new("home", "/"),
        RouteDefinition::new("users", "/users")
            .child(RouteDefinition::new("detail", "/:id"))
            .child(RouteDefinition::new("list", "/list")),
        RouteDefinition::new("orders", "/orders"),
        RouteDefinition::new("search", "/search?q&page"),
    ]
}

/// A router with the base routes, not yet started. Explicit default limits
/// keep the environment out of test runs.
pub fn fresh_router() -> Arc<Router> {
    fresh_router_with(Options::default())
}

pub fn fresh_router_with(options: Options) -> Arc<Router> {
    let router = Arc::new(Router::with_limits(options, Limits::default()));
    router
        .add_routes(base_routes(), None)
        .expect("base routes are valid");
    router
}

/// A router with the base routes, started at `/`.
pub fn started_router() -> Arc<Router> {
    let router = fresh_router();
    router.start("/").expect("start succeeds");
    router
}

pub fn started_router_with(options: Options) -> Arc<Router> {
    let router = fresh_router_with(options);
    router.start("/").expect("start succeeds");
    router
}

/// Record every well-known event's channel name in arrival order.
pub fn record_events(router: &Router) -> Arc<Mutex<Vec<String>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    for channel in [
        channels::ROUTER_START,
        channels::ROUTER_STOP,
        channels::TRANSITION_START,
        channels::TRANSITION_SUCCESS,
        channels::TRANSITION_ERROR,
        channels::TRANSITION_CANCEL,
    ] {
        let log = Arc::clone(&log);
        router
            .on(channel, move |_| log.lock().unwrap().push(channel.to_string()))
            .expect("listener registration succeeds");
    }
    log
}

/// Count occurrences of one channel in a recorded log.
pub fn count_of(log: &Arc<Mutex<Vec<String>>>, channel: &str) -> usize {
    log.lock().unwrap().iter().filter(|c| *c == channel).count()
}
