#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Forward declarations: resolution, param merging, cycle rejection.
//!
//! # Test Coverage
//!
//! - Static forwards with default-param merging across source and target
//! - Transitive chains flattened to their terminal
//! - Cycle and dangling-target rejection, with the prior map intact
//! - Parameter-compatibility rule (target URL params subset of source)
//! - Dynamic forward callbacks resolved per request

use serde_json::json;

use wayfarer::errors::ConfigError;
use wayfarer::routes::{RouteDefinition, RoutePatch};
use wayfarer::{Options, Router};

mod common;
use common::params;

fn forwarding_router() -> Router {
    let router = Router::new(Options::default());
    router
        .add_routes(
            vec![
                RouteDefinition::new("users", "/users").with_default_param("page", json!(1)),
                RouteDefinition::new("old-users", "/old-users").forward_to("users"),
            ],
            None,
        )
        .unwrap();
    router
}

#[test]
fn test_forward_state_merges_params() -> anyhow::Result<()> {
    let router = forwarding_router();
    let forwarded = router.forward_state("old-users", &params(&[("filter", json!("active"))]))?;
    assert_eq!(forwarded.name, "users");
    assert_eq!(forwarded.params.get("page"), Some(&json!(1)));
    assert_eq!(forwarded.params.get("filter"), Some(&json!("active")));
    Ok(())
}

#[test]
fn test_forward_without_declaration_is_identity() {
    let router = forwarding_router();
    let forwarded = router.forward_state("users", &params(&[])).unwrap();
    assert_eq!(forwarded.name, "users");
    assert_eq!(forwarded.params.get("page"), Some(&json!(1)));
}

#[test]
fn test_chains_resolve_to_terminal() -> anyhow::Result<()> {
    let router = Router::new(Options::default());
    router.add_routes(
        vec![
            RouteDefinition::new("c", "/c"),
            RouteDefinition::new("b", "/b").forward_to("c"),
            RouteDefinition::new("a", "/a").forward_to("b"),
        ],
        None,
    )?;
    assert_eq!(router.forward_state("a", &params(&[]))?.name, "c");
    assert_eq!(router.forward_state("b", &params(&[]))?.name, "c");
    Ok(())
}

#[test]
fn test_dangling_forward_target_rejected_at_add() {
    let router = Router::new(Options::default());
    let err = router
        .add_route(RouteDefinition::new("a", "/a").forward_to("ghost"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::UnknownRoute { .. }));
    assert!(!router.has_route("a"), "failed add must roll back");
}

#[test]
fn test_forward_cycle_rejected_on_update() {
    let router = Router::new(Options::default());
    router
        .add_routes(
            vec![
                RouteDefinition::new("b", "/b"),
                RouteDefinition::new("a", "/a").forward_to("b"),
            ],
            None,
        )
        .unwrap();

    let err = router
        .update_route("b", RoutePatch::new().forward_to("a"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::CyclicForward { .. }));

    // prior map still in force: a forwards to b, b forwards nowhere
    assert_eq!(router.forward_state("a", &params(&[])).unwrap().name, "b");
    assert_eq!(router.forward_state("b", &params(&[])).unwrap().name, "b");
}

#[test]
fn test_forward_param_compatibility_enforced() {
    let router = Router::new(Options::default());
    let err = router
        .add_routes(
            vec![
                RouteDefinition::new("wide", "/wide/:id/:extra"),
                RouteDefinition::new("narrow", "/narrow/:id").forward_to("wide"),
            ],
            None,
        )
        .unwrap_err();
    assert!(matches!(err, ConfigError::ForwardParamMismatch { .. }));
}

#[test]
fn test_dynamic_forward_resolved_per_request() {
    let router = Router::new(Options::default());
    router
        .add_routes(
            vec![
                RouteDefinition::new("v1", "/v1"),
                RouteDefinition::new("v2", "/v2"),
                RouteDefinition::new("latest", "/latest").forward_to_fn(|p| {
                    if p.get("beta") == Some(&json!(true)) {
                        "v2".to_string()
                    } else {
                        "v1".to_string()
                    }
                }),
            ],
            None,
        )
        .unwrap();

    assert_eq!(
        router.forward_state("latest", &params(&[])).unwrap().name,
        "v1"
    );
    assert_eq!(
        router
            .forward_state("latest", &params(&[("beta", json!(true))]))
            .unwrap()
            .name,
        "v2"
    );
}

#[test]
fn test_dynamic_forward_to_unknown_route_is_an_error() {
    let router = Router::new(Options::default());
    router
        .add_routes(
            vec![
                RouteDefinition::new("a", "/a").forward_to_fn(|_| "ghost".to_string()),
            ],
            None,
        )
        .unwrap();
    assert!(matches!(
        router.forward_state("a", &params(&[])),
        Err(ConfigError::UnknownRoute { .. })
    ));
}

#[test]
fn test_removing_target_purges_forwards() {
    let router = forwarding_router();
    router.remove_route("users").unwrap();
    let forwarded = router.forward_state("old-users", &params(&[])).unwrap();
    assert_eq!(forwarded.name, "old-users");
}

#[test]
fn test_match_path_applies_forwarding() {
    let router = forwarding_router();
    let state = router.match_path("/old-users").unwrap();
    assert_eq!(state.name, "users");
    assert_eq!(state.path, "/old-users");
}
