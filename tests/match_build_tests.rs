#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Path matching and building through the router API.
//!
//! # Test Coverage
//!
//! - Basic match/build symmetry for static and parameterised routes
//! - The `UNKNOWN_ROUTE` pseudo-route's identity build
//! - Default param merging and param codecs
//! - Canonical-path rewriting
//! - Root-path prefixes
//! - The match/build round-trip property

use serde_json::json;

use wayfarer::options::Options;
use wayfarer::routes::RouteDefinition;
use wayfarer::{Params, Router, UNKNOWN_ROUTE};

mod common;
use common::{fresh_router, params};

#[test]
fn test_basic_match_and_build() {
    let router = Router::new(Options::default());
    router
        .add_route(RouteDefinition::new("user", "/user/:id"))
        .unwrap();

    let path = router
        .build_path("user", &params(&[("id", json!("42"))]))
        .unwrap();
    assert_eq!(path, "/user/42");

    let state = router.match_path("/user/42").expect("path matches");
    assert_eq!(state.name, "user");
    assert_eq!(state.params.get("id"), Some(&json!("42")));
    assert_eq!(state.path, "/user/42");
}

#[test]
fn test_match_rejects_malformed_input() {
    let router = fresh_router();
    assert!(router.match_path("users").is_none());
    assert!(router.match_path("/users//list").is_none());
    assert!(router.match_path("").is_none());
}

#[test]
fn test_unknown_route_build_is_identity_on_path_param() {
    let router = fresh_router();
    let path = router
        .build_path(UNKNOWN_ROUTE, &params(&[("path", json!("/whatever?x=1"))]))
        .unwrap();
    assert_eq!(path, "/whatever?x=1");
    assert_eq!(router.build_path(UNKNOWN_ROUTE, &Params::new()).unwrap(), "");
}

#[test]
fn test_match_merges_route_default_params() {
    let router = Router::new(Options::default());
    router
        .add_route(
            RouteDefinition::new("inbox", "/inbox?page")
                .with_default_param("page", json!(1))
                .with_default_param("folder", json!("all")),
        )
        .unwrap();

    let state = router.match_path("/inbox").unwrap();
    assert_eq!(state.params.get("page"), Some(&json!(1)));
    assert_eq!(state.params.get("folder"), Some(&json!("all")));

    let state = router.match_path("/inbox?page=3").unwrap();
    assert_eq!(state.params.get("page"), Some(&json!("3")));
}

#[test]
fn test_router_level_default_params_underlay_route_level() {
    let mut options = Options::default();
    options
        .default_params
        .insert("inbox".to_string(), params(&[("page", json!(9))]));
    let router = Router::new(options);
    router
        .add_route(RouteDefinition::new("inbox", "/inbox?page"))
        .unwrap();

    let state = router.match_path("/inbox").unwrap();
    assert_eq!(state.params.get("page"), Some(&json!(9)));
}

#[test]
fn test_decoder_transforms_matched_params() {
    let router = Router::new(Options::default());
    router
        .add_route(
            RouteDefinition::new("user", "/user/:id").decode_params(|p| {
                let mut out = p.clone();
                let numeric = p.get("id").and_then(|v| v.as_str())?.parse::<i64>().ok()?;
                out.insert("id".to_string(), json!(numeric));
                Some(out)
            }),
        )
        .unwrap();

    let state = router.match_path("/user/42").unwrap();
    assert_eq!(state.params.get("id"), Some(&json!(42)));
}

#[test]
fn test_misbehaving_decoder_keeps_predecode_params() {
    let router = Router::new(Options::default());
    router
        .add_route(RouteDefinition::new("user", "/user/:id").decode_params(|_| None))
        .unwrap();

    let state = router.match_path("/user/42").unwrap();
    assert_eq!(state.params.get("id"), Some(&json!("42")));
}

#[test]
fn test_encoder_transforms_params_before_build() {
    let router = Router::new(Options::default());
    router
        .add_route(
            RouteDefinition::new("user", "/user/:id").encode_params(|p| {
                let mut out = p.clone();
                let id = p.get("id")?.as_i64()?;
                out.insert("id".to_string(), json!(format!("u{id}")));
                Some(out)
            }),
        )
        .unwrap();

    let path = router
        .build_path("user", &params(&[("id", json!(7))]))
        .unwrap();
    assert_eq!(path, "/user/u7");
}

#[test]
fn test_rewrite_path_on_match_substitutes_canonical_form() {
    let options = Options {
        rewrite_path_on_match: true,
        ..Options::default()
    };
    let router = Router::new(options);
    router
        .add_route(RouteDefinition::new("users", "/users"))
        .unwrap();

    let state = router.match_path("/users/").unwrap();
    assert_eq!(state.path, "/users");

    let options = Options::default();
    let router = Router::new(options);
    router
        .add_route(RouteDefinition::new("users", "/users"))
        .unwrap();
    let state = router.match_path("/users/").unwrap();
    assert_eq!(state.path, "/users/");
}

#[test]
fn test_root_path_is_prefixed_everywhere() {
    let router = fresh_router();
    router.set_root_path("/app").unwrap();
    assert_eq!(router.get_root_path(), "/app");

    assert_eq!(
        router
            .build_path("users.detail", &params(&[("id", json!("7"))]))
            .unwrap(),
        "/app/users/7"
    );
    let state = router.match_path("/app/users/7").unwrap();
    assert_eq!(state.name, "users.detail");
    assert!(router.match_path("/users/7").is_none());
}

#[test]
fn test_match_meta_records_param_origins() {
    let router = fresh_router();
    let state = router.match_path("/search?q=rust").unwrap();
    let meta = state.meta.expect("matched states carry meta");
    let search = meta.params.get("search").expect("segment entry");
    assert!(search.contains_key("q"));
}

#[test]
fn test_match_build_round_trip_across_routes() {
    let router = fresh_router();
    let cases = [
        ("home", Params::new()),
        ("users", Params::new()),
        ("users.detail", params(&[("id", json!("42"))])),
        (
            "search",
            params(&[("q", json!("rust routers")), ("page", json!("2"))]),
        ),
    ];
    for (name, p) in cases {
        let path = router.build_path(name, &p).unwrap();
        let state = router.match_path(&path).expect("built path must match");
        assert_eq!(state.name, name, "route {name} round-trips its name");
        assert_eq!(state.params, p, "route {name} round-trips its params");
    }
}

#[test]
fn test_has_route_and_segments() {
    let router = fresh_router();
    assert!(router.has_route("users.detail"));
    assert!(!router.has_route("users.ghost"));
    assert!(router.get_route("users").is_some());
    assert!(router.get_route("users.ghost").is_none());
}

#[test]
fn test_route_custom_fields_exposed() {
    let router = Router::new(Options::default());
    router
        .add_route(RouteDefinition::new("docs", "/docs").with_extra("title", json!("Documentation")))
        .unwrap();
    let config = router.get_route_config("docs").expect("custom fields");
    assert_eq!(config.get("title"), Some(&json!("Documentation")));
    assert!(router.get_route_config("home").is_none());
}
