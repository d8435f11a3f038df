//! # Wayfarer
//!
//! **Wayfarer** is a universal, framework-agnostic routing engine: it
//! resolves URL paths to named hierarchical route states, builds URLs back
//! from route names and parameters, and coordinates guarded, cancellable
//! transitions between states. Host applications (browser shells,
//! server-side renderers, native UIs) supply their own history and
//! location glue on top of the public API, event listeners, and plugins.
//!
//! ## Overview
//!
//! The engine is organised into a handful of subsystems:
//!
//! - **[`route_tree`]** - compiles route definitions into an immutable trie
//!   and resolves paths in both directions (match and build)
//! - **[`routes`]** - owns route definitions, forward maps, default params,
//!   param codecs, and custom fields; every mutation atomically rebuilds
//!   the derived table
//! - **[`state`]** - immutable route states with monotonic ids and the
//!   current/previous pair
//! - **[`transition`]** - the cancellable navigation pipeline:
//!   deactivation guards, middleware, activation guards, commit
//! - **[`events`]** - named-channel pub/sub with ordered dispatch, error
//!   isolation, and re-entrancy limits
//! - **[`lifecycle`]** - per-route guard factories and the middleware chain
//! - **[`plugins`]** - plugin factories bound to the event bus with
//!   rollback on failure
//! - **[`dependencies`]** - a bounded named injection map for guards,
//!   middleware, and plugins
//! - **[`router`]** - the façade tying everything together
//!
//! ## Quick Start
//!
//! ```
//! use wayfarer::options::Options;
//! use wayfarer::routes::RouteDefinition;
//! use wayfarer::Router;
//!
//! let router = Router::new(Options::default());
//! router
//!     .add_routes(
//!         vec![
//!             RouteDefinition::new("home", "/"),
//!             RouteDefinition::new("users", "/users")
//!                 .child(RouteDefinition::new("detail", "/:id")),
//!         ],
//!         None,
//!     )
//!     .expect("routes are valid");
//!
//! let state = router.start("/").expect("start succeeds");
//! assert_eq!(state.name, "home");
//!
//! let detail = router
//!     .navigate("users.detail", [("id".to_string(), "42".into())].into(), Default::default())
//!     .expect("navigation succeeds");
//! assert_eq!(detail.path, "/users/42");
//! ```
//!
//! ## Transitions
//!
//! A navigation runs `can_deactivate` guards over the segments being left
//! (deepest first), the middleware chain, and `can_activate` guards over
//! the segments being entered (shallowest first), then commits and emits
//! `TRANSITION_SUCCESS`. Guards allow, deny, fail with a reason, or
//! redirect; redirects restart the pipeline against the new target within
//! a bounded number of attempts.
//!
//! Navigations block the calling thread. Starting a navigation while
//! another is in flight cancels the earlier one cooperatively: its token is
//! invalidated, `TRANSITION_CANCEL` fires once, and the cancelled call
//! returns a `TRANSITION_CANCELLED` error at its next step boundary.
//!
//! ## Observability
//!
//! The engine logs through [`tracing`]: route-table rebuilds and commits at
//! `info`, match attempts and pipeline steps at `debug`, soft-limit
//! breaches and permissive fallbacks at `warn`, listener panics and
//! hard-limit rejections at `error`.

pub mod dependencies;
pub mod errors;
pub mod events;
pub mod ids;
pub mod lifecycle;
pub mod options;
pub mod params;
pub mod plugins;
pub mod route_tree;
pub mod router;
pub mod routes;
pub mod state;
pub mod transition;
pub mod validation;

/// Reserved system pseudo-route used when a path matches nothing but the
/// router is configured to allow not-found states. Building its path is the
/// identity on the `path` param.
pub const UNKNOWN_ROUTE: &str = "@@router/UNKNOWN_ROUTE";

pub use dependencies::{Dependencies, Dependency};
pub use errors::{ConfigError, ErrorCode, NavigationError};
pub use events::{channels, EventPayload, Subscription};
pub use lifecycle::{GuardOutcome, GuardRejection, GuardResult, GuardSpec, RedirectTarget};
pub use options::{Limits, NavigationOptions, Options};
pub use params::Params;
pub use plugins::{Plugin, PluginFactory, PluginHandle};
pub use router::Router;
pub use routes::{RouteDefinition, RoutePatch};
pub use state::{are_states_equal, ForwardedState, State, StateMeta};
