//! # Router Module
//!
//! The public façade over every subsystem: route definitions, path
//! matching and building, the state namespace, events, plugins, guards,
//! middleware, dependencies, and the navigation pipeline.
//!
//! ## Lifecycle
//!
//! A router is constructed with [`crate::options::Options`], populated with
//! routes, then started with an initial path (or an empty path to use the
//! configured default route). Navigation is only possible between `start`
//! and `stop`.
//!
//! ## Concurrency
//!
//! The router is `Send + Sync`. Navigations block their calling thread;
//! issuing a navigation from another thread while one is in flight cancels
//! the earlier one. Route mutations rebuild the compiled table and swap it
//! atomically, so a transition started before a mutation keeps resolving
//! against the snapshot it began with.

mod core;
mod lifecycle;

pub use core::Router;
