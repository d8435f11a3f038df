//! Error types for the routing engine.
//!
//! Two orthogonal families:
//!
//! - [`ConfigError`] - structural errors raised synchronously at the API
//!   boundary (invalid names, cyclic forwards, exceeded limits). These
//!   indicate programmer error and are never translated into transition
//!   events.
//! - [`NavigationError`] - operational errors produced by the transition
//!   pipeline (guard denial, cancellation, same-state navigation). These
//!   surface both as the return value of `navigate` and as the payload of
//!   `TRANSITION_ERROR` events.

use std::fmt;

/// Classification codes carried by every [`NavigationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Navigation was requested before `start` completed
    RouterNotStarted,
    /// `start` was called while the router was already active
    RouterAlreadyStarted,
    /// `start` had neither a usable path nor a configured default route
    NoStartPathOrState,
    /// The requested route name or path resolved to nothing
    RouteNotFound,
    /// The target state equals the current state and neither `reload` nor
    /// `force` was set
    SameStates,
    /// A `can_deactivate` guard denied the transition
    CannotDeactivate,
    /// A `can_activate` guard denied the transition
    CannotActivate,
    /// A middleware failed or an unclassified pipeline error occurred
    TransitionErr,
    /// The transition was cancelled by a newer navigation, `cancel()`, or
    /// `stop()`
    TransitionCancelled,
}

impl ErrorCode {
    /// Wire-format name of the code, stable across releases.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RouterNotStarted => "ROUTER_NOT_STARTED",
            ErrorCode::RouterAlreadyStarted => "ROUTER_ALREADY_STARTED",
            ErrorCode::NoStartPathOrState => "NO_START_PATH_OR_STATE",
            ErrorCode::RouteNotFound => "ROUTE_NOT_FOUND",
            ErrorCode::SameStates => "SAME_STATES",
            ErrorCode::CannotDeactivate => "CANNOT_DEACTIVATE",
            ErrorCode::CannotActivate => "CANNOT_ACTIVATE",
            ErrorCode::TransitionErr => "TRANSITION_ERR",
            ErrorCode::TransitionCancelled => "TRANSITION_CANCELLED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operational error flowing out of the transition pipeline.
///
/// Carries the classification [`ErrorCode`], an optional human-readable
/// message (for guard rejections this is the rejection reason), and the
/// route names of the attempted transition.
#[derive(Debug, Clone)]
pub struct NavigationError {
    /// Classification of the failure
    pub code: ErrorCode,
    /// Optional detail, e.g. a guard rejection reason
    pub message: Option<String>,
    /// Name of the target route, when known
    pub to: Option<String>,
    /// Name of the route the transition started from, when known
    pub from: Option<String>,
    /// Route segment whose guard produced the failure, when applicable
    pub segment: Option<String>,
}

impl NavigationError {
    /// Create an error with no message or context.
    #[must_use]
    pub fn new(code: ErrorCode) -> Self {
        NavigationError {
            code,
            message: None,
            to: None,
            from: None,
            segment: None,
        }
    }

    /// Create an error carrying a detail message.
    #[must_use]
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        NavigationError {
            code,
            message: Some(message.into()),
            to: None,
            from: None,
            segment: None,
        }
    }

    pub(crate) fn context(mut self, to: Option<&str>, from: Option<&str>) -> Self {
        self.to = to.map(str::to_string);
        self.from = from.map(str::to_string);
        self
    }

    pub(crate) fn segment(mut self, segment: &str) -> Self {
        self.segment = Some(segment.to_string());
        self
    }
}

impl fmt::Display for NavigationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        if let Some(seg) = &self.segment {
            write!(f, " (segment: {seg})")?;
        }
        match (&self.to, &self.from) {
            (Some(to), Some(from)) => write!(f, " [{from} -> {to}]"),
            (Some(to), None) => write!(f, " [-> {to}]"),
            _ => Ok(()),
        }
    }
}

impl std::error::Error for NavigationError {}

/// Structural error raised synchronously at the API boundary.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Route name is empty, contains dots, or uses characters outside
    /// `[a-zA-Z0-9-_]`
    InvalidRouteName {
        /// The offending name
        name: String,
        /// What the validator objected to
        reason: String,
    },
    /// Path pattern failed to parse
    InvalidPath {
        /// The offending pattern
        path: String,
        /// What the parser objected to
        reason: String,
    },
    /// A sibling with the same local name already exists
    DuplicateRoute {
        /// Full dotted name of the clashing route
        name: String,
    },
    /// No route is registered under the given name
    UnknownRoute {
        /// The name that failed to resolve
        name: String,
    },
    /// A forward chain revisits one of its own members
    CyclicForward {
        /// The chain as traversed, ending at the repeated name
        chain: Vec<String>,
    },
    /// A forward chain exceeds the maximum resolution depth
    ForwardDepthExceeded {
        /// Route where resolution started
        source: String,
        /// Depth limit that was hit
        limit: usize,
    },
    /// Forward target declares URL params the source cannot supply
    ForwardParamMismatch {
        /// Forwarding route
        source: String,
        /// Forward target
        target: String,
        /// URL params of the target missing from the source
        missing: Vec<String>,
    },
    /// `build_path` was called without a declared URL parameter
    MissingUrlParam {
        /// Route being built
        route: String,
        /// Name of the absent parameter
        param: String,
    },
    /// A parameter value cannot be rendered into the requested position
    InvalidParamValue {
        /// Route being built
        route: String,
        /// Parameter name
        param: String,
        /// What was wrong with the value
        reason: String,
    },
    /// A parameter value failed its declared constraint
    ConstraintViolation {
        /// Route being matched or built
        route: String,
        /// Parameter name
        param: String,
        /// The rejected value
        value: String,
    },
    /// The same callback is already registered on this channel
    DuplicateListener {
        /// Event channel name
        channel: String,
    },
    /// A bounded registry reached its hard limit
    LimitExceeded {
        /// Which registry overflowed
        what: &'static str,
        /// The configured hard limit
        limit: usize,
    },
    /// The route is the current state or an ancestor of it
    RouteInUse {
        /// Full dotted name of the route
        name: String,
    },
    /// The operation is refused while a transition is in flight
    TransitionInProgress,
    /// The option is sealed once the router has started
    OptionSealed {
        /// Name of the sealed option
        option: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidRouteName { name, reason } => {
                write!(f, "invalid route name '{name}': {reason}")
            }
            ConfigError::InvalidPath { path, reason } => {
                write!(f, "invalid path pattern '{path}': {reason}")
            }
            ConfigError::DuplicateRoute { name } => {
                write!(f, "route '{name}' is already defined")
            }
            ConfigError::UnknownRoute { name } => {
                write!(f, "no route named '{name}'")
            }
            ConfigError::CyclicForward { chain } => {
                write!(f, "cyclic forward chain: {}", chain.join(" -> "))
            }
            ConfigError::ForwardDepthExceeded { source, limit } => {
                write!(
                    f,
                    "forward chain starting at '{source}' exceeds the maximum depth of {limit}"
                )
            }
            ConfigError::ForwardParamMismatch {
                source,
                target,
                missing,
            } => {
                write!(
                    f,
                    "cannot forward '{source}' to '{target}': target URL params [{}] are not \
                     declared by the source",
                    missing.join(", ")
                )
            }
            ConfigError::MissingUrlParam { route, param } => {
                write!(f, "cannot build '{route}': missing URL param '{param}'")
            }
            ConfigError::InvalidParamValue {
                route,
                param,
                reason,
            } => {
                write!(f, "invalid value for param '{param}' of '{route}': {reason}")
            }
            ConfigError::ConstraintViolation {
                route,
                param,
                value,
            } => {
                write!(
                    f,
                    "value '{value}' for param '{param}' of '{route}' violates its constraint"
                )
            }
            ConfigError::DuplicateListener { channel } => {
                write!(
                    f,
                    "listener is already registered on channel '{channel}'"
                )
            }
            ConfigError::LimitExceeded { what, limit } => {
                write!(f, "{what} limit of {limit} exceeded")
            }
            ConfigError::RouteInUse { name } => {
                write!(
                    f,
                    "route '{name}' is the current state or an ancestor of it and cannot be removed"
                )
            }
            ConfigError::TransitionInProgress => {
                write!(f, "operation refused while a transition is in progress")
            }
            ConfigError::OptionSealed { option } => {
                write!(f, "option '{option}' is sealed once the router has started")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
