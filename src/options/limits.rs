//! Hard caps for the bounded registries, with graduated thresholds.
//!
//! Every bounded registry (dependencies, plugins, middleware, listeners,
//! lifecycle handlers) admits new entries through [`Limits::admit`], which
//! logs a warning at 20% of the cap, an error at 50%, and refuses at 100%.
//! Caps can be overridden at process level through `WAYFARER_MAX_*`
//! environment variables.

use std::env;
use tracing::{error, warn};

use crate::errors::ConfigError;

/// Registry caps. All fields must be at least 1.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Entries in the dependency store (`WAYFARER_MAX_DEPENDENCIES`)
    pub max_dependencies: usize,
    /// Registered plugins (`WAYFARER_MAX_PLUGINS`)
    pub max_plugins: usize,
    /// Registered middleware (`WAYFARER_MAX_MIDDLEWARE`)
    pub max_middleware: usize,
    /// Listeners per event channel (`WAYFARER_MAX_LISTENERS`)
    pub max_listeners: usize,
    /// Re-entrant event emission depth (`WAYFARER_MAX_EVENT_DEPTH`)
    pub max_event_depth: usize,
    /// Guard registrations across both lifecycle registries
    /// (`WAYFARER_MAX_LIFECYCLE_HANDLERS`)
    pub max_lifecycle_handlers: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_dependencies: 100,
            max_plugins: 50,
            max_middleware: 50,
            max_listeners: 10_000,
            max_event_depth: 5,
            max_lifecycle_handlers: 200,
        }
    }
}

impl Limits {
    /// Load limits from environment variables, falling back to defaults for
    /// unset or unparsable values.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Limits::default();
        Limits {
            max_dependencies: env_limit("WAYFARER_MAX_DEPENDENCIES", defaults.max_dependencies),
            max_plugins: env_limit("WAYFARER_MAX_PLUGINS", defaults.max_plugins),
            max_middleware: env_limit("WAYFARER_MAX_MIDDLEWARE", defaults.max_middleware),
            max_listeners: env_limit("WAYFARER_MAX_LISTENERS", defaults.max_listeners),
            max_event_depth: env_limit("WAYFARER_MAX_EVENT_DEPTH", defaults.max_event_depth),
            max_lifecycle_handlers: env_limit(
                "WAYFARER_MAX_LIFECYCLE_HANDLERS",
                defaults.max_lifecycle_handlers,
            ),
        }
    }

    /// Admit one more entry into a registry currently holding `current`.
    ///
    /// Logs at the 20% and 50% thresholds, returns
    /// [`ConfigError::LimitExceeded`] once the cap is reached.
    pub(crate) fn admit(
        current: usize,
        limit: usize,
        what: &'static str,
    ) -> Result<(), ConfigError> {
        if current >= limit {
            error!(registry = what, limit = limit, "Registry hard limit reached");
            return Err(ConfigError::LimitExceeded { what, limit });
        }
        let next = current + 1;
        if next * 2 >= limit {
            error!(
                registry = what,
                count = next,
                limit = limit,
                "Registry past 50% of its hard limit"
            );
        } else if next * 5 >= limit {
            warn!(
                registry = what,
                count = next,
                limit = limit,
                "Registry past 20% of its hard limit"
            );
        }
        Ok(())
    }
}

fn env_limit(key: &str, default: usize) -> usize {
    match env::var(key) {
        Ok(val) => match val.parse::<usize>() {
            Ok(n) if n >= 1 => n,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_refuses_at_cap() {
        assert!(Limits::admit(0, 2, "test registry").is_ok());
        assert!(Limits::admit(1, 2, "test registry").is_ok());
        assert!(matches!(
            Limits::admit(2, 2, "test registry"),
            Err(ConfigError::LimitExceeded { limit: 2, .. })
        ));
    }

    #[test]
    fn test_defaults() {
        let limits = Limits::default();
        assert_eq!(limits.max_dependencies, 100);
        assert_eq!(limits.max_plugins, 50);
        assert_eq!(limits.max_middleware, 50);
        assert_eq!(limits.max_listeners, 10_000);
        assert_eq!(limits.max_event_depth, 5);
        assert_eq!(limits.max_lifecycle_handlers, 200);
    }
}
