//! Named dependency injection for guards, middleware, and plugins.
//!
//! A bounded, concurrent map from name to `Arc<dyn Any>`. Factories receive
//! the store at registration time and pull what they need with the typed
//! accessor. Keys carry no inherited entries of any kind; only what was
//! explicitly set can be read back.

use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;

use crate::errors::ConfigError;
use crate::options::Limits;

/// A value stored in the dependency map.
pub type Dependency = Arc<dyn Any + Send + Sync>;

/// Bounded named injection map shared by all extension points.
pub struct Dependencies {
    entries: DashMap<String, Dependency>,
    max_entries: usize,
}

impl Dependencies {
    pub(crate) fn new(max_entries: usize) -> Self {
        Dependencies {
            entries: DashMap::new(),
            max_entries,
        }
    }

    /// Insert or overwrite a dependency. Overwrites do not count against
    /// the limit.
    pub fn set(&self, name: impl Into<String>, value: Dependency) -> Result<(), ConfigError> {
        let name = name.into();
        if !self.entries.contains_key(&name) {
            Limits::admit(self.entries.len(), self.max_entries, "dependency")?;
        }
        self.entries.insert(name, value);
        Ok(())
    }

    /// Insert a batch; stops at the first failure.
    pub fn set_many(
        &self,
        values: impl IntoIterator<Item = (String, Dependency)>,
    ) -> Result<(), ConfigError> {
        for (name, value) in values {
            self.set(name, value)?;
        }
        Ok(())
    }

    /// Fetch a dependency by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Dependency> {
        self.entries.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Fetch a dependency and downcast it to a concrete type.
    #[must_use]
    pub fn get_as<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.get(name).and_then(|dep| dep.downcast::<T>().ok())
    }

    /// Whether a dependency with this name exists.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Remove a dependency; returns whether it existed.
    pub fn remove(&self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    /// Drop every entry.
    pub fn reset(&self) {
        self.entries.clear();
    }

    /// Names of all registered dependencies.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of registered dependencies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_typed() {
        let deps = Dependencies::new(10);
        deps.set("answer", Arc::new(42u32) as Dependency).unwrap();
        assert_eq!(deps.get_as::<u32>("answer").as_deref(), Some(&42));
        assert!(deps.get_as::<String>("answer").is_none());
        assert!(deps.get("missing").is_none());
    }

    #[test]
    fn test_limit_counts_distinct_names_only() {
        let deps = Dependencies::new(2);
        deps.set("a", Arc::new(1u8) as Dependency).unwrap();
        deps.set("a", Arc::new(2u8) as Dependency).unwrap();
        deps.set("b", Arc::new(3u8) as Dependency).unwrap();
        assert!(deps.set("c", Arc::new(4u8) as Dependency).is_err());
        assert_eq!(deps.get_as::<u8>("a").as_deref(), Some(&2));
    }

    #[test]
    fn test_remove_and_reset() {
        let deps = Dependencies::new(10);
        deps.set("a", Arc::new(1u8) as Dependency).unwrap();
        assert!(deps.remove("a"));
        assert!(!deps.remove("a"));
        deps.set("b", Arc::new(2u8) as Dependency).unwrap();
        deps.reset();
        assert!(deps.is_empty());
    }
}
