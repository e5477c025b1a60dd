//! Query registry: query key -> [`QueryFunction`].
//!
//! The registry is shared state. It is written while packs register
//! (normally once at startup) and read on every execution. Reads and writes
//! are serialized by an `RwLock`, so each lookup sees a consistent snapshot,
//! but a `register`/`clear` racing an in-flight execution is not arbitrated:
//! the execution uses whatever its lookup observed.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{Language, QueryError, QueryFunction};

/// Table of registered queries keyed by name.
#[derive(Default)]
pub struct QueryRegistry {
    functions: RwLock<HashMap<String, Arc<QueryFunction>>>,
}

impl QueryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<QueryFunction>>> {
        self.functions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<QueryFunction>>> {
        self.functions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a query under its name, replacing any existing entry.
    ///
    /// Returns the replaced entry. Callers that need uniqueness should use
    /// [`register_strict`](Self::register_strict).
    pub fn register(&self, function: QueryFunction) -> Option<Arc<QueryFunction>> {
        let key = function.name().to_string();
        let previous = self.write().insert(key.clone(), Arc::new(function));
        if previous.is_some() {
            tracing::debug!(query = %key, "replaced registered query");
        } else {
            tracing::trace!(query = %key, "registered query");
        }
        previous
    }

    /// Register a query, failing if the name is already taken.
    pub fn register_strict(&self, function: QueryFunction) -> Result<(), QueryError> {
        let mut functions = self.write();
        if functions.contains_key(function.name()) {
            return Err(QueryError::Duplicate(function.name().to_string()));
        }
        functions.insert(function.name().to_string(), Arc::new(function));
        Ok(())
    }

    /// Remove a query, returning it if it was registered.
    pub fn unregister(&self, key: &str) -> Option<Arc<QueryFunction>> {
        self.write().remove(key)
    }

    /// Look up a query by key.
    pub fn get(&self, key: &str) -> Option<Arc<QueryFunction>> {
        self.read().get(key).cloned()
    }

    /// Whether a query is registered under the key.
    pub fn has(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// All registered keys, sorted.
    pub fn all_query_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Every registered query, sorted by key.
    pub fn all_queries(&self) -> Vec<Arc<QueryFunction>> {
        let mut queries: Vec<Arc<QueryFunction>> = self.read().values().cloned().collect();
        queries.sort_by(|a, b| a.name().cmp(b.name()));
        queries
    }

    /// Queries that declare support for the language, sorted by key.
    pub fn queries_for_language(&self, language: &Language) -> Vec<Arc<QueryFunction>> {
        let mut queries: Vec<Arc<QueryFunction>> = self
            .read()
            .values()
            .filter(|f| f.supports(language))
            .cloned()
            .collect();
        queries.sort_by(|a, b| a.name().cmp(b.name()));
        queries
    }

    /// Whether the key is registered and supports the language.
    pub fn supports_language(&self, key: &str, language: &Language) -> bool {
        self.read()
            .get(key)
            .map(|f| f.supports(language))
            .unwrap_or(false)
    }

    /// Remove every query.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Number of registered queries.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl std::fmt::Debug for QueryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRegistry")
            .field("keys", &self.all_query_keys())
            .finish()
    }
}
