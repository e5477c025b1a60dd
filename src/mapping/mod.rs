//! Custom key mapping.
//!
//! A [`CustomKeyMapping`] re-exposes registered queries under names the
//! caller chooses (`{user_key -> query_key}`). The mapper built from it checks
//! the mapping against an engine's registry and runs it.

pub mod predefined;

use std::collections::HashMap;
use std::fmt;

use futures::future::join_all;
use serde::de::{MapAccess, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Deserializer, Serialize};

use crate::query::{
    BatchOutcome, ExecutionMode, QueryEngine, QueryExecutionContext, QueryMatch, QueryResult,
};

/// Ordered `user_key -> query_key` table.
///
/// Serializes as a plain map and keeps insertion order. Inserting an existing
/// user key replaces its query key in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomKeyMapping {
    entries: Vec<(String, String)>,
}

impl CustomKeyMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, user_key: impl Into<String>, query_key: impl Into<String>) -> Self {
        self.insert(user_key, query_key);
        self
    }

    /// Map a user key to a query key, returning the previous query key.
    pub fn insert(
        &mut self,
        user_key: impl Into<String>,
        query_key: impl Into<String>,
    ) -> Option<String> {
        let user_key = user_key.into();
        let query_key = query_key.into();
        match self.entries.iter_mut().find(|(u, _)| *u == user_key) {
            Some((_, existing)) => Some(std::mem::replace(existing, query_key)),
            None => {
                self.entries.push((user_key, query_key));
                None
            }
        }
    }

    /// Query key for a user key.
    pub fn get(&self, user_key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(u, _)| u == user_key)
            .map(|(_, q)| q.as_str())
    }

    /// `(user_key, query_key)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(u, q)| (u.as_str(), q.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bind this mapping to an engine. Never fails; problems are reported by
    /// [`CustomKeyMapper::validate`].
    pub fn create_mapper<'e>(&self, engine: &'e QueryEngine) -> CustomKeyMapper<'e> {
        CustomKeyMapper::new(engine, self.clone())
    }
}

impl<U, Q> FromIterator<(U, Q)> for CustomKeyMapping
where
    U: Into<String>,
    Q: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (U, Q)>>(iter: I) -> Self {
        let mut mapping = CustomKeyMapping::new();
        for (user_key, query_key) in iter {
            mapping.insert(user_key, query_key);
        }
        mapping
    }
}

impl Serialize for CustomKeyMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(u, q)| (u, q)))
    }
}

impl<'de> Deserialize<'de> for CustomKeyMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MappingVisitor;

        impl<'de> Visitor<'de> for MappingVisitor {
            type Value = CustomKeyMapping;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of user keys to query keys")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut mapping = CustomKeyMapping::new();
                while let Some((user_key, query_key)) = access.next_entry::<String, String>()? {
                    mapping.insert(user_key, query_key);
                }
                Ok(mapping)
            }
        }

        deserializer.deserialize_map(MappingVisitor)
    }
}

/// Outcome of [`CustomKeyMapper::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// A mapping bound to an engine.
#[derive(Debug, Clone)]
pub struct CustomKeyMapper<'e> {
    engine: &'e QueryEngine,
    mapping: CustomKeyMapping,
}

impl<'e> CustomKeyMapper<'e> {
    pub fn new(engine: &'e QueryEngine, mapping: CustomKeyMapping) -> Self {
        Self { engine, mapping }
    }

    pub fn mapping(&self) -> &CustomKeyMapping {
        &self.mapping
    }

    /// User keys in mapping order.
    pub fn user_keys(&self) -> Vec<&str> {
        self.mapping.iter().map(|(u, _)| u).collect()
    }

    /// Distinct query keys, in order of first appearance.
    pub fn query_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for (_, query_key) in self.mapping.iter() {
            if !keys.contains(&query_key) {
                keys.push(query_key);
            }
        }
        keys
    }

    /// Check that every query key is registered.
    ///
    /// Language compatibility is not checked.
    pub fn validate(&self) -> MappingValidation {
        let registry = self.engine.registry();
        let errors: Vec<String> = self
            .mapping
            .iter()
            .filter(|(_, query_key)| !registry.has(query_key))
            .map(|(user_key, query_key)| {
                format!(
                    "query key '{}' for user key '{}' is not registered",
                    query_key, user_key
                )
            })
            .collect();

        MappingValidation {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Run every mapped query leniently, keyed by user key.
    pub async fn execute(
        &self,
        matches: &[QueryMatch],
        context: &QueryExecutionContext,
    ) -> HashMap<String, Vec<QueryResult>> {
        self.execute_batch(matches, context, ExecutionMode::Lenient)
            .await
            .into_results()
    }

    /// Run every mapped query, reporting failures by user key.
    pub async fn execute_batch(
        &self,
        matches: &[QueryMatch],
        context: &QueryExecutionContext,
        mode: ExecutionMode,
    ) -> BatchOutcome {
        let runs = self.mapping.iter().map(|(user_key, query_key)| async move {
            let result = self
                .engine
                .execute_isolated(query_key, matches, context, mode)
                .await;
            (user_key, result)
        });

        let mut outcome = BatchOutcome::new();
        for (user_key, result) in join_all(runs).await {
            outcome.record(user_key, result);
        }
        tracing::debug!(
            keys = self.mapping.len(),
            failed = outcome.failures.len(),
            file = %context.file_path,
            "executed custom mapping"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{
        AstNode, Capture, Language, MatchProcessor, Position, QueryError, QueryFunction,
    };

    fn engine() -> QueryEngine {
        let engine = QueryEngine::new();
        for name in ["ts-a", "ts-b"] {
            let function = QueryFunction::builder(name)
                .description("test")
                .query("(identifier) @name")
                .language(Language::TYPESCRIPT)
                .result_type(name)
                .processor(MatchProcessor)
                .build()
                .unwrap();
            engine.registry().register(function);
        }
        engine
    }

    fn inputs() -> (Vec<QueryMatch>, QueryExecutionContext) {
        let node = AstNode::new("identifier", "x", Position::new(0, 0), Position::new(0, 1));
        let matches = vec![QueryMatch::new(node.clone(), vec![Capture::new("name", node.clone())])];
        let context = QueryExecutionContext::new("x", Language::TYPESCRIPT, "a.ts", node);
        (matches, context)
    }

    #[test]
    fn test_insert_keeps_order_and_replaces() {
        let mut mapping = CustomKeyMapping::new().with("first", "ts-a").with("second", "ts-b");
        assert_eq!(mapping.insert("first", "ts-b"), Some("ts-a".to_string()));

        let pairs: Vec<(&str, &str)> = mapping.iter().collect();
        assert_eq!(pairs, vec![("first", "ts-b"), ("second", "ts-b")]);
        assert_eq!(mapping.get("second"), Some("ts-b"));
        assert_eq!(mapping.get("third"), None);
    }

    #[test]
    fn test_yaml_keeps_order() {
        let yaml = "zeta: ts-a\nalpha: ts-b\n";
        let mapping: CustomKeyMapping = serde_yaml::from_str(yaml).unwrap();
        let users: Vec<&str> = mapping.iter().map(|(u, _)| u).collect();
        assert_eq!(users, vec!["zeta", "alpha"]);

        let json = serde_json::to_string(&mapping).unwrap();
        assert_eq!(json, r#"{"zeta":"ts-a","alpha":"ts-b"}"#);
    }

    #[test]
    fn test_query_keys_are_distinct() {
        let engine = engine();
        let mapper = CustomKeyMapping::new()
            .with("one", "ts-a")
            .with("two", "ts-b")
            .with("three", "ts-a")
            .create_mapper(&engine);

        assert_eq!(mapper.user_keys(), vec!["one", "two", "three"]);
        assert_eq!(mapper.query_keys(), vec!["ts-a", "ts-b"]);
    }

    #[test]
    fn test_validate_names_both_keys() {
        let engine = engine();
        let mapper = CustomKeyMapping::new()
            .with("good", "ts-a")
            .with("bogus", "not-a-real-query")
            .create_mapper(&engine);

        let validation = mapper.validate();
        assert!(!validation.is_valid);
        assert_eq!(validation.errors.len(), 1);
        assert!(validation.errors[0].contains("bogus"));
        assert!(validation.errors[0].contains("not-a-real-query"));
    }

    #[tokio::test]
    async fn test_execute_rekeys_results() {
        let engine = engine();
        let mapper = CustomKeyMapping::new()
            .with("alpha", "ts-a")
            .with("missing", "ts-missing")
            .create_mapper(&engine);
        let (matches, context) = inputs();

        let results = mapper.execute(&matches, &context).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results["alpha"].len(), 1);
        assert_eq!(results["alpha"][0].query_name, "ts-a");
        assert!(results["missing"].is_empty());
    }

    #[tokio::test]
    async fn test_execute_batch_strict_keys_failures_by_user_key() {
        let engine = engine();
        let mapper = CustomKeyMapping::new()
            .with("alpha", "ts-a")
            .with("missing", "ts-missing")
            .create_mapper(&engine);
        let (matches, context) = inputs();

        let outcome = mapper
            .execute_batch(&matches, &context, ExecutionMode::Strict)
            .await;
        assert_eq!(outcome.failed_keys(), vec!["missing"]);
        assert!(matches!(outcome.failures["missing"], QueryError::NotFound(_)));
    }
}
