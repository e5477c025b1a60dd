//! Query execution.
//!
//! The engine resolves query keys through its registry and runs the
//! registered processors against matches computed upstream. It never
//! schedules work of its own: every method runs inside the caller's task.
//!
//! Execution is best-effort by default. An unknown key, or a key whose query
//! does not support the context's language, yields an empty result set so
//! one bad key cannot abort a batch. The `*_strict` variants and
//! [`ExecutionMode::Strict`] report those misses as errors instead.

use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;

use super::{
    Language, QueryError, QueryExecutionContext, QueryFunction, QueryMatch, QueryRegistry,
    QueryResult,
};

/// Priorities outside this range are flagged by [`QueryEngine::validate`].
pub const PRIORITY_RANGE: RangeInclusive<i32> = 0..=100;

/// How lookup misses are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Unknown keys and language mismatches produce empty results.
    #[default]
    Lenient,
    /// Unknown keys and language mismatches are errors.
    Strict,
}

/// Per-key results of a batch, plus the keys that failed.
///
/// A failed key still has an (empty) entry in `results`.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub results: HashMap<String, Vec<QueryResult>>,
    pub failures: HashMap<String, QueryError>,
}

impl BatchOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one key.
    pub fn record(
        &mut self,
        key: impl Into<String>,
        outcome: Result<Vec<QueryResult>, QueryError>,
    ) {
        let key = key.into();
        match outcome {
            Ok(results) => {
                self.results.insert(key, results);
            }
            Err(err) => {
                tracing::warn!(query = %key, error = %err, "query failed");
                self.results.insert(key.clone(), Vec::new());
                self.failures.insert(key, err);
            }
        }
    }

    /// Whether every key succeeded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Keys that failed, sorted.
    pub fn failed_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.failures.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        keys
    }

    /// Total number of results across all keys.
    pub fn result_count(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }

    pub fn into_results(self) -> HashMap<String, Vec<QueryResult>> {
        self.results
    }
}

/// Outcome of [`QueryEngine::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub warnings: Vec<String>,
}

/// Executes registered queries.
#[derive(Debug, Default)]
pub struct QueryEngine {
    registry: Arc<QueryRegistry>,
}

impl QueryEngine {
    /// Create an engine with its own empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine over an existing (possibly shared) registry.
    pub fn with_registry(registry: Arc<QueryRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this engine reads.
    pub fn registry(&self) -> &QueryRegistry {
        &self.registry
    }

    /// A shared handle to the registry.
    pub fn shared_registry(&self) -> Arc<QueryRegistry> {
        Arc::clone(&self.registry)
    }

    fn resolve(&self, key: &str, language: &Language) -> Result<Arc<QueryFunction>, QueryError> {
        let function = self
            .registry
            .get(key)
            .ok_or_else(|| QueryError::NotFound(key.to_string()))?;
        if !function.supports(language) {
            return Err(QueryError::LanguageMismatch {
                key: key.to_string(),
                language: language.to_string(),
            });
        }
        Ok(function)
    }

    async fn dispatch(
        &self,
        function: &QueryFunction,
        matches: &[QueryMatch],
        context: &QueryExecutionContext,
    ) -> Result<Vec<QueryResult>, QueryError> {
        tracing::debug!(
            query = function.name(),
            matches = matches.len(),
            file = %context.file_path,
            "executing query"
        );
        function.run(matches, context).await
    }

    /// Execute one query.
    ///
    /// Returns an empty result set when the key is unknown or does not
    /// support `context.language`. Processor failures are returned as
    /// [`QueryError::Processor`].
    pub async fn execute(
        &self,
        key: &str,
        matches: &[QueryMatch],
        context: &QueryExecutionContext,
    ) -> Result<Vec<QueryResult>, QueryError> {
        match self.resolve(key, &context.language) {
            Ok(function) => self.dispatch(&function, matches, context).await,
            Err(miss) => {
                tracing::debug!(query = key, reason = %miss, "skipping query");
                Ok(Vec::new())
            }
        }
    }

    /// Execute one query, reporting unknown keys and language mismatches as
    /// errors.
    pub async fn execute_strict(
        &self,
        key: &str,
        matches: &[QueryMatch],
        context: &QueryExecutionContext,
    ) -> Result<Vec<QueryResult>, QueryError> {
        let function = self.resolve(key, &context.language)?;
        self.dispatch(&function, matches, context).await
    }

    /// Execute one query inside a failure boundary.
    ///
    /// Processor panics are caught and reported as [`QueryError::Panicked`].
    pub async fn execute_isolated(
        &self,
        key: &str,
        matches: &[QueryMatch],
        context: &QueryExecutionContext,
        mode: ExecutionMode,
    ) -> Result<Vec<QueryResult>, QueryError> {
        let attempt = async {
            match mode {
                ExecutionMode::Lenient => self.execute(key, matches, context).await,
                ExecutionMode::Strict => self.execute_strict(key, matches, context).await,
            }
        };

        match AssertUnwindSafe(attempt).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => Err(QueryError::Panicked {
                key: key.to_string(),
                message: panic_message(payload),
            }),
        }
    }

    /// Execute several queries, each in its own failure boundary.
    pub async fn execute_batch<K: AsRef<str>>(
        &self,
        keys: &[K],
        matches: &[QueryMatch],
        context: &QueryExecutionContext,
        mode: ExecutionMode,
    ) -> BatchOutcome {
        let runs = keys.iter().map(|key| {
            let key = key.as_ref();
            async move { (key, self.execute_isolated(key, matches, context, mode).await) }
        });

        let mut outcome = BatchOutcome::new();
        for (key, result) in join_all(runs).await {
            outcome.record(key, result);
        }
        outcome
    }

    /// Execute several queries leniently.
    ///
    /// Every requested key gets an entry; a key whose processor failed maps
    /// to an empty list. Use [`execute_batch`](Self::execute_batch) to see
    /// the failures.
    pub async fn execute_multiple<K: AsRef<str>>(
        &self,
        keys: &[K],
        matches: &[QueryMatch],
        context: &QueryExecutionContext,
    ) -> HashMap<String, Vec<QueryResult>> {
        self.execute_batch(keys, matches, context, ExecutionMode::Lenient)
            .await
            .into_results()
    }

    /// Execute the keys whose registered priority is at least `min_priority`.
    ///
    /// Keys below the threshold, and unknown keys, are absent from the map.
    pub async fn execute_by_priority<K: AsRef<str>>(
        &self,
        keys: &[K],
        matches: &[QueryMatch],
        context: &QueryExecutionContext,
        min_priority: i32,
    ) -> HashMap<String, Vec<QueryResult>> {
        let selected = self.keys_at_priority(keys, min_priority);
        self.execute_multiple(&selected, matches, context).await
    }

    /// The registered keys among `keys` with priority `>= min_priority`.
    pub fn keys_at_priority<K: AsRef<str>>(&self, keys: &[K], min_priority: i32) -> Vec<String> {
        keys.iter()
            .map(AsRef::as_ref)
            .filter(|key| {
                self.registry
                    .get(key)
                    .map(|f| f.priority() >= min_priority)
                    .unwrap_or(false)
            })
            .map(str::to_string)
            .collect()
    }

    /// Read-only health check of the registry.
    pub fn validate(&self) -> ValidationReport {
        let mut warnings = Vec::new();
        let mut result_types: HashMap<(Language, String), String> = HashMap::new();

        for function in self.registry.all_queries() {
            let name = function.name();
            if function.languages().is_empty() {
                warnings.push(format!("query '{}' declares no languages", name));
            }
            if function.query().trim().is_empty() {
                warnings.push(format!("query '{}' has an empty pattern", name));
            }
            if function.description().trim().is_empty() {
                warnings.push(format!("query '{}' has no description", name));
            }
            if !PRIORITY_RANGE.contains(&function.priority()) {
                warnings.push(format!(
                    "query '{}' has priority {} outside {}..={}",
                    name,
                    function.priority(),
                    PRIORITY_RANGE.start(),
                    PRIORITY_RANGE.end()
                ));
            }
            for language in function.languages() {
                let slot = (language.clone(), function.result_type().to_string());
                match result_types.entry(slot) {
                    Entry::Occupied(existing) => warnings.push(format!(
                        "queries '{}' and '{}' both produce '{}' results for {}",
                        existing.get(),
                        name,
                        function.result_type(),
                        language
                    )),
                    Entry::Vacant(vacant) => {
                        vacant.insert(name.to_string());
                    }
                }
            }
        }

        ValidationReport {
            is_valid: warnings.is_empty(),
            warnings,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{processor_fn, AstNode, Capture, MatchProcessor, MatchRecord, Position};

    fn node(kind: &str, text: &str) -> AstNode {
        AstNode::new(kind, text, Position::new(0, 0), Position::new(0, text.len()))
    }

    fn context(language: Language) -> QueryExecutionContext {
        QueryExecutionContext::new("x", language, "test.src", node("root", "x"))
    }

    fn matches() -> Vec<QueryMatch> {
        vec![QueryMatch::new(
            node("identifier", "x"),
            vec![Capture::new("name", node("identifier", "x"))],
        )]
    }

    fn query(name: &str, language: Language, priority: i32) -> QueryFunction {
        QueryFunction::builder(name)
            .description("test")
            .query("(identifier) @name")
            .language(language)
            .priority(priority)
            .result_type(name)
            .processor(MatchProcessor)
            .build()
            .unwrap()
    }

    fn failing(name: &str) -> QueryFunction {
        QueryFunction::builder(name)
            .description("fails")
            .query("(identifier) @name")
            .language(Language::GO)
            .processor(processor_fn(|_m: &[QueryMatch], _c: &QueryExecutionContext| {
                Err::<Vec<MatchRecord>, _>(anyhow::anyhow!("processor exploded"))
            }))
            .build()
            .unwrap()
    }

    fn panic_now(
        _: &[QueryMatch],
        _: &QueryExecutionContext,
    ) -> anyhow::Result<Vec<MatchRecord>> {
        panic!("processor panicked")
    }

    fn panicking(name: &str) -> QueryFunction {
        QueryFunction::builder(name)
            .description("panics")
            .query("(identifier) @name")
            .language(Language::GO)
            .processor(processor_fn(panic_now))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_execute_found() {
        let engine = QueryEngine::new();
        engine.registry().register(query("go-a", Language::GO, 50));

        let results = engine
            .execute("go-a", &matches(), &context(Language::GO))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].query_name, "go-a");
    }

    #[tokio::test]
    async fn test_execute_lenient_misses() {
        let engine = QueryEngine::new();
        engine.registry().register(query("go-a", Language::GO, 50));

        let unknown = engine
            .execute("go-missing", &matches(), &context(Language::GO))
            .await
            .unwrap();
        assert!(unknown.is_empty());

        let mismatch = engine
            .execute("go-a", &matches(), &context(Language::JAVA))
            .await
            .unwrap();
        assert!(mismatch.is_empty());
    }

    #[tokio::test]
    async fn test_execute_strict_misses() {
        let engine = QueryEngine::new();
        engine.registry().register(query("go-a", Language::GO, 50));

        let err = engine
            .execute_strict("go-missing", &matches(), &context(Language::GO))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::NotFound(_)));

        let err = engine
            .execute_strict("go-a", &matches(), &context(Language::JAVA))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::LanguageMismatch { .. }));
    }

    #[tokio::test]
    async fn test_execute_multiple_isolates_errors() {
        let engine = QueryEngine::new();
        engine.registry().register(query("go-a", Language::GO, 50));
        engine.registry().register(failing("go-broken"));

        let results = engine
            .execute_multiple(&["go-a", "go-broken"], &matches(), &context(Language::GO))
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results["go-a"].len(), 1);
        assert!(results["go-broken"].is_empty());
    }

    #[tokio::test]
    async fn test_execute_batch_isolates_panics() {
        let engine = QueryEngine::new();
        engine.registry().register(query("go-a", Language::GO, 50));
        engine.registry().register(panicking("go-panics"));

        let outcome = engine
            .execute_batch(
                &["go-a", "go-panics"],
                &matches(),
                &context(Language::GO),
                ExecutionMode::Lenient,
            )
            .await;

        assert_eq!(outcome.results["go-a"].len(), 1);
        assert!(outcome.results["go-panics"].is_empty());
        assert_eq!(outcome.failed_keys(), vec!["go-panics"]);
        match &outcome.failures["go-panics"] {
            QueryError::Panicked { message, .. } => assert!(message.contains("processor panicked")),
            other => panic!("unexpected failure: {other}"),
        }
        assert!(!outcome.is_complete());
    }

    #[tokio::test]
    async fn test_execute_batch_strict_reports_misses() {
        let engine = QueryEngine::new();
        engine.registry().register(query("go-a", Language::GO, 50));

        let outcome = engine
            .execute_batch(
                &["go-a", "go-typo"],
                &matches(),
                &context(Language::GO),
                ExecutionMode::Strict,
            )
            .await;
        assert_eq!(outcome.result_count(), 1);
        assert!(outcome.failures["go-typo"].is_lookup_miss());
    }

    #[tokio::test]
    async fn test_execute_by_priority() {
        let engine = QueryEngine::new();
        engine.registry().register(query("go-high", Language::GO, 90));
        engine.registry().register(query("go-low", Language::GO, 20));

        let results = engine
            .execute_by_priority(
                &["go-high", "go-low", "go-unknown"],
                &matches(),
                &context(Language::GO),
                50,
            )
            .await;

        assert_eq!(results.len(), 1);
        assert!(results.contains_key("go-high"));
        assert!(!results.contains_key("go-low"));
        assert!(!results.contains_key("go-unknown"));
    }

    #[test]
    fn test_validate_clean_registry() {
        let engine = QueryEngine::new();
        engine.registry().register(query("go-a", Language::GO, 50));
        engine.registry().register(query("go-b", Language::GO, 60));

        let report = engine.validate();
        assert!(report.is_valid, "unexpected warnings: {:?}", report.warnings);
    }

    #[test]
    fn test_validate_flags_problems() {
        let engine = QueryEngine::new();
        let no_languages = QueryFunction::builder("x-none")
            .description("nothing")
            .query("(identifier) @name")
            .processor(MatchProcessor)
            .build()
            .unwrap();
        engine.registry().register(no_languages);
        engine.registry().register(query("go-out-of-range", Language::GO, 500));

        let duplicate = QueryFunction::builder("go-dup")
            .description("same result type")
            .query("(identifier) @name")
            .language(Language::GO)
            .result_type("go-out-of-range")
            .processor(MatchProcessor)
            .build()
            .unwrap();
        engine.registry().register(duplicate);

        let report = engine.validate();
        assert!(!report.is_valid);
        assert!(report.warnings.iter().any(|w| w.contains("x-none") && w.contains("no languages")));
        assert!(report.warnings.iter().any(|w| w.contains("priority 500")));
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("go-dup") && w.contains("both produce")));
        assert_eq!(engine.registry().len(), 3, "validate must not mutate");
    }

    #[test]
    fn test_shared_registry() {
        let first = QueryEngine::new();
        let second = QueryEngine::with_registry(first.shared_registry());
        first.registry().register(query("go-a", Language::GO, 50));
        assert!(second.registry().has("go-a"));
    }
}
