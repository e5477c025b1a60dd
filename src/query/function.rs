//! Query definitions and the processor traits behind them.
//!
//! A [`QueryFunction`] pairs an opaque pattern string with a processor that
//! turns pattern matches into typed records. Processors are statically typed
//! where a pack defines them and type-erased once they enter the registry.

use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    Language, MatchRecord, QueryError, QueryExecutionContext, QueryMatch, QueryRecord, QueryResult,
};

/// Default priority for queries that do not set one.
pub const DEFAULT_PRIORITY: i32 = 50;

/// Turns the matches of one query into typed records.
///
/// Implementations must not touch shared mutable state and must accept any
/// well-formed input; an `Err` is treated as a processor fault.
pub trait QueryProcessor: Send + Sync {
    type Output: QueryRecord;

    fn process(
        &self,
        matches: &[QueryMatch],
        context: &QueryExecutionContext,
    ) -> anyhow::Result<Vec<Self::Output>>;
}

/// Asynchronous counterpart of [`QueryProcessor`].
pub trait AsyncQueryProcessor: Send + Sync {
    type Output: QueryRecord;

    fn process<'a>(
        &'a self,
        matches: &'a [QueryMatch],
        context: &'a QueryExecutionContext,
    ) -> BoxFuture<'a, anyhow::Result<Vec<Self::Output>>>;
}

/// Type-erased processor stored in the registry.
trait ErasedProcessor: Send + Sync {
    fn run<'a>(
        &'a self,
        query_name: &'a str,
        result_type: &'a str,
        matches: &'a [QueryMatch],
        context: &'a QueryExecutionContext,
    ) -> BoxFuture<'a, Result<Vec<QueryResult>, QueryError>>;
}

struct SyncSlot<P>(P);

impl<P: QueryProcessor> ErasedProcessor for SyncSlot<P> {
    fn run<'a>(
        &'a self,
        query_name: &'a str,
        result_type: &'a str,
        matches: &'a [QueryMatch],
        context: &'a QueryExecutionContext,
    ) -> BoxFuture<'a, Result<Vec<QueryResult>, QueryError>> {
        Box::pin(async move {
            let records = self
                .0
                .process(matches, context)
                .map_err(|e| QueryError::processor(query_name, e))?;
            stamp(query_name, result_type, &records)
        })
    }
}

struct AsyncSlot<P>(P);

impl<P: AsyncQueryProcessor> ErasedProcessor for AsyncSlot<P> {
    fn run<'a>(
        &'a self,
        query_name: &'a str,
        result_type: &'a str,
        matches: &'a [QueryMatch],
        context: &'a QueryExecutionContext,
    ) -> BoxFuture<'a, Result<Vec<QueryResult>, QueryError>> {
        Box::pin(async move {
            let records = self
                .0
                .process(matches, context)
                .await
                .map_err(|e| QueryError::processor(query_name, e))?;
            stamp(query_name, result_type, &records)
        })
    }
}

fn stamp<R: QueryRecord>(
    query_name: &str,
    result_type: &str,
    records: &[R],
) -> Result<Vec<QueryResult>, QueryError> {
    records
        .iter()
        .map(|r| QueryResult::from_record(query_name, result_type, r))
        .collect()
}

/// A closure-backed processor, see [`processor_fn`].
pub struct ProcessorFn<F, R> {
    f: F,
    _output: PhantomData<fn() -> R>,
}

/// Build a processor from a closure.
pub fn processor_fn<F, R>(f: F) -> ProcessorFn<F, R>
where
    F: Fn(&[QueryMatch], &QueryExecutionContext) -> anyhow::Result<Vec<R>> + Send + Sync,
    R: QueryRecord,
{
    ProcessorFn {
        f,
        _output: PhantomData,
    }
}

impl<F, R> QueryProcessor for ProcessorFn<F, R>
where
    F: Fn(&[QueryMatch], &QueryExecutionContext) -> anyhow::Result<Vec<R>> + Send + Sync,
    R: QueryRecord,
{
    type Output = R;

    fn process(
        &self,
        matches: &[QueryMatch],
        context: &QueryExecutionContext,
    ) -> anyhow::Result<Vec<R>> {
        (self.f)(matches, context)
    }
}

/// Emits one [`MatchRecord`] per match.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchProcessor;

impl QueryProcessor for MatchProcessor {
    type Output = MatchRecord;

    fn process(
        &self,
        matches: &[QueryMatch],
        context: &QueryExecutionContext,
    ) -> anyhow::Result<Vec<MatchRecord>> {
        Ok(matches
            .iter()
            .map(|m| MatchRecord::from_match(m, context))
            .collect())
    }
}

/// Capture names referenced in a pattern (`@name`).
pub fn pattern_captures(pattern: &str) -> BTreeSet<String> {
    static CAPTURE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"@([A-Za-z_][A-Za-z0-9_.\-]*)").expect("valid capture regex"));

    CAPTURE
        .captures_iter(pattern)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// A named, language-scoped pattern plus the processor for its matches.
///
/// Cloning is cheap: the processor is shared.
#[derive(Clone)]
pub struct QueryFunction {
    name: String,
    description: String,
    query: String,
    languages: Vec<Language>,
    priority: i32,
    result_type: String,
    expected_captures: Vec<String>,
    processor: Arc<dyn ErasedProcessor>,
}

impl QueryFunction {
    /// Start defining a query; `name` becomes its registry key.
    pub fn builder(name: impl Into<String>) -> QueryFunctionBuilder {
        QueryFunctionBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The opaque pattern string, interpreted only by the upstream matcher.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn result_type(&self) -> &str {
        &self.result_type
    }

    /// Capture names the processor reads from each match.
    pub fn expected_captures(&self) -> &[String] {
        &self.expected_captures
    }

    /// Whether this query declares support for the language.
    pub fn supports(&self, language: &Language) -> bool {
        self.languages.contains(language)
    }

    /// Run the processor and stamp every record with this query's name.
    pub async fn run(
        &self,
        matches: &[QueryMatch],
        context: &QueryExecutionContext,
    ) -> Result<Vec<QueryResult>, QueryError> {
        self.processor
            .run(&self.name, &self.result_type, matches, context)
            .await
    }
}

impl PartialEq for QueryFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.query == other.query
            && self.languages == other.languages
            && self.priority == other.priority
            && self.result_type == other.result_type
            && self.expected_captures == other.expected_captures
            && Arc::ptr_eq(&self.processor, &other.processor)
    }
}

impl fmt::Debug for QueryFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryFunction")
            .field("name", &self.name)
            .field("languages", &self.languages)
            .field("priority", &self.priority)
            .field("result_type", &self.result_type)
            .field("expected_captures", &self.expected_captures)
            .finish_non_exhaustive()
    }
}

/// Builder for [`QueryFunction`].
pub struct QueryFunctionBuilder {
    name: String,
    description: String,
    query: String,
    languages: Vec<Language>,
    priority: i32,
    result_type: Option<String>,
    expected_captures: Vec<String>,
    processor: Option<Arc<dyn ErasedProcessor>>,
}

impl QueryFunctionBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            query: String::new(),
            languages: Vec::new(),
            priority: DEFAULT_PRIORITY,
            result_type: None,
            expected_captures: Vec::new(),
            processor: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Add one supported language.
    pub fn language(mut self, language: Language) -> Self {
        if !self.languages.contains(&language) {
            self.languages.push(language);
        }
        self
    }

    /// Add several supported languages.
    pub fn languages<I>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = Language>,
    {
        for language in languages {
            self = self.language(language);
        }
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Result type tag; defaults to `"match"`.
    pub fn result_type(mut self, result_type: impl Into<String>) -> Self {
        self.result_type = Some(result_type.into());
        self
    }

    /// Declare the capture names the processor reads.
    pub fn captures(mut self, captures: &[&str]) -> Self {
        self.expected_captures = captures.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn processor<P>(mut self, processor: P) -> Self
    where
        P: QueryProcessor + 'static,
    {
        self.processor = Some(Arc::new(SyncSlot(processor)));
        self
    }

    pub fn async_processor<P>(mut self, processor: P) -> Self
    where
        P: AsyncQueryProcessor + 'static,
    {
        self.processor = Some(Arc::new(AsyncSlot(processor)));
        self
    }

    /// Finish the definition.
    ///
    /// Fails when the name is empty, no processor was given, or a declared
    /// capture is not referenced by the pattern.
    pub fn build(self) -> Result<QueryFunction, QueryError> {
        let invalid = |reason: String| QueryError::InvalidDefinition {
            name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }

        let processor = match &self.processor {
            Some(p) => Arc::clone(p),
            None => return Err(invalid("no processor".to_string())),
        };

        let referenced = pattern_captures(&self.query);
        let missing: Vec<&str> = self
            .expected_captures
            .iter()
            .filter(|c| !referenced.contains(c.as_str()))
            .map(|c| c.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(invalid(format!(
                "captures not referenced by the pattern: {}",
                missing.join(", ")
            )));
        }

        Ok(QueryFunction {
            result_type: self.result_type.clone().unwrap_or_else(|| "match".to_string()),
            name: self.name,
            description: self.description,
            query: self.query,
            languages: self.languages,
            priority: self.priority,
            expected_captures: self.expected_captures,
            processor,
        })
    }
}
