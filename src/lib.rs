//! astquery - query-based AST analysis.
//!
//! Analysis is expressed as named queries. Each query pairs a tree-sitter
//! pattern with a processor that turns the pattern's matches into typed
//! records (imports, exports, definitions, semantic tags). Queries live in
//! a registry, run through an engine, and can be renamed per consumer with
//! a custom key mapping.
//!
//! # Architecture
//!
//! - `query`: registry, engine, query functions and the shared data model
//! - `mapping`: custom key mappings and the predefined mapping catalogue
//! - `packs`: per-language query packs (TypeScript, JavaScript, Java,
//!   Python, Go)
//! - `source`: tree-sitter adapter producing matches and contexts
//! - `runner`: applies a query selection to many files
//! - `config`: YAML config schema
//! - `report`: output formatting (pretty, JSON)
//!
//! # Adding a New Language
//!
//! See `src/packs/` for examples. Write a `<lang>_queries()` catalogue and a
//! `register_<lang>_queries` entry point, then add it to `packs::PACKS`.

pub mod cli;
pub mod config;
pub mod mapping;
pub mod packs;
pub mod query;
pub mod report;
#[cfg(feature = "tree-sitter")]
pub mod runner;
#[cfg(feature = "tree-sitter")]
pub mod source;

use once_cell::sync::Lazy;

pub use config::Config;
pub use mapping::{CustomKeyMapper, CustomKeyMapping, MappingValidation};
pub use packs::{register_all, standard_engine};
pub use query::{
    processor_fn, ExecutionMode, Language, QueryEngine, QueryError, QueryExecutionContext,
    QueryFunction, QueryMatch, QueryProcessor, QueryRegistry, QueryResult,
};
#[cfg(feature = "tree-sitter")]
pub use runner::{RunOptions, RunReport, Runner, Selection};
#[cfg(feature = "tree-sitter")]
pub use source::ParsedSource;

static DEFAULT_ENGINE: Lazy<QueryEngine> = Lazy::new(|| {
    let engine = QueryEngine::new();
    if let Err(e) = packs::register_all(&engine) {
        tracing::error!(error = %e, "failed to register query packs");
    }
    engine
});

/// A process-wide engine with every shipped pack registered.
///
/// Prefer constructing an engine with [`standard_engine`] and passing it
/// explicitly; this exists for callers that want one shared instance.
pub fn default_engine() -> &'static QueryEngine {
    &DEFAULT_ENGINE
}
