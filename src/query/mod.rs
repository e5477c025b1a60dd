//! Query registry and engine.
//!
//! Packs define [`QueryFunction`]s and register them in a [`QueryRegistry`];
//! the [`QueryEngine`] dispatches matches computed upstream to the
//! registered processors and returns uniform [`QueryResult`]s.

mod engine;
mod error;
mod function;
mod language;
mod model;
mod registry;

pub use engine::{BatchOutcome, ExecutionMode, QueryEngine, ValidationReport, PRIORITY_RANGE};
pub use error::QueryError;
pub use function::{
    pattern_captures, processor_fn, AsyncQueryProcessor, MatchProcessor, ProcessorFn,
    QueryFunction, QueryFunctionBuilder, QueryProcessor, DEFAULT_PRIORITY,
};
pub use language::Language;
pub use model::{
    AstNode, Capture, Descendants, Location, MatchRecord, Position, QueryExecutionContext,
    QueryMatch, QueryRecord, QueryResult,
};
pub use registry::QueryRegistry;
