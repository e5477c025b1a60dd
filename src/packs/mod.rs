//! Language query packs.
//!
//! Each pack is independent: it exposes `<lang>_queries()` for introspection
//! and `register_<lang>_queries(engine)` to install its queries. Query names
//! are `<prefix>-<feature>` with the prefixes `ts-`, `js-`, `java-`,
//! `python-` and `go-`.
//!
//! # Adding a Language
//!
//! Add a module with a `<lang>_queries()` catalogue and a
//! `register_<lang>_queries` entry point, then call it from
//! [`register_all`]. The engine needs no changes.

use std::collections::BTreeMap;

use crate::query::{QueryEngine, QueryError, QueryFunction};

pub mod common;
pub mod go;
pub mod java;
pub mod javascript;
pub mod python;
pub mod typescript;

pub use go::{go_queries, register_go_queries};
pub use java::{java_queries, register_java_queries};
pub use javascript::{javascript_queries, register_javascript_queries};
pub use python::{python_queries, register_python_queries};
pub use typescript::{register_typescript_queries, typescript_queries};

/// A pack's name and its entry points.
pub struct Pack {
    pub name: &'static str,
    pub queries: fn() -> Result<BTreeMap<String, QueryFunction>, QueryError>,
    pub register: fn(&QueryEngine) -> Result<usize, QueryError>,
}

/// Every shipped pack.
pub static PACKS: &[Pack] = &[
    Pack {
        name: "typescript",
        queries: typescript_queries,
        register: register_typescript_queries,
    },
    Pack {
        name: "javascript",
        queries: javascript_queries,
        register: register_javascript_queries,
    },
    Pack {
        name: "java",
        queries: java_queries,
        register: register_java_queries,
    },
    Pack {
        name: "python",
        queries: python_queries,
        register: register_python_queries,
    },
    Pack {
        name: "go",
        queries: go_queries,
        register: register_go_queries,
    },
];

pub(crate) fn register_pack(
    engine: &QueryEngine,
    pack: &str,
    queries: BTreeMap<String, QueryFunction>,
) -> Result<usize, QueryError> {
    let count = queries.len();
    for query in queries.into_values() {
        engine.registry().register(query);
    }
    tracing::debug!(pack, count, "registered query pack");
    Ok(count)
}

/// Register every shipped pack. Returns the number of queries registered.
pub fn register_all(engine: &QueryEngine) -> Result<usize, QueryError> {
    let mut total = 0;
    for pack in PACKS {
        total += (pack.register)(engine)?;
    }
    Ok(total)
}

/// A new engine with every shipped pack registered.
pub fn standard_engine() -> Result<QueryEngine, QueryError> {
    let engine = QueryEngine::new();
    register_all(&engine)?;
    Ok(engine)
}
