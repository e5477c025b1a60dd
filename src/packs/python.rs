//! Python query pack.

use std::collections::BTreeMap;

use super::common::{
    same_node, Annotation, FunctionDefinitionProcessor, Heritage, ImportRecord, ReturnTypeRule,
    SemanticTagProcessor, TypeDefinitionProcessor,
};
use super::register_pack;
use crate::query::{
    processor_fn, AstNode, Language, QueryEngine, QueryError, QueryExecutionContext, QueryFunction,
    QueryMatch,
};

const IMPORT_QUERY: &str = r#"
; import a.b, c as d
(import_statement) @import
"#;

const FROM_IMPORT_QUERY: &str = r#"
; from a.b import c, d as e
(import_from_statement
  module_name: (_) @module
) @import
"#;

const CLASS_QUERY: &str = r#"
(class_definition
  name: (identifier) @name
) @class
"#;

const FUNCTION_QUERY: &str = r#"
(function_definition
  name: (identifier) @name
  parameters: (parameters) @parameters
) @function
"#;

const DECORATOR_QUERY: &str = r#"
(decorator) @decorator
"#;

/// Comments and docstrings.
const COMMENT_QUERY: &str = r#"
(comment) @comment

(expression_statement
  (string) @comment
)
"#;

const BODY_KINDS: &[&str] = &["block"];

/// `(name, alias)` of a `dotted_name` or `aliased_import` node.
fn imported_name(node: &AstNode) -> Option<(String, Option<String>)> {
    match node.node_type.as_str() {
        "dotted_name" => Some((node.text.clone(), None)),
        "aliased_import" => {
            let name = node.child_of_type("dotted_name")?;
            let alias = node.child_of_type("identifier").map(|a| a.text.clone());
            Some((name.text.clone(), alias))
        }
        _ => None,
    }
}

fn imports(
    matches: &[QueryMatch],
    context: &QueryExecutionContext,
) -> anyhow::Result<Vec<ImportRecord>> {
    let mut records = Vec::new();
    for m in matches {
        for (module, alias) in m.node.children.iter().filter_map(imported_name) {
            records.push(ImportRecord {
                location: context.location_of(&m.node),
                node_text: m.node.text.clone(),
                imported: vec![module.clone()],
                source: module,
                alias,
                wildcard: false,
            });
        }
    }
    Ok(records)
}

/// One record per imported name, each with its own alias. A wildcard import
/// is a single record importing `*`.
fn from_imports(
    matches: &[QueryMatch],
    context: &QueryExecutionContext,
) -> anyhow::Result<Vec<ImportRecord>> {
    let mut records = Vec::with_capacity(matches.len());
    for m in matches {
        let Some(module) = m.capture("module") else {
            continue;
        };

        for child in m.node.children.iter().filter(|c| !same_node(c, module)) {
            let (name, alias, wildcard) = if child.is("wildcard_import") {
                ("*".to_string(), None, true)
            } else if let Some((name, alias)) = imported_name(child) {
                (name, alias, false)
            } else {
                continue;
            };

            records.push(ImportRecord {
                location: context.location_of(&m.node),
                node_text: m.node.text.clone(),
                source: module.text.clone(),
                imported: vec![name],
                alias,
                wildcard,
            });
        }
    }
    Ok(records)
}

fn decorators(
    matches: &[QueryMatch],
    context: &QueryExecutionContext,
) -> anyhow::Result<Vec<Annotation>> {
    Ok(matches
        .iter()
        .map(|m| {
            let body = m.node.text.trim().trim_start_matches('@');
            let (name, arguments) = match body.find('(') {
                Some(open) => (&body[..open], Some(body[open..].to_string())),
                None => (body, None),
            };
            Annotation {
                location: context.location_of(&m.node),
                node_text: m.node.text.clone(),
                name: name.trim().to_string(),
                arguments,
            }
        })
        .collect())
}

/// Every Python query keyed by name.
pub fn python_queries() -> Result<BTreeMap<String, QueryFunction>, QueryError> {
    let queries = vec![
        QueryFunction::builder("python-import-sources")
            .description("Modules imported with `import`")
            .query(IMPORT_QUERY)
            .language(Language::PYTHON)
            .priority(90)
            .result_type("import")
            .captures(&["import"])
            .processor(processor_fn(imports))
            .build()?,
        QueryFunction::builder("python-from-imports")
            .description("Names imported with `from ... import`")
            .query(FROM_IMPORT_QUERY)
            .language(Language::PYTHON)
            .priority(85)
            .result_type("from-import")
            .captures(&["module"])
            .processor(processor_fn(from_imports))
            .build()?,
        QueryFunction::builder("python-class-definitions")
            .description("Class definitions with their base classes")
            .query(CLASS_QUERY)
            .language(Language::PYTHON)
            .priority(80)
            .result_type("class")
            .captures(&["name"])
            .processor(TypeDefinitionProcessor {
                kind: "class",
                heritage: &[("argument_list", Heritage::Extends)],
                body_kinds: BODY_KINDS,
            })
            .build()?,
        QueryFunction::builder("python-function-definitions")
            .description("Function and method definitions")
            .query(FUNCTION_QUERY)
            .language(Language::PYTHON)
            .priority(70)
            .result_type("function")
            .captures(&["name", "parameters"])
            .processor(FunctionDefinitionProcessor {
                kind: "function",
                return_type: ReturnTypeRule::AfterParameters,
                body_kinds: BODY_KINDS,
            })
            .build()?,
        QueryFunction::builder("python-decorators")
            .description("Decorators and their arguments")
            .query(DECORATOR_QUERY)
            .language(Language::PYTHON)
            .priority(50)
            .result_type("decorator")
            .captures(&["decorator"])
            .processor(processor_fn(decorators))
            .build()?,
        QueryFunction::builder("python-semantic-tags")
            .description("@semantic-tags and @description markers in comments and docstrings")
            .query(COMMENT_QUERY)
            .language(Language::PYTHON)
            .priority(30)
            .result_type("semantic-tag")
            .captures(&["comment"])
            .processor(SemanticTagProcessor)
            .build()?,
    ];

    Ok(queries.into_iter().map(|q| (q.name().to_string(), q)).collect())
}

/// Register every Python query with the engine.
pub fn register_python_queries(engine: &QueryEngine) -> Result<usize, QueryError> {
    register_pack(engine, "python", python_queries()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packs::common::testing::*;

    #[tokio::test]
    async fn test_aliased_import() {
        let statement = node("import_statement", "import pandas as pd").with_children(vec![
            node("aliased_import", "pandas as pd")
                .with_children(vec![node("dotted_name", "pandas"), node("identifier", "pd")]),
        ]);
        let m = matched(statement.clone(), &[("import", statement)]);

        let query = python_queries().unwrap().remove("python-import-sources").unwrap();
        let results = query.run(&[m], &context(Language::PYTHON)).await.unwrap();
        let import: ImportRecord = results[0].decode().unwrap();
        assert_eq!(import.source, "pandas");
        assert_eq!(import.alias.as_deref(), Some("pd"));
    }

    #[tokio::test]
    async fn test_from_import_names() {
        let module = node_at("dotted_name", "typing", 0, 5);
        let statement = node("import_from_statement", "from typing import List, Dict")
            .with_children(vec![
                module.clone(),
                node_at("dotted_name", "List", 0, 19),
                node_at("dotted_name", "Dict", 0, 25),
            ]);
        let m = matched(statement, &[("module", module)]);

        let query = python_queries().unwrap().remove("python-from-imports").unwrap();
        let results = query.run(&[m], &context(Language::PYTHON)).await.unwrap();
        let imports: Vec<ImportRecord> = results.iter().map(|r| r.decode().unwrap()).collect();
        assert_eq!(imports.len(), 2);
        assert!(imports.iter().all(|i| i.source == "typing"));
        assert_eq!(imports[0].imported, vec!["List"]);
        assert_eq!(imports[1].imported, vec!["Dict"]);
    }

    #[tokio::test]
    async fn test_from_import_keeps_every_alias() {
        let module = node_at("dotted_name", "m", 0, 5);
        let aliased = |name: &str, alias: &str, column: usize| {
            node_at("aliased_import", &format!("{} as {}", name, alias), 0, column)
                .with_children(vec![node("dotted_name", name), node("identifier", alias)])
        };
        let statement = node("import_from_statement", "from m import a as x, b as y")
            .with_children(vec![module.clone(), aliased("a", "x", 14), aliased("b", "y", 22)]);
        let m = matched(statement, &[("module", module)]);

        let query = python_queries().unwrap().remove("python-from-imports").unwrap();
        let results = query.run(&[m], &context(Language::PYTHON)).await.unwrap();
        let imports: Vec<ImportRecord> = results.iter().map(|r| r.decode().unwrap()).collect();
        let pairs: Vec<(&str, Option<&str>)> = imports
            .iter()
            .map(|i| (i.imported[0].as_str(), i.alias.as_deref()))
            .collect();
        assert_eq!(pairs, vec![("a", Some("x")), ("b", Some("y"))]);
        assert!(imports.iter().all(|i| !i.wildcard));
    }

    #[tokio::test]
    async fn test_wildcard_from_import() {
        let module = node_at("dotted_name", "os", 0, 5);
        let statement = node("import_from_statement", "from os import *")
            .with_children(vec![module.clone(), node_at("wildcard_import", "*", 0, 15)]);
        let m = matched(statement, &[("module", module)]);

        let query = python_queries().unwrap().remove("python-from-imports").unwrap();
        let results = query.run(&[m], &context(Language::PYTHON)).await.unwrap();
        assert_eq!(results.len(), 1);
        let import: ImportRecord = results[0].decode().unwrap();
        assert!(import.wildcard);
        assert_eq!(import.imported, vec!["*"]);
    }

    #[tokio::test]
    async fn test_decorator_arguments() {
        let m = matched(node("decorator", "@app.route('/users')"), &[]);
        let query = python_queries().unwrap().remove("python-decorators").unwrap();
        let results = query.run(&[m], &context(Language::PYTHON)).await.unwrap();
        let decorator: Annotation = results[0].decode().unwrap();
        assert_eq!(decorator.name, "app.route");
        assert_eq!(decorator.arguments.as_deref(), Some("('/users')"));
    }
}
