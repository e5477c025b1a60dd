//! TypeScript query pack.
//!
//! Extracts:
//! - Import sources and named imports
//! - Export statements
//! - Classes, interfaces and type aliases
//! - Function declarations
//! - React hook calls
//! - Semantic tags in comments

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::common::{
    strip_quotes, EsImportProcessor, ExportProcessor, FunctionDefinitionProcessor, Heritage,
    HookCall, NamedImport, ReturnTypeRule, SemanticTagProcessor, TypeAlias, TypeDefinitionProcessor,
};
use super::register_pack;
use crate::query::{
    processor_fn, Language, QueryEngine, QueryError, QueryExecutionContext, QueryFunction,
    QueryMatch,
};

const IMPORT_SOURCES_QUERY: &str = r#"
(import_statement
  source: (string) @source
) @import
"#;

const NAMED_IMPORTS_QUERY: &str = r#"
(import_statement
  (import_clause
    (named_imports
      (import_specifier
        name: (identifier) @name
        alias: (identifier)? @alias
      ) @specifier
    )
  )
  source: (string) @source
) @import
"#;

const EXPORT_QUERY: &str = r#"
(export_statement) @export
"#;

const CLASS_QUERY: &str = r#"
[
  (class_declaration
    name: (type_identifier) @name
  )
  (abstract_class_declaration
    name: (type_identifier) @name
  )
] @class
"#;

const INTERFACE_QUERY: &str = r#"
(interface_declaration
  name: (type_identifier) @name
) @interface
"#;

const TYPE_ALIAS_QUERY: &str = r#"
(type_alias_declaration
  name: (type_identifier) @name
  value: (_) @value
) @alias
"#;

const FUNCTION_QUERY: &str = r#"
(function_declaration
  name: (identifier) @name
  parameters: (formal_parameters) @parameters
) @function
"#;

const REACT_HOOK_QUERY: &str = r#"
(call_expression
  function: (identifier) @hook
  arguments: (arguments) @arguments
  (#match? @hook "^use[A-Z]")
) @call
"#;

const COMMENT_QUERY: &str = r#"
(comment) @comment
"#;

const BODY_KINDS: &[&str] = &["class_body", "interface_body", "object_type", "statement_block"];

static HOOK_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^use[A-Z]").expect("valid hook regex"));

fn named_imports(
    matches: &[QueryMatch],
    context: &QueryExecutionContext,
) -> anyhow::Result<Vec<NamedImport>> {
    Ok(matches
        .iter()
        .filter_map(|m| {
            let specifier = m.capture("specifier").unwrap_or(&m.node);
            Some(NamedImport {
                location: context.location_of(specifier),
                node_text: specifier.text.clone(),
                name: m.capture_text("name")?.to_string(),
                alias: m.capture_text("alias").map(str::to_string),
                source: strip_quotes(m.capture_text("source")?).to_string(),
            })
        })
        .collect())
}

fn type_aliases(
    matches: &[QueryMatch],
    context: &QueryExecutionContext,
) -> anyhow::Result<Vec<TypeAlias>> {
    Ok(matches
        .iter()
        .filter_map(|m| {
            Some(TypeAlias {
                location: context.location_of(&m.node),
                node_text: m.node.text.clone(),
                name: m.capture_text("name")?.to_string(),
                value: m.capture_text("value")?.to_string(),
            })
        })
        .collect())
}

fn react_hooks(
    matches: &[QueryMatch],
    context: &QueryExecutionContext,
) -> anyhow::Result<Vec<HookCall>> {
    Ok(matches
        .iter()
        .filter_map(|m| {
            let hook = m.capture_text("hook")?;
            if !HOOK_NAME.is_match(hook) {
                return None;
            }
            Some(HookCall {
                location: context.location_of(&m.node),
                node_text: m.node.text.clone(),
                hook: hook.to_string(),
                argument_count: m.capture("arguments").map(|a| a.children.len()).unwrap_or(0),
            })
        })
        .collect())
}

/// Every TypeScript query keyed by name.
pub fn typescript_queries() -> Result<BTreeMap<String, QueryFunction>, QueryError> {
    let queries = vec![
        QueryFunction::builder("ts-import-sources")
            .description("Module specifiers of import statements")
            .query(IMPORT_SOURCES_QUERY)
            .language(Language::TYPESCRIPT)
            .priority(90)
            .result_type("import")
            .captures(&["source"])
            .processor(EsImportProcessor)
            .build()?,
        QueryFunction::builder("ts-named-imports")
            .description("Named bindings of import statements")
            .query(NAMED_IMPORTS_QUERY)
            .language(Language::TYPESCRIPT)
            .priority(60)
            .result_type("named-import")
            .captures(&["name", "alias", "source", "specifier"])
            .processor(processor_fn(named_imports))
            .build()?,
        QueryFunction::builder("ts-export-declarations")
            .description("Export statements and the names they export")
            .query(EXPORT_QUERY)
            .language(Language::TYPESCRIPT)
            .priority(85)
            .result_type("export")
            .captures(&["export"])
            .processor(ExportProcessor)
            .build()?,
        QueryFunction::builder("ts-class-definitions")
            .description("Class declarations with their heritage")
            .query(CLASS_QUERY)
            .language(Language::TYPESCRIPT)
            .priority(80)
            .result_type("class")
            .captures(&["name"])
            .processor(TypeDefinitionProcessor {
                kind: "class",
                heritage: &[
                    ("extends_clause", Heritage::Extends),
                    ("implements_clause", Heritage::Implements),
                ],
                body_kinds: BODY_KINDS,
            })
            .build()?,
        QueryFunction::builder("ts-interface-definitions")
            .description("Interface declarations")
            .query(INTERFACE_QUERY)
            .language(Language::TYPESCRIPT)
            .priority(80)
            .result_type("interface")
            .captures(&["name"])
            .processor(TypeDefinitionProcessor {
                kind: "interface",
                heritage: &[("extends_type_clause", Heritage::Extends)],
                body_kinds: BODY_KINDS,
            })
            .build()?,
        QueryFunction::builder("ts-type-aliases")
            .description("Type alias declarations")
            .query(TYPE_ALIAS_QUERY)
            .language(Language::TYPESCRIPT)
            .priority(75)
            .result_type("type-alias")
            .captures(&["name", "value"])
            .processor(processor_fn(type_aliases))
            .build()?,
        QueryFunction::builder("ts-function-definitions")
            .description("Function declarations")
            .query(FUNCTION_QUERY)
            .language(Language::TYPESCRIPT)
            .priority(70)
            .result_type("function")
            .captures(&["name", "parameters"])
            .processor(FunctionDefinitionProcessor {
                kind: "function",
                return_type: ReturnTypeRule::ChildKind("type_annotation"),
                body_kinds: BODY_KINDS,
            })
            .build()?,
        QueryFunction::builder("ts-react-hooks")
            .description("React hook calls (use*)")
            .query(REACT_HOOK_QUERY)
            .language(Language::TYPESCRIPT)
            .priority(60)
            .result_type("hook")
            .captures(&["hook", "arguments"])
            .processor(processor_fn(react_hooks))
            .build()?,
        QueryFunction::builder("ts-semantic-tags")
            .description("@semantic-tags and @description markers in comments")
            .query(COMMENT_QUERY)
            .language(Language::TYPESCRIPT)
            .priority(30)
            .result_type("semantic-tag")
            .captures(&["comment"])
            .processor(SemanticTagProcessor)
            .build()?,
    ];

    Ok(queries.into_iter().map(|q| (q.name().to_string(), q)).collect())
}

/// Register every TypeScript query with the engine.
pub fn register_typescript_queries(engine: &QueryEngine) -> Result<usize, QueryError> {
    register_pack(engine, "typescript", typescript_queries()?)
}
