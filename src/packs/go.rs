//! Go query pack.
//!
//! Extracts:
//! - Import specs (grouped or single) and the package clause
//! - Functions, and methods with their receiver type
//! - Struct and interface type specs
//! - Semantic tags in comments

use std::collections::BTreeMap;

use super::common::{
    strip_quotes, FunctionDefinitionProcessor, ImportRecord, PackageProcessor, ReturnTypeRule,
    SemanticTagProcessor, TypeDefinitionProcessor,
};
use super::register_pack;
use crate::query::{
    processor_fn, Language, QueryEngine, QueryError, QueryExecutionContext, QueryFunction,
    QueryMatch,
};

const IMPORT_QUERY: &str = r#"
(import_spec
  path: (_) @path
) @import
"#;

const PACKAGE_QUERY: &str = r#"
(package_clause
  (package_identifier) @name
) @package
"#;

const FUNCTION_QUERY: &str = r#"
(function_declaration
  name: (identifier) @name
  parameters: (parameter_list) @parameters
) @function
"#;

const METHOD_QUERY: &str = r#"
(method_declaration
  receiver: (parameter_list) @receiver
  name: (field_identifier) @name
  parameters: (parameter_list) @parameters
) @method
"#;

const STRUCT_QUERY: &str = r#"
(type_spec
  name: (type_identifier) @name
  type: (struct_type)
) @struct
"#;

const INTERFACE_QUERY: &str = r#"
(type_spec
  name: (type_identifier) @name
  type: (interface_type)
) @interface
"#;

const COMMENT_QUERY: &str = r#"
(comment) @comment
"#;

const BODY_KINDS: &[&str] = &["block", "field_declaration_list"];

/// Import alias forms: `name "path"`, `_ "path"` and `. "path"`.
const ALIAS_KINDS: &[&str] = &["package_identifier", "blank_identifier", "dot"];

fn imports(
    matches: &[QueryMatch],
    context: &QueryExecutionContext,
) -> anyhow::Result<Vec<ImportRecord>> {
    Ok(matches
        .iter()
        .filter_map(|m| {
            let path = strip_quotes(m.capture_text("path")?);
            let alias = m
                .node
                .children
                .iter()
                .find(|c| ALIAS_KINDS.contains(&c.node_type.as_str()))
                .map(|a| a.text.clone());
            let package = path.rsplit('/').next().unwrap_or(path);
            Some(ImportRecord {
                location: context.location_of(&m.node),
                node_text: m.node.text.clone(),
                source: path.to_string(),
                imported: vec![package.to_string()],
                wildcard: alias.as_deref() == Some("."),
                alias,
            })
        })
        .collect())
}

/// Every Go query keyed by name.
pub fn go_queries() -> Result<BTreeMap<String, QueryFunction>, QueryError> {
    let queries = vec![
        QueryFunction::builder("go-import-sources")
            .description("Imported package paths")
            .query(IMPORT_QUERY)
            .language(Language::GO)
            .priority(90)
            .result_type("import")
            .captures(&["path"])
            .processor(processor_fn(imports))
            .build()?,
        QueryFunction::builder("go-package-declaration")
            .description("Package clause")
            .query(PACKAGE_QUERY)
            .language(Language::GO)
            .priority(95)
            .result_type("package")
            .captures(&["name"])
            .processor(PackageProcessor)
            .build()?,
        QueryFunction::builder("go-function-definitions")
            .description("Top-level function declarations")
            .query(FUNCTION_QUERY)
            .language(Language::GO)
            .priority(70)
            .result_type("function")
            .captures(&["name", "parameters"])
            .processor(FunctionDefinitionProcessor {
                kind: "function",
                return_type: ReturnTypeRule::AfterParameters,
                body_kinds: BODY_KINDS,
            })
            .build()?,
        QueryFunction::builder("go-method-definitions")
            .description("Method declarations with their receiver type")
            .query(METHOD_QUERY)
            .language(Language::GO)
            .priority(70)
            .result_type("method")
            .captures(&["receiver", "name", "parameters"])
            .processor(FunctionDefinitionProcessor {
                kind: "method",
                return_type: ReturnTypeRule::AfterParameters,
                body_kinds: BODY_KINDS,
            })
            .build()?,
        QueryFunction::builder("go-struct-definitions")
            .description("Struct type declarations")
            .query(STRUCT_QUERY)
            .language(Language::GO)
            .priority(80)
            .result_type("struct")
            .captures(&["name"])
            .processor(TypeDefinitionProcessor {
                kind: "struct",
                heritage: &[],
                body_kinds: BODY_KINDS,
            })
            .build()?,
        QueryFunction::builder("go-interface-definitions")
            .description("Interface type declarations")
            .query(INTERFACE_QUERY)
            .language(Language::GO)
            .priority(80)
            .result_type("interface")
            .captures(&["name"])
            .processor(TypeDefinitionProcessor {
                kind: "interface",
                heritage: &[],
                body_kinds: BODY_KINDS,
            })
            .build()?,
        QueryFunction::builder("go-semantic-tags")
            .description("@semantic-tags and @description markers in comments")
            .query(COMMENT_QUERY)
            .language(Language::GO)
            .priority(30)
            .result_type("semantic-tag")
            .captures(&["comment"])
            .processor(SemanticTagProcessor)
            .build()?,
    ];

    Ok(queries.into_iter().map(|q| (q.name().to_string(), q)).collect())
}

/// Register every Go query with the engine.
pub fn register_go_queries(engine: &QueryEngine) -> Result<usize, QueryError> {
    register_pack(engine, "go", go_queries()?)
}
