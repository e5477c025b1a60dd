//! JavaScript query pack.

use std::collections::BTreeMap;

use super::common::{
    strip_quotes, EsImportProcessor, ExportProcessor, FunctionDefinitionProcessor, Heritage,
    RequireCall, ReturnTypeRule, SemanticTagProcessor, TypeDefinitionProcessor,
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

/// `require("m")` with a literal argument. Also valid TypeScript.
const REQUIRE_QUERY: &str = r#"
(call_expression
  function: (identifier) @function
  arguments: (arguments (string) @source)
  (#eq? @function "require")
) @call
"#;

const EXPORT_QUERY: &str = r#"
(export_statement) @export
"#;

const CLASS_QUERY: &str = r#"
(class_declaration
  name: (identifier) @name
) @class
"#;

const FUNCTION_QUERY: &str = r#"
(function_declaration
  name: (identifier) @name
  parameters: (formal_parameters) @parameters
) @function
"#;

const ARROW_FUNCTION_QUERY: &str = r#"
(variable_declarator
  name: (identifier) @name
  value: (arrow_function) @function
) @declarator
"#;

const COMMENT_QUERY: &str = r#"
(comment) @comment
"#;

const BODY_KINDS: &[&str] = &["class_body", "statement_block"];

fn require_calls(
    matches: &[QueryMatch],
    context: &QueryExecutionContext,
) -> anyhow::Result<Vec<RequireCall>> {
    Ok(matches
        .iter()
        .filter(|m| m.capture_text("function") == Some("require"))
        .filter_map(|m| {
            Some(RequireCall {
                location: context.location_of(&m.node),
                node_text: m.node.text.clone(),
                source: strip_quotes(m.capture_text("source")?).to_string(),
            })
        })
        .collect())
}

/// Every JavaScript query keyed by name.
pub fn javascript_queries() -> Result<BTreeMap<String, QueryFunction>, QueryError> {
    let queries = vec![
        QueryFunction::builder("js-import-sources")
            .description("Module specifiers of import statements")
            .query(IMPORT_SOURCES_QUERY)
            .language(Language::JAVASCRIPT)
            .priority(90)
            .result_type("import")
            .captures(&["source"])
            .processor(EsImportProcessor)
            .build()?,
        QueryFunction::builder("js-require-calls")
            .description("CommonJS require() calls")
            .query(REQUIRE_QUERY)
            .languages([Language::JAVASCRIPT, Language::TYPESCRIPT])
            .priority(85)
            .result_type("require")
            .captures(&["function", "source"])
            .processor(processor_fn(require_calls))
            .build()?,
        QueryFunction::builder("js-export-declarations")
            .description("Export statements and the names they export")
            .query(EXPORT_QUERY)
            .language(Language::JAVASCRIPT)
            .priority(85)
            .result_type("export")
            .captures(&["export"])
            .processor(ExportProcessor)
            .build()?,
        QueryFunction::builder("js-class-definitions")
            .description("Class declarations with their superclass")
            .query(CLASS_QUERY)
            .language(Language::JAVASCRIPT)
            .priority(80)
            .result_type("class")
            .captures(&["name"])
            .processor(TypeDefinitionProcessor {
                kind: "class",
                heritage: &[("class_heritage", Heritage::Extends)],
                body_kinds: BODY_KINDS,
            })
            .build()?,
        QueryFunction::builder("js-function-definitions")
            .description("Function declarations")
            .query(FUNCTION_QUERY)
            .language(Language::JAVASCRIPT)
            .priority(70)
            .result_type("function")
            .captures(&["name", "parameters"])
            .processor(FunctionDefinitionProcessor {
                kind: "function",
                return_type: ReturnTypeRule::None,
                body_kinds: BODY_KINDS,
            })
            .build()?,
        QueryFunction::builder("js-arrow-functions")
            .description("Arrow functions bound to a variable")
            .query(ARROW_FUNCTION_QUERY)
            .language(Language::JAVASCRIPT)
            .priority(65)
            .result_type("arrow-function")
            .captures(&["name", "function"])
            .processor(FunctionDefinitionProcessor {
                kind: "arrow-function",
                return_type: ReturnTypeRule::None,
                body_kinds: BODY_KINDS,
            })
            .build()?,
        QueryFunction::builder("js-semantic-tags")
            .description("@semantic-tags and @description markers in comments")
            .query(COMMENT_QUERY)
            .language(Language::JAVASCRIPT)
            .priority(30)
            .result_type("semantic-tag")
            .captures(&["comment"])
            .processor(SemanticTagProcessor)
            .build()?,
    ];

    Ok(queries.into_iter().map(|q| (q.name().to_string(), q)).collect())
}

/// Register every JavaScript query with the engine.
pub fn register_javascript_queries(engine: &QueryEngine) -> Result<usize, QueryError> {
    register_pack(engine, "javascript", javascript_queries()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packs::common::testing::*;
    use crate::packs::common::FunctionDefinition;

    #[tokio::test]
    async fn test_require_calls() {
        let call = matched(
            node("call_expression", "require('fs')"),
            &[("function", node("identifier", "require")), ("source", node("string", "'fs'"))],
        );
        let query = javascript_queries().unwrap().remove("js-require-calls").unwrap();
        let results = query.run(&[call], &context(Language::JAVASCRIPT)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].field_str("source"), Some("fs"));
        assert!(query.supports(&Language::TYPESCRIPT));
    }

    #[tokio::test]
    async fn test_arrow_function_parameters() {
        let arrow = node("arrow_function", "async (a, b) => a + b").with_children(vec![
            node("formal_parameters", "(a, b)")
                .with_children(vec![node("identifier", "a"), node("identifier", "b")]),
            node("binary_expression", "a + b"),
        ]);
        let declarator = node("variable_declarator", "add = async (a, b) => a + b")
            .with_children(vec![node("identifier", "add"), arrow.clone()]);
        let m = matched(declarator, &[("name", node("identifier", "add")), ("function", arrow)]);

        let query = javascript_queries().unwrap().remove("js-arrow-functions").unwrap();
        let results = query.run(&[m], &context(Language::JAVASCRIPT)).await.unwrap();
        let function: FunctionDefinition = results[0].decode().unwrap();
        assert_eq!(function.name, "add");
        assert_eq!(function.parameters, vec!["a", "b"]);
        assert!(function.is_async);
    }
}
