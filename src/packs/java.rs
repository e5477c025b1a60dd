//! Java query pack.

use std::collections::BTreeMap;

use super::common::{
    Annotation, FunctionDefinitionProcessor, Heritage, ImportRecord, PackageProcessor,
    ReturnTypeRule, SemanticTagProcessor, TypeDefinitionProcessor,
};
use super::register_pack;
use crate::query::{
    processor_fn, Language, QueryEngine, QueryError, QueryExecutionContext, QueryFunction,
    QueryMatch,
};

const IMPORT_QUERY: &str = r#"
; import a.b.C;  import a.b.*;  import static a.b.C.m;
(import_declaration
  [(scoped_identifier) (identifier)] @source
) @import
"#;

const PACKAGE_QUERY: &str = r#"
(package_declaration
  [(scoped_identifier) (identifier)] @name
) @package
"#;

const CLASS_QUERY: &str = r#"
(class_declaration
  name: (identifier) @name
) @class
"#;

const INTERFACE_QUERY: &str = r#"
(interface_declaration
  name: (identifier) @name
) @interface
"#;

const METHOD_QUERY: &str = r#"
[
  (method_declaration
    name: (identifier) @name
    parameters: (formal_parameters) @parameters
  )
  (constructor_declaration
    name: (identifier) @name
    parameters: (formal_parameters) @parameters
  )
] @method
"#;

const ANNOTATION_QUERY: &str = r#"
[
  (marker_annotation
    name: (_) @name
  )
  (annotation
    name: (_) @name
  )
] @annotation
"#;

const COMMENT_QUERY: &str = r#"
[
  (line_comment)
  (block_comment)
] @comment
"#;

const BODY_KINDS: &[&str] = &["class_body", "interface_body", "constructor_body", "block"];

fn imports(
    matches: &[QueryMatch],
    context: &QueryExecutionContext,
) -> anyhow::Result<Vec<ImportRecord>> {
    Ok(matches
        .iter()
        .filter_map(|m| {
            let source = m.capture_text("source")?;
            let wildcard = m.node.child_of_type("asterisk").is_some() || m.node.text.contains(".*");
            let imported = if wildcard {
                "*".to_string()
            } else {
                source.rsplit('.').next().unwrap_or(source).to_string()
            };
            Some(ImportRecord {
                location: context.location_of(&m.node),
                node_text: m.node.text.clone(),
                source: source.to_string(),
                imported: vec![imported],
                alias: None,
                wildcard,
            })
        })
        .collect())
}

fn annotations(
    matches: &[QueryMatch],
    context: &QueryExecutionContext,
) -> anyhow::Result<Vec<Annotation>> {
    Ok(matches
        .iter()
        .filter_map(|m| {
            Some(Annotation {
                location: context.location_of(&m.node),
                node_text: m.node.text.clone(),
                name: m.capture_text("name")?.to_string(),
                arguments: m
                    .node
                    .child_of_type("annotation_argument_list")
                    .map(|a| a.text.clone()),
            })
        })
        .collect())
}

/// Every Java query keyed by name.
pub fn java_queries() -> Result<BTreeMap<String, QueryFunction>, QueryError> {
    let queries = vec![
        QueryFunction::builder("java-import-sources")
            .description("Imported classes and packages")
            .query(IMPORT_QUERY)
            .language(Language::JAVA)
            .priority(90)
            .result_type("import")
            .captures(&["source"])
            .processor(processor_fn(imports))
            .build()?,
        QueryFunction::builder("java-package-declaration")
            .description("Package declaration")
            .query(PACKAGE_QUERY)
            .language(Language::JAVA)
            .priority(95)
            .result_type("package")
            .captures(&["name"])
            .processor(PackageProcessor)
            .build()?,
        QueryFunction::builder("java-class-definitions")
            .description("Class declarations with superclass and interfaces")
            .query(CLASS_QUERY)
            .language(Language::JAVA)
            .priority(80)
            .result_type("class")
            .captures(&["name"])
            .processor(TypeDefinitionProcessor {
                kind: "class",
                heritage: &[
                    ("superclass", Heritage::Extends),
                    ("super_interfaces", Heritage::Implements),
                ],
                body_kinds: BODY_KINDS,
            })
            .build()?,
        QueryFunction::builder("java-interface-definitions")
            .description("Interface declarations")
            .query(INTERFACE_QUERY)
            .language(Language::JAVA)
            .priority(80)
            .result_type("interface")
            .captures(&["name"])
            .processor(TypeDefinitionProcessor {
                kind: "interface",
                heritage: &[("extends_interfaces", Heritage::Extends)],
                body_kinds: BODY_KINDS,
            })
            .build()?,
        QueryFunction::builder("java-method-definitions")
            .description("Method and constructor declarations")
            .query(METHOD_QUERY)
            .language(Language::JAVA)
            .priority(70)
            .result_type("method")
            .captures(&["name", "parameters"])
            .processor(FunctionDefinitionProcessor {
                kind: "method",
                return_type: ReturnTypeRule::BeforeName,
                body_kinds: BODY_KINDS,
            })
            .build()?,
        QueryFunction::builder("java-annotations")
            .description("Annotations and their arguments")
            .query(ANNOTATION_QUERY)
            .language(Language::JAVA)
            .priority(50)
            .result_type("annotation")
            .captures(&["name"])
            .processor(processor_fn(annotations))
            .build()?,
        QueryFunction::builder("java-semantic-tags")
            .description("@semantic-tags and @description markers in comments")
            .query(COMMENT_QUERY)
            .language(Language::JAVA)
            .priority(30)
            .result_type("semantic-tag")
            .captures(&["comment"])
            .processor(SemanticTagProcessor)
            .build()?,
    ];

    Ok(queries.into_iter().map(|q| (q.name().to_string(), q)).collect())
}

/// Register every Java query with the engine.
pub fn register_java_queries(engine: &QueryEngine) -> Result<usize, QueryError> {
    register_pack(engine, "java", java_queries()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packs::common::testing::*;
    use crate::packs::common::FunctionDefinition;

    #[tokio::test]
    async fn test_wildcard_import() {
        let source = node("scoped_identifier", "org.springframework.web.bind.annotation");
        let text = "import org.springframework.web.bind.annotation.*;";
        let declaration = node("import_declaration", text)
            .with_children(vec![source.clone(), node("asterisk", "*")]);
        let m = matched(declaration, &[("source", source)]);

        let query = java_queries().unwrap().remove("java-import-sources").unwrap();
        let results = query.run(&[m], &context(Language::JAVA)).await.unwrap();
        let import: ImportRecord = results[0].decode().unwrap();
        assert!(import.wildcard);
        assert_eq!(import.imported, vec!["*"]);
        assert_eq!(import.source, "org.springframework.web.bind.annotation");
    }

    #[tokio::test]
    async fn test_method_return_type() {
        let name = node_at("identifier", "getUser", 0, 36);
        let parameters = node_at("formal_parameters", "(Long id)", 0, 43)
            .with_children(vec![node("formal_parameter", "Long id")]);
        let text = "public ResponseEntity<UserResponse> getUser(Long id) {}";
        let method = node("method_declaration", text)
            .with_children(vec![
                node_at("modifiers", "public", 0, 0),
                node_at("generic_type", "ResponseEntity<UserResponse>", 0, 7),
                name.clone(),
                parameters.clone(),
                node_at("block", "{}", 0, 53),
            ]);
        let m = matched(method, &[("name", name), ("parameters", parameters)]);

        let query = java_queries().unwrap().remove("java-method-definitions").unwrap();
        let results = query.run(&[m], &context(Language::JAVA)).await.unwrap();
        let method: FunctionDefinition = results[0].decode().unwrap();
        assert_eq!(method.name, "getUser");
        assert_eq!(method.return_type.as_deref(), Some("ResponseEntity<UserResponse>"));
        assert_eq!(method.parameters, vec!["Long id"]);
    }
}
