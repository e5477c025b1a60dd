//! Shipped query packs against real grammars and the sample sources in
//! `testdata/`.

#![cfg(feature = "tree-sitter")]

use std::collections::HashMap;
use std::path::PathBuf;

use astquery::packs::common::{
    Annotation, Export, FunctionDefinition, HookCall, ImportRecord, NamedImport, Package,
    RequireCall, SemanticTag, TypeAlias, TypeDefinition,
};
use astquery::packs::{self, PACKS};
use astquery::query::{ExecutionMode, Language, QueryEngine, QueryResult};
use astquery::runner::{collect_files, RunOptions, Runner, Selection};
use astquery::source::{check_pattern, ParsedSource};
use astquery::mapping::predefined;
use serde::de::DeserializeOwned;

fn testdata(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata").join(relative)
}

/// Run every query for the file's language.
async fn analyze(engine: &QueryEngine, parsed: &ParsedSource) -> HashMap<String, Vec<QueryResult>> {
    let context = parsed.context();
    let mut results = HashMap::new();
    for query in engine.registry().queries_for_language(parsed.language()) {
        let matches = parsed.matches_for(&query).unwrap();
        let found = engine.execute_strict(query.name(), &matches, &context).await.unwrap();
        results.insert(query.name().to_string(), found);
    }
    results
}

async fn analyze_file(engine: &QueryEngine, relative: &str) -> HashMap<String, Vec<QueryResult>> {
    let parsed = ParsedSource::from_path(&testdata(relative)).unwrap();
    analyze(engine, &parsed).await
}

fn decode<T: DeserializeOwned>(results: &HashMap<String, Vec<QueryResult>>, key: &str) -> Vec<T> {
    results[key].iter().map(|r| r.decode::<T>().unwrap()).collect()
}

fn names<T>(records: &[T], name: impl Fn(&T) -> &str) -> Vec<String> {
    records.iter().map(|r| name(r).to_string()).collect()
}

#[test]
fn test_every_pattern_compiles() {
    for pack in PACKS {
        for (name, query) in (pack.queries)().unwrap() {
            for language in query.languages() {
                check_pattern(&name, language, query.query())
                    .unwrap_or_else(|e| panic!("{} ({}): {}", name, language, e));
            }
        }
    }
}

#[tokio::test]
async fn test_go_sample() {
    let engine = packs::standard_engine().unwrap();
    let results = analyze_file(&engine, "go/user.go").await;

    let package: Vec<Package> = decode(&results, "go-package-declaration");
    assert_eq!(package.len(), 1);
    assert_eq!(package[0].name, "user");

    let imports: Vec<ImportRecord> = decode(&results, "go-import-sources");
    assert_eq!(
        names(&imports, |i| i.source.as_str()),
        vec!["context", "database/sql", "errors", "strings"]
    );
    assert_eq!(imports[1].imported, vec!["sql"]);
    assert_eq!(imports[3].alias.as_deref(), Some("str"));

    let structs: Vec<TypeDefinition> = decode(&results, "go-struct-definitions");
    assert_eq!(names(&structs, |s| s.name.as_str()), vec!["User", "UserService"]);
    let interfaces: Vec<TypeDefinition> = decode(&results, "go-interface-definitions");
    assert_eq!(names(&interfaces, |i| i.name.as_str()), vec!["UserRepository"]);

    let functions: Vec<FunctionDefinition> = decode(&results, "go-function-definitions");
    assert_eq!(names(&functions, |f| f.name.as_str()), vec!["NewUserService", "Normalize"]);
    assert_eq!(functions[0].return_type.as_deref(), Some("*UserService"));
    assert_eq!(functions[1].parameters, vec!["email string"]);

    let methods: Vec<FunctionDefinition> = decode(&results, "go-method-definitions");
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0].name, "GetUser");
    assert_eq!(methods[0].receiver.as_deref(), Some("UserService"));
    assert_eq!(methods[0].parameters.len(), 2);

    let tags: Vec<SemanticTag> = decode(&results, "go-semantic-tags");
    assert_eq!(tags.len(), 5);
    assert_eq!(tags[0].tags, vec!["user-package", "user-domain"]);
    assert_eq!(tags[0].location.start_line, 3);
    assert_eq!(tags[1].description.as_deref(), Some("user management service"));
    assert!(tags.iter().any(|t| t.tags.contains(&"constructor-function".to_string())));
}

#[tokio::test]
async fn test_java_sample() {
    let engine = packs::standard_engine().unwrap();
    let results = analyze_file(&engine, "java/UserController.java").await;

    let package: Vec<Package> = decode(&results, "java-package-declaration");
    assert_eq!(package[0].name, "com.example.user.controller");

    let imports: Vec<ImportRecord> = decode(&results, "java-import-sources");
    assert_eq!(imports.len(), 5);
    assert_eq!(imports[0].source, "com.example.user.model.User");
    assert_eq!(imports[0].imported, vec!["User"]);
    let wildcard: Vec<&ImportRecord> = imports.iter().filter(|i| i.wildcard).collect();
    assert_eq!(wildcard.len(), 1);
    assert_eq!(wildcard[0].source, "org.springframework.web.bind.annotation");

    let classes: Vec<TypeDefinition> = decode(&results, "java-class-definitions");
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].name, "UserController");
    assert_eq!(classes[0].extends, vec!["BaseController"]);
    assert_eq!(classes[0].implements, vec!["Auditable"]);
    assert_eq!(classes[0].modifiers, vec!["public"]);

    let interfaces: Vec<TypeDefinition> = decode(&results, "java-interface-definitions");
    assert_eq!(interfaces[0].name, "Auditable");
    assert_eq!(interfaces[0].extends, vec!["Comparable"]);

    let methods: Vec<FunctionDefinition> = decode(&results, "java-method-definitions");
    assert_eq!(
        names(&methods, |m| m.name.as_str()),
        vec!["UserController", "getUser", "listUsers", "auditId"]
    );
    assert_eq!(methods[0].return_type, None);
    assert_eq!(methods[1].return_type.as_deref(), Some("ResponseEntity<User>"));
    assert_eq!(methods[2].parameters, vec!["int page", "int size"]);

    let annotations: Vec<Annotation> = decode(&results, "java-annotations");
    assert_eq!(
        names(&annotations, |a| a.name.as_str()),
        vec!["RestController", "RequestMapping", "GetMapping", "PathVariable"]
    );
    assert_eq!(annotations[1].arguments.as_deref(), Some("(\"/api/users\")"));

    let tags: Vec<SemanticTag> = decode(&results, "java-semantic-tags");
    assert_eq!(tags.len(), 2);
    assert_eq!(tags[0].tags, vec!["controller-class", "user-domain", "public-api"]);
    assert_eq!(tags[0].description.as_deref(), Some("handles user HTTP requests"));
    assert_eq!(tags[1].tags, vec!["read-endpoint", "public-api"]);
}

#[tokio::test]
async fn test_python_sample() {
    let engine = packs::standard_engine().unwrap();
    let results = analyze_file(&engine, "python/data_processor.py").await;

    let imports: Vec<ImportRecord> = decode(&results, "python-import-sources");
    assert_eq!(names(&imports, |i| i.source.as_str()), vec!["asyncio", "json", "logging"]);
    assert_eq!(imports[1].alias.as_deref(), Some("js"));

    let from: Vec<ImportRecord> = decode(&results, "python-from-imports");
    assert_eq!(
        names(&from, |i| i.imported[0].as_str()),
        vec!["List", "Dict", "Optional", "dataclass"]
    );
    assert_eq!(from[0].source, "typing");
    assert_eq!(from[3].source, "dataclasses");

    let classes: Vec<TypeDefinition> = decode(&results, "python-class-definitions");
    assert_eq!(names(&classes, |c| c.name.as_str()), vec!["ProcessingResult", "DataProcessor"]);
    assert_eq!(classes[1].extends, vec!["BaseProcessor"]);

    let functions: Vec<FunctionDefinition> = decode(&results, "python-function-definitions");
    assert_eq!(names(&functions, |f| f.name.as_str()), vec!["__init__", "process", "load"]);
    assert!(functions[1].is_async);
    assert!(!functions[2].is_async);
    assert_eq!(functions[1].return_type.as_deref(), Some("ProcessingResult"));
    assert_eq!(functions[2].return_type.as_deref(), Some("Dict"));

    let decorators: Vec<Annotation> = decode(&results, "python-decorators");
    assert_eq!(names(&decorators, |d| d.name.as_str()), vec!["dataclass"]);

    let tags: Vec<SemanticTag> = decode(&results, "python-semantic-tags");
    let all: Vec<&str> = tags.iter().flat_map(|t| t.tags.iter().map(String::as_str)).collect();
    assert!(all.contains(&"data-module"));
    assert!(all.contains(&"data-class"));
    assert!(all.contains(&"processor-class"));
    assert!(all.contains(&"process-method"));
    assert!(tags.iter().any(|t| t.description.as_deref() == Some("data processing helpers")));
}

#[tokio::test]
async fn test_typescript_sample() {
    let engine = packs::standard_engine().unwrap();
    let results = analyze_file(&engine, "typescript/UserList.tsx").await;

    let imports: Vec<ImportRecord> = decode(&results, "ts-import-sources");
    assert_eq!(names(&imports, |i| i.source.as_str()), vec!["react", "./api", "./types"]);
    assert!(imports[0].imported.contains(&"React".to_string()));
    assert!(imports[1].wildcard);
    assert_eq!(imports[1].alias.as_deref(), Some("api"));

    let named: Vec<NamedImport> = decode(&results, "ts-named-imports");
    let react: Vec<&str> = named
        .iter()
        .filter(|n| n.source == "react")
        .map(|n| n.name.as_str())
        .collect();
    assert_eq!(react, vec!["useState", "useEffect"]);

    let exports: Vec<Export> = decode(&results, "ts-export-declarations");
    assert_eq!(exports.len(), 5);
    assert!(exports.iter().any(|e| e.is_default));

    let interfaces: Vec<TypeDefinition> = decode(&results, "ts-interface-definitions");
    assert_eq!(interfaces[0].name, "UserListProps");
    assert_eq!(interfaces[0].extends, vec!["BaseProps"]);

    let aliases: Vec<TypeAlias> = decode(&results, "ts-type-aliases");
    assert_eq!(aliases[0].name, "UserId");
    assert_eq!(aliases[0].value, "string | number");

    let classes: Vec<TypeDefinition> = decode(&results, "ts-class-definitions");
    assert_eq!(classes[0].name, "UserStore");
    assert_eq!(classes[0].extends, vec!["Store"]);
    assert_eq!(classes[0].implements, vec!["Disposable"]);

    let functions: Vec<FunctionDefinition> = decode(&results, "ts-function-definitions");
    let fetch = functions.iter().find(|f| f.name == "fetchUsers").unwrap();
    assert!(fetch.is_async);
    assert_eq!(fetch.return_type.as_deref(), Some("Promise<User[]>"));
    assert_eq!(fetch.parameters, vec!["limit: number"]);

    let hooks: Vec<HookCall> = decode(&results, "ts-react-hooks");
    assert_eq!(names(&hooks, |h| h.hook.as_str()), vec!["useState", "useEffect"]);
    assert_eq!(hooks[1].argument_count, 2);

    let tags: Vec<SemanticTag> = decode(&results, "ts-semantic-tags");
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].tags, vec!["react-component", "user-domain"]);
}

#[tokio::test]
async fn test_javascript_source() {
    let source = r#"
const fs = require('fs');
import path from 'path';

class Cache extends Map {}

const double = x => x * 2;

module.exports = { double };
"#;
    let engine = packs::standard_engine().unwrap();
    let parsed = ParsedSource::parse("cache.js", source, Language::JAVASCRIPT).unwrap();
    let results = analyze(&engine, &parsed).await;

    let requires: Vec<RequireCall> = decode(&results, "js-require-calls");
    assert_eq!(names(&requires, |r| r.source.as_str()), vec!["fs"]);

    let imports: Vec<ImportRecord> = decode(&results, "js-import-sources");
    assert_eq!(imports[0].source, "path");

    let classes: Vec<TypeDefinition> = decode(&results, "js-class-definitions");
    assert_eq!(classes[0].name, "Cache");
    assert_eq!(classes[0].extends, vec!["Map"]);

    let arrows: Vec<FunctionDefinition> = decode(&results, "js-arrow-functions");
    assert_eq!(arrows[0].name, "double");
    assert_eq!(arrows[0].parameters, vec!["x"]);
}

#[tokio::test]
async fn test_module_analysis_on_typescript() {
    let engine = packs::standard_engine().unwrap();
    let parsed = ParsedSource::parse(
        "legacy.ts",
        "import a from './a';\nconst b = require('./b');\n",
        Language::TYPESCRIPT,
    )
    .unwrap();
    let context = parsed.context();

    let mapping = predefined::get("moduleAnalysis").unwrap();
    let mapper = mapping.create_mapper(&engine);
    assert!(mapper.validate().is_valid);

    let mut results = HashMap::new();
    for (user_key, query_key) in mapping.iter() {
        let query = engine.registry().get(query_key).unwrap();
        let matches = parsed.matches_for(&query).unwrap();
        let found = engine
            .execute_isolated(query_key, &matches, &context, ExecutionMode::Strict)
            .await
            .unwrap();
        results.insert(user_key.to_string(), found);
    }

    let requires: Vec<RequireCall> = decode(&results, "requires");
    assert_eq!(requires[0].source, "./b");
}

#[tokio::test]
async fn test_runner_over_testdata() {
    let engine = packs::standard_engine().unwrap();
    let files = collect_files(&testdata("")).unwrap();
    assert_eq!(files.len(), 4);

    let report = Runner::new(&engine, RunOptions::default()).run(&files).await;
    assert!(report.is_clean(), "{:?}", report.skipped);
    assert_eq!(report.files.len(), 4);
    assert!(report.skipped.is_empty());

    let options = RunOptions {
        selection: Selection::Keys(vec![
            "go-package-declaration".into(),
            "java-package-declaration".into(),
        ]),
        ..Default::default()
    };
    let report = Runner::new(&engine, options).run(&files).await;
    assert_eq!(report.result_count(), 2);
}
