//! Record types and processors shared by the language packs.
//!
//! Processors here are configured with small static tables so one
//! implementation serves every grammar that shapes a construct the same way.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::query::{
    AstNode, Location, QueryExecutionContext, QueryMatch, QueryProcessor, QueryRecord,
};

macro_rules! query_record {
    ($($ty:ty),* $(,)?) => {
        $(
            impl QueryRecord for $ty {
                fn location(&self) -> &Location {
                    &self.location
                }

                fn node_text(&self) -> &str {
                    &self.node_text
                }
            }
        )*
    };
}

/// An import of a module, package or file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    pub location: Location,
    pub node_text: String,
    pub source: String,
    #[serde(default)]
    pub imported: Vec<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub wildcard: bool,
}

/// One named binding of an ES import (`import { a as b } from "m"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedImport {
    pub location: Location,
    pub node_text: String,
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    pub source: String,
}

/// A CommonJS `require("m")` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequireCall {
    pub location: Location,
    pub node_text: String,
    pub source: String,
}

/// An ES `export` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Export {
    pub location: Location,
    pub node_text: String,
    /// What is exported: `class`, `function`, `variable`, `clause`, ...
    pub kind: String,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub is_default: bool,
    /// Module re-exported from, if any.
    #[serde(default)]
    pub source: Option<String>,
}

/// A class, interface or struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDefinition {
    pub location: Location,
    pub node_text: String,
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub extends: Vec<String>,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub modifiers: Vec<String>,
}

/// A type alias (`type A = ...`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeAlias {
    pub location: Location,
    pub node_text: String,
    pub name: String,
    pub value: String,
}

/// A function or method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDefinition {
    pub location: Location,
    pub node_text: String,
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub is_async: bool,
    /// Receiver type of a Go method.
    #[serde(default)]
    pub receiver: Option<String>,
}

/// A React hook call (`useState(...)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookCall {
    pub location: Location,
    pub node_text: String,
    pub hook: String,
    pub argument_count: usize,
}

/// A package or namespace declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub location: Location,
    pub node_text: String,
    pub name: String,
}

/// A Java annotation or Python decorator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub location: Location,
    pub node_text: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// `@semantic-tags` / `@description` markers found in a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticTag {
    pub location: Location,
    pub node_text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

query_record!(
    ImportRecord,
    NamedImport,
    RequireCall,
    Export,
    TypeDefinition,
    TypeAlias,
    FunctionDefinition,
    HookCall,
    Package,
    Annotation,
    SemanticTag,
);

/// Node kinds that are comments in some shipped grammar.
pub(crate) const COMMENT_KINDS: &[&str] = &["comment", "line_comment", "block_comment"];

/// Node kinds that name a type in a heritage clause.
const TYPE_NAME_KINDS: &[&str] = &[
    "type_identifier",
    "identifier",
    "scoped_type_identifier",
    "scoped_identifier",
    "nested_type_identifier",
    "member_expression",
    "attribute",
    "dotted_name",
];

/// Strip surrounding quotes from a string literal.
pub fn strip_quotes(text: &str) -> &str {
    text.trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

/// Whether two nodes are the same node of the same tree.
pub(crate) fn same_node(a: &AstNode, b: &AstNode) -> bool {
    a.node_type == b.node_type
        && a.start_position == b.start_position
        && a.end_position == b.end_position
}

/// Index of `child` among `parent`'s children.
pub(crate) fn child_index(parent: &AstNode, child: &AstNode) -> Option<usize> {
    parent.children.iter().position(|c| same_node(c, child))
}

/// Type names referenced by a heritage clause.
///
/// Generic types contribute their base name only.
pub fn type_names(clause: &AstNode) -> Vec<String> {
    let mut names = Vec::new();
    collect_type_names(clause, &mut names);
    names
}

fn collect_type_names(node: &AstNode, names: &mut Vec<String>) {
    for child in &node.children {
        match child.node_type.as_str() {
            kind if TYPE_NAME_KINDS.contains(&kind) => names.push(child.text.clone()),
            "generic_type" => {
                if let Some(base) = child.children.first() {
                    names.push(base.text.clone());
                }
            }
            "keyword_argument" | "type_arguments" => {}
            kind if COMMENT_KINDS.contains(&kind) => {}
            _ => collect_type_names(child, names),
        }
    }
}

/// Text of every non-comment child of a parameter list.
pub fn parameter_texts(parameters: &AstNode) -> Vec<String> {
    parameters
        .children
        .iter()
        .filter(|c| !COMMENT_KINDS.contains(&c.node_type.as_str()))
        .map(|c| c.text.trim().to_string())
        .collect()
}

/// Which clause of a type definition a heritage rule reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heritage {
    Extends,
    Implements,
}

/// Builds [`TypeDefinition`]s from matches with a `name` capture.
#[derive(Debug, Clone, Copy)]
pub struct TypeDefinitionProcessor {
    pub kind: &'static str,
    /// `(clause node kind, heritage)` pairs searched below the definition.
    pub heritage: &'static [(&'static str, Heritage)],
    /// Node kinds the heritage search does not descend into.
    pub body_kinds: &'static [&'static str],
}

/// Java modifier keywords.
const MODIFIER_KEYWORDS: &[&str] = &[
    "public",
    "protected",
    "private",
    "abstract",
    "static",
    "final",
    "sealed",
    "non-sealed",
    "strictfp",
    "synchronized",
    "native",
    "transient",
    "volatile",
    "default",
];

impl TypeDefinitionProcessor {
    fn modifiers(node: &AstNode) -> Vec<String> {
        let mut modifiers: Vec<String> = node
            .child_of_type("modifiers")
            .map(|m| {
                m.text
                    .split_whitespace()
                    .filter(|t| MODIFIER_KEYWORDS.contains(t))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if node.node_type.starts_with("abstract_") && !modifiers.iter().any(|m| m == "abstract") {
            modifiers.push("abstract".to_string());
        }
        modifiers
    }
}

impl QueryProcessor for TypeDefinitionProcessor {
    type Output = TypeDefinition;

    fn process(
        &self,
        matches: &[QueryMatch],
        context: &QueryExecutionContext,
    ) -> anyhow::Result<Vec<TypeDefinition>> {
        let mut definitions = Vec::with_capacity(matches.len());
        for m in matches {
            let Some(name) = m.capture_text("name") else {
                continue;
            };

            let mut extends = Vec::new();
            let mut implements = Vec::new();
            for (clause_kind, heritage) in self.heritage {
                if let Some(clause) = m.node.find_shallow(clause_kind, self.body_kinds) {
                    let names = type_names(clause);
                    match heritage {
                        Heritage::Extends => extends.extend(names),
                        Heritage::Implements => implements.extend(names),
                    }
                }
            }

            definitions.push(TypeDefinition {
                location: context.location_of(&m.node),
                node_text: m.node.text.clone(),
                name: name.to_string(),
                kind: self.kind.to_string(),
                extends,
                implements,
                modifiers: Self::modifiers(&m.node),
            });
        }
        Ok(definitions)
    }
}

/// Where a grammar puts a function's return type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnTypeRule {
    /// The grammar has no return type annotation.
    None,
    /// A direct child of the given kind, such as `: T` annotations.
    ChildKind(&'static str),
    /// The child immediately before the name (`int foo()`).
    BeforeName,
    /// The child immediately after the parameter list (`def f() -> T`).
    AfterParameters,
}

/// Children before a name that are not a return type.
const NOT_A_TYPE: &[&str] = &["modifiers", "type_parameters", "marker_annotation", "annotation"];

/// Builds [`FunctionDefinition`]s from matches with `name` and optionally
/// `parameters`, `function` and `receiver` captures.
#[derive(Debug, Clone, Copy)]
pub struct FunctionDefinitionProcessor {
    pub kind: &'static str,
    pub return_type: ReturnTypeRule,
    /// Function body kinds; never read as a return type or searched for
    /// parameters.
    pub body_kinds: &'static [&'static str],
}

impl FunctionDefinitionProcessor {
    fn return_type(
        &self,
        node: &AstNode,
        name: &AstNode,
        parameters: Option<&AstNode>,
    ) -> Option<String> {
        match self.return_type {
            ReturnTypeRule::None => None,
            ReturnTypeRule::ChildKind(kind) => node
                .child_of_type(kind)
                .map(|t| t.text.trim_start_matches(':').trim().to_string()),
            ReturnTypeRule::BeforeName => {
                let index = child_index(node, name)?;
                let previous = node.children.get(index.checked_sub(1)?)?;
                if NOT_A_TYPE.contains(&previous.node_type.as_str()) {
                    return None;
                }
                Some(previous.text.clone())
            }
            ReturnTypeRule::AfterParameters => {
                let index = child_index(node, parameters?)?;
                let next = node.children.get(index + 1)?;
                if self.body_kinds.contains(&next.node_type.as_str())
                    || COMMENT_KINDS.contains(&next.node_type.as_str())
                {
                    return None;
                }
                Some(next.text.trim_start_matches("->").trim().to_string())
            }
        }
    }

    fn parameters(&self, m: &QueryMatch, function: &AstNode) -> Vec<String> {
        if let Some(parameters) = m.capture("parameters") {
            return parameter_texts(parameters);
        }
        if let Some(parameters) = function.find_shallow("formal_parameters", self.body_kinds) {
            return parameter_texts(parameters);
        }
        // Single unparenthesized arrow parameter: `x => x + 1`.
        match function.children.first() {
            Some(first) if function.is("arrow_function") && first.is("identifier") => {
                vec![first.text.clone()]
            }
            _ => Vec::new(),
        }
    }
}

impl QueryProcessor for FunctionDefinitionProcessor {
    type Output = FunctionDefinition;

    fn process(
        &self,
        matches: &[QueryMatch],
        context: &QueryExecutionContext,
    ) -> anyhow::Result<Vec<FunctionDefinition>> {
        let mut functions = Vec::with_capacity(matches.len());
        for m in matches {
            let Some(name) = m.capture("name") else {
                continue;
            };
            let function = m.capture("function").unwrap_or(&m.node);
            let receiver = m.capture("receiver").and_then(|r| {
                r.find_descendant(|n| n.is("type_identifier"))
                    .map(|t| t.text.clone())
            });

            functions.push(FunctionDefinition {
                location: context.location_of(&m.node),
                node_text: m.node.text.clone(),
                name: name.text.clone(),
                kind: self.kind.to_string(),
                parameters: self.parameters(m, function),
                return_type: self.return_type(&m.node, name, m.capture("parameters")),
                is_async: ASYNC_PREFIX.is_match(function.text.trim_start()),
                receiver,
            });
        }
        Ok(functions)
    }
}

static ASYNC_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^async\b").expect("valid async prefix regex"));

/// Builds [`Package`]s from matches with a `name` capture.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageProcessor;

impl QueryProcessor for PackageProcessor {
    type Output = Package;

    fn process(
        &self,
        matches: &[QueryMatch],
        context: &QueryExecutionContext,
    ) -> anyhow::Result<Vec<Package>> {
        Ok(matches
            .iter()
            .filter_map(|m| {
                let name = m.capture_text("name")?;
                Some(Package {
                    location: context.location_of(&m.node),
                    node_text: m.node.text.clone(),
                    name: name.to_string(),
                })
            })
            .collect())
    }
}

static SEMANTIC_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@semantic-tags:\s*([^\n*]+)").expect("valid semantic tag regex"));

static DESCRIPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@description:\s*([^\n*]+)").expect("valid description regex"));

fn marker_value(text: &str) -> &str {
    text.trim().trim_end_matches(['"', '\'']).trim()
}

/// Parse `@semantic-tags` and `@description` markers out of comment text.
pub fn parse_semantic_markers(text: &str) -> (Vec<String>, Option<String>) {
    let tags = SEMANTIC_TAGS
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .flat_map(|m| marker_value(m.as_str()).split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    let description = DESCRIPTION
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| marker_value(m.as_str()).to_string())
        .filter(|d| !d.is_empty());
    (tags, description)
}

/// Extracts semantic markers from matches with a `comment` capture.
///
/// Comments without markers produce no record.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemanticTagProcessor;

impl QueryProcessor for SemanticTagProcessor {
    type Output = SemanticTag;

    fn process(
        &self,
        matches: &[QueryMatch],
        context: &QueryExecutionContext,
    ) -> anyhow::Result<Vec<SemanticTag>> {
        let mut tags = Vec::new();
        for m in matches {
            let comment = m.capture("comment").unwrap_or(&m.node);
            let (found, description) = parse_semantic_markers(&comment.text);
            if found.is_empty() && description.is_none() {
                continue;
            }
            tags.push(SemanticTag {
                location: context.location_of(comment),
                node_text: comment.text.clone(),
                tags: found,
                description,
            });
        }
        Ok(tags)
    }
}

/// Builds [`ImportRecord`]s from ES `import` statements with a `source`
/// capture.
#[derive(Debug, Clone, Copy, Default)]
pub struct EsImportProcessor;

impl QueryProcessor for EsImportProcessor {
    type Output = ImportRecord;

    fn process(
        &self,
        matches: &[QueryMatch],
        context: &QueryExecutionContext,
    ) -> anyhow::Result<Vec<ImportRecord>> {
        let mut imports = Vec::with_capacity(matches.len());
        for m in matches {
            let Some(source) = m.capture_text("source") else {
                continue;
            };
            let mut record = ImportRecord {
                location: context.location_of(&m.node),
                node_text: m.node.text.clone(),
                source: strip_quotes(source).to_string(),
                imported: Vec::new(),
                alias: None,
                wildcard: false,
            };

            if let Some(clause) = m.node.child_of_type("import_clause") {
                for part in &clause.children {
                    match part.node_type.as_str() {
                        "identifier" => record.imported.push(part.text.clone()),
                        "named_imports" => {
                            for specifier in part.children_of_type("import_specifier") {
                                if let Some(name) = specifier.children.first() {
                                    record.imported.push(name.text.clone());
                                }
                            }
                        }
                        "namespace_import" => {
                            record.wildcard = true;
                            record.alias = part.child_of_type("identifier").map(|i| i.text.clone());
                        }
                        _ => {}
                    }
                }
            }
            imports.push(record);
        }
        Ok(imports)
    }
}

/// Builds [`Export`]s from ES `export` statements captured as `export`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportProcessor;

impl ExportProcessor {
    fn declaration_kind(node_type: &str) -> &str {
        match node_type {
            "lexical_declaration" | "variable_declaration" => "variable",
            "type_alias_declaration" => "type",
            "abstract_class_declaration" => "class",
            other => other.strip_suffix("_declaration").unwrap_or(other),
        }
    }

    fn declared_names(declaration: &AstNode) -> Vec<String> {
        let declarators: Vec<String> = declaration
            .children_of_type("variable_declarator")
            .filter_map(|d| d.children.first())
            .map(|n| n.text.clone())
            .collect();
        if !declarators.is_empty() {
            return declarators;
        }
        declaration
            .children
            .iter()
            .find(|c| c.is("identifier") || c.is("type_identifier"))
            .map(|n| vec![n.text.clone()])
            .unwrap_or_default()
    }
}

/// Node kinds an `export` statement can carry as its declaration.
const EXPORTABLE: &[&str] = &[
    "class_declaration",
    "abstract_class_declaration",
    "function_declaration",
    "generator_function_declaration",
    "lexical_declaration",
    "variable_declaration",
    "interface_declaration",
    "type_alias_declaration",
    "enum_declaration",
];

impl QueryProcessor for ExportProcessor {
    type Output = Export;

    fn process(
        &self,
        matches: &[QueryMatch],
        context: &QueryExecutionContext,
    ) -> anyhow::Result<Vec<Export>> {
        let mut exports = Vec::with_capacity(matches.len());
        for m in matches {
            let node = m.capture("export").unwrap_or(&m.node);
            let is_default = node
                .text
                .trim_start()
                .strip_prefix("export")
                .map(|rest| rest.trim_start().starts_with("default"))
                .unwrap_or(false);
            let source = node
                .child_of_type("string")
                .map(|s| strip_quotes(&s.text).to_string());

            let (kind, names) = if let Some(declaration) = node
                .children
                .iter()
                .find(|c| EXPORTABLE.contains(&c.node_type.as_str()))
            {
                (
                    Self::declaration_kind(&declaration.node_type).to_string(),
                    Self::declared_names(declaration),
                )
            } else if let Some(clause) = node.child_of_type("export_clause") {
                let names = clause
                    .children_of_type("export_specifier")
                    .filter_map(|s| s.children.last())
                    .map(|n| n.text.clone())
                    .collect();
                ("clause".to_string(), names)
            } else if node.child_of_type("namespace_export").is_some() || node.text.contains('*') {
                ("namespace".to_string(), Vec::new())
            } else {
                ("expression".to_string(), Vec::new())
            };

            exports.push(Export {
                location: context.location_of(node),
                node_text: node.text.clone(),
                kind,
                names,
                is_default,
                source,
            });
        }
        Ok(exports)
    }
}
