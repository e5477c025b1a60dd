//! Tree-sitter boundary adapter.
//!
//! Produces the inputs the engine consumes: a converted syntax tree for the
//! execution context and, per query pattern, the list of matches. The engine
//! never calls into this module.

use std::path::Path;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Parser, Point, Query, QueryCursor, Tree};

use crate::query::{
    AstNode, Capture, Language, Position, QueryError, QueryExecutionContext, QueryFunction,
    QueryMatch,
};

/// Grammar for a language. `.tsx` files use the TSX dialect.
pub fn grammar_for(language: &Language, path: &str) -> Result<tree_sitter::Language, QueryError> {
    let grammar: tree_sitter::Language = match language.as_str() {
        "typescript" if path.ends_with(".tsx") => tree_sitter_typescript::LANGUAGE_TSX.into(),
        "typescript" => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        "javascript" => tree_sitter_javascript::LANGUAGE.into(),
        "java" => tree_sitter_java::LANGUAGE.into(),
        "python" => tree_sitter_python::LANGUAGE.into(),
        "go" => tree_sitter_go::LANGUAGE.into(),
        other => return Err(QueryError::UnsupportedLanguage(other.to_string())),
    };
    Ok(grammar)
}

/// Check that a pattern compiles against a language's grammar.
pub fn check_pattern(key: &str, language: &Language, pattern: &str) -> Result<(), QueryError> {
    let grammar = grammar_for(language, "")?;
    Query::new(&grammar, pattern).map_err(|e| QueryError::Pattern {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    Ok(())
}

fn position(point: Point) -> Position {
    Position::new(point.row, point.column)
}

/// Convert a tree-sitter node and its named descendants.
pub fn convert_node(node: Node<'_>, source: &[u8]) -> AstNode {
    let mut cursor = node.walk();
    let children = node
        .named_children(&mut cursor)
        .map(|child| convert_node(child, source))
        .collect();

    AstNode {
        node_type: node.kind().to_string(),
        text: node.utf8_text(source).unwrap_or_default().to_string(),
        start_position: position(node.start_position()),
        end_position: position(node.end_position()),
        children,
    }
}

/// A parsed source file.
pub struct ParsedSource {
    path: String,
    language: Language,
    source: String,
    grammar: tree_sitter::Language,
    tree: Tree,
}

impl ParsedSource {
    /// Parse source text in the given language.
    pub fn parse(
        path: impl Into<String>,
        source: impl Into<String>,
        language: Language,
    ) -> Result<Self, QueryError> {
        let path = path.into();
        let source = source.into();
        let grammar = grammar_for(&language, &path)?;

        let mut parser = Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| QueryError::Parse {
                file: path.clone(),
                message: e.to_string(),
            })?;
        let tree = parser.parse(&source, None).ok_or_else(|| QueryError::Parse {
            file: path.clone(),
            message: "parser produced no tree".to_string(),
        })?;

        if tree.root_node().has_error() {
            tracing::debug!(file = %path, "source contains syntax errors");
        }

        Ok(Self {
            path,
            language,
            source,
            grammar,
            tree,
        })
    }

    /// Read and parse a file, detecting its language from the extension.
    pub fn from_path(path: &Path) -> Result<Self, QueryError> {
        let display = path.display().to_string();
        let language = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Language::from_extension)
            .ok_or_else(|| QueryError::UnsupportedLanguage(display.clone()))?;
        let source = std::fs::read_to_string(path).map_err(|source| QueryError::Io {
            path: display.clone(),
            source,
        })?;
        Self::parse(display, source, language)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The converted root node.
    pub fn root(&self) -> AstNode {
        convert_node(self.tree.root_node(), self.source.as_bytes())
    }

    /// Execution context for this file.
    pub fn context(&self) -> QueryExecutionContext {
        QueryExecutionContext::new(
            self.source.clone(),
            self.language.clone(),
            self.path.clone(),
            self.root(),
        )
    }

    /// Matches of a query's pattern in this file.
    pub fn matches_for(&self, function: &QueryFunction) -> Result<Vec<QueryMatch>, QueryError> {
        self.run_pattern(function.name(), function.query())
    }

    /// Matches of an ad-hoc pattern in this file.
    pub fn matches(&self, pattern: &str) -> Result<Vec<QueryMatch>, QueryError> {
        self.run_pattern("<inline>", pattern)
    }

    /// Each match's node is its widest capture. Matches without captures are
    /// dropped.
    fn run_pattern(&self, key: &str, pattern: &str) -> Result<Vec<QueryMatch>, QueryError> {
        let query = Query::new(&self.grammar, pattern).map_err(|e| QueryError::Pattern {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        let source = self.source.as_bytes();
        let names = query.capture_names();

        let mut cursor = QueryCursor::new();
        let mut found = cursor.matches(&query, self.tree.root_node(), source);

        let mut matches = Vec::new();
        while let Some(m) = found.next() {
            let widest = m
                .captures
                .iter()
                .max_by_key(|c| {
                    let width = c.node.end_byte() - c.node.start_byte();
                    (width, std::cmp::Reverse(c.index))
                });
            let Some(widest) = widest else {
                continue;
            };

            let captures = m
                .captures
                .iter()
                .map(|c| Capture::new(names[c.index as usize], convert_node(c.node, source)))
                .collect();
            matches.push(QueryMatch::new(convert_node(widest.node, source), captures));
        }

        tracing::trace!(query = key, file = %self.path, matches = matches.len(), "matched pattern");
        Ok(matches)
    }
}
