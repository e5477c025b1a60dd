//! Passive data types shared by the registry, the engine and the packs.
//!
//! Nothing here owns behaviour beyond read-only navigation: nodes and
//! matches are produced upstream and handed to processors by reference.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{Language, QueryError};

/// Zero-based row/column position, as reported by the parser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

/// A language-agnostic syntax tree node.
///
/// Only `node_type` varies between grammars; the structure is the same for
/// every language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstNode {
    #[serde(rename = "type")]
    pub node_type: String,
    pub text: String,
    pub start_position: Position,
    pub end_position: Position,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AstNode>,
}

impl AstNode {
    /// Create a leaf node.
    pub fn new(
        node_type: impl Into<String>,
        text: impl Into<String>,
        start_position: Position,
        end_position: Position,
    ) -> Self {
        Self {
            node_type: node_type.into(),
            text: text.into(),
            start_position,
            end_position,
            children: Vec::new(),
        }
    }

    /// Attach children to this node.
    pub fn with_children(mut self, children: Vec<AstNode>) -> Self {
        self.children = children;
        self
    }

    /// Whether this node has the given type.
    pub fn is(&self, node_type: &str) -> bool {
        self.node_type == node_type
    }

    /// First direct child of the given type.
    pub fn child_of_type(&self, node_type: &str) -> Option<&AstNode> {
        self.children.iter().find(|c| c.node_type == node_type)
    }

    /// All direct children of the given type.
    pub fn children_of_type<'a>(&'a self, node_type: &'a str) -> impl Iterator<Item = &'a AstNode> {
        self.children.iter().filter(move |c| c.node_type == node_type)
    }

    /// Depth-first, pre-order traversal of every node below this one.
    ///
    /// The node itself is not included.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }

    /// First descendant matching the predicate, in pre-order.
    pub fn find_descendant<P>(&self, mut predicate: P) -> Option<&AstNode>
    where
        P: FnMut(&AstNode) -> bool,
    {
        self.descendants().find(|n| predicate(*n))
    }

    /// First descendant of the given type that is not nested inside any of
    /// the `stop_at` node types.
    pub fn find_shallow(&self, node_type: &str, stop_at: &[&str]) -> Option<&AstNode> {
        let mut stack: Vec<&AstNode> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            if node.node_type == node_type {
                return Some(node);
            }
            if stop_at.contains(&node.node_type.as_str()) {
                continue;
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }
}

/// Iterator returned by [`AstNode::descendants`].
pub struct Descendants<'a> {
    stack: Vec<&'a AstNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a AstNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// A named sub-node referenced by a query pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    pub name: String,
    pub node: AstNode,
}

impl Capture {
    pub fn new(name: impl Into<String>, node: AstNode) -> Self {
        Self {
            name: name.into(),
            node,
        }
    }
}

/// One occurrence of a query pattern in a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub node: AstNode,
    #[serde(default)]
    pub captures: Vec<Capture>,
}

impl QueryMatch {
    pub fn new(node: AstNode, captures: Vec<Capture>) -> Self {
        Self { node, captures }
    }

    /// First capture with the given name.
    pub fn capture(&self, name: &str) -> Option<&AstNode> {
        self.captures.iter().find(|c| c.name == name).map(|c| &c.node)
    }

    /// Every capture with the given name (quantified captures repeat).
    pub fn captures_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a AstNode> {
        self.captures
            .iter()
            .filter(move |c| c.name == name)
            .map(|c| &c.node)
    }

    /// Text of the first capture with the given name.
    pub fn capture_text(&self, name: &str) -> Option<&str> {
        self.capture(name).map(|n| n.text.as_str())
    }
}

/// Everything a processor may know about the file being analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryExecutionContext {
    pub source_code: String,
    pub language: Language,
    pub file_path: String,
    pub ast_node: AstNode,
}

impl QueryExecutionContext {
    pub fn new(
        source_code: impl Into<String>,
        language: Language,
        file_path: impl Into<String>,
        ast_node: AstNode,
    ) -> Self {
        Self {
            source_code: source_code.into(),
            language,
            file_path: file_path.into(),
            ast_node,
        }
    }

    /// Location of a node inside this context's file.
    pub fn location_of(&self, node: &AstNode) -> Location {
        Location::from_node(&self.file_path, node)
    }
}

/// Source location of a result, with 1-indexed lines and columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub file_path: String,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl Location {
    /// Create a location from a node (positions are 0-indexed).
    pub fn from_node(file_path: &str, node: &AstNode) -> Self {
        Self {
            file_path: file_path.to_string(),
            start_line: node.start_position.row + 1,
            start_column: node.start_position.column + 1,
            end_line: node.end_position.row + 1,
            end_column: node.end_position.column + 1,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file_path, self.start_line, self.start_column)
    }
}

/// A typed record produced by a processor.
///
/// Records are serialized into [`QueryResult::data`] so generic tooling can
/// sort, display and compare them without knowing the concrete type.
pub trait QueryRecord: Serialize + Send {
    fn location(&self) -> &Location;
    fn node_text(&self) -> &str;
}

/// The uniform result shape returned by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub query_name: String,
    pub result_type: String,
    pub location: Location,
    pub node_text: String,
    /// The full serialized record, including the fields above.
    pub data: serde_json::Value,
}

impl QueryResult {
    /// Wrap a typed record, stamping it with the query that produced it.
    pub fn from_record<R: QueryRecord>(
        query_name: &str,
        result_type: &str,
        record: &R,
    ) -> Result<Self, QueryError> {
        let data = serde_json::to_value(record).map_err(|source| QueryError::Encode {
            key: query_name.to_string(),
            source,
        })?;
        Ok(Self {
            query_name: query_name.to_string(),
            result_type: result_type.to_string(),
            location: record.location().clone(),
            node_text: record.node_text().to_string(),
            data,
        })
    }

    /// Decode the payload back into the record type of the producing query.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, QueryError> {
        serde_json::from_value(self.data.clone()).map_err(|source| QueryError::Decode {
            key: self.query_name.clone(),
            source,
        })
    }

    /// Read one string field from the payload.
    pub fn field_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(|v| v.as_str())
    }
}

/// A generic record: the match location plus the text of every capture.
///
/// Useful for ad-hoc queries that do not need a dedicated result type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub location: Location,
    pub node_text: String,
    pub captures: BTreeMap<String, String>,
}

impl MatchRecord {
    pub fn from_match(m: &QueryMatch, context: &QueryExecutionContext) -> Self {
        let mut captures = BTreeMap::new();
        for capture in &m.captures {
            captures
                .entry(capture.name.clone())
                .or_insert_with(|| capture.node.text.clone());
        }
        Self {
            location: context.location_of(&m.node),
            node_text: m.node.text.clone(),
            captures,
        }
    }
}

impl QueryRecord for MatchRecord {
    fn location(&self) -> &Location {
        &self.location
    }

    fn node_text(&self) -> &str {
        &self.node_text
    }
}
