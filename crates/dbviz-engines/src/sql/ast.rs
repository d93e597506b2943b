//! Arena-allocated syntax tree nodes.

use std::fmt;

use dbviz_core::{AstNodeId, Metadata};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AstKind {
    Statement,
    Columns,
    Column,
    From,
    Table,
    Join,
    Where,
    BinaryExpr,
    UnaryExpr,
    Identifier,
    Literal,
    OrderBy,
    Limit,
}

impl AstKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AstKind::Statement => "STATEMENT",
            AstKind::Columns => "COLUMNS",
            AstKind::Column => "COLUMN",
            AstKind::From => "FROM",
            AstKind::Table => "TABLE",
            AstKind::Join => "JOIN",
            AstKind::Where => "WHERE",
            AstKind::BinaryExpr => "BINARY_EXPR",
            AstKind::UnaryExpr => "UNARY_EXPR",
            AstKind::Identifier => "IDENTIFIER",
            AstKind::Literal => "LITERAL",
            AstKind::OrderBy => "ORDER_BY",
            AstKind::Limit => "LIMIT",
        }
    }
}

impl fmt::Display for AstKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AstNode {
    pub id: AstNodeId,
    #[serde(rename = "type")]
    pub kind: AstKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub children: Vec<AstNodeId>,
    pub parent: Option<AstNodeId>,
    /// Alias, sort direction, literal subtype, join kind, offset.
    #[serde(skip_serializing_if = "indexmap::IndexMap::is_empty")]
    pub meta: Metadata,
}

impl AstNode {
    pub fn new(id: AstNodeId, kind: AstKind, value: Option<String>) -> Self {
        AstNode {
            id,
            kind,
            value,
            children: Vec::new(),
            parent: None,
            meta: Metadata::new(),
        }
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(|v| v.as_str())
    }
}
