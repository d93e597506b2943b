//! Recursive-descent parser for the supported `SELECT` subset.
//!
//! ```text
//! statement  := SELECT columns FROM table join* [WHERE expr]
//!               [ORDER BY order (, order)*] [LIMIT n [OFFSET m]] [;] EOF
//! columns    := column (, column)*
//! column     := * | name [[AS] ident]
//! table      := ident [[AS] ident]
//! join       := [INNER | LEFT] JOIN table ON expr
//! expr       := and (OR and)*
//! and        := not (AND not)*
//! not        := NOT not | comparison
//! comparison := primary [op primary]
//! primary    := name | number | string | ( expr )
//! name       := ident [. ident]
//! ```
//!
//! Nodes are created in the shared [`QueryState`] arena as they are parsed,
//! and every creation records a step, so playback shows the tree growing.
//! The first syntax violation stops the parse, and so does nesting `(` or
//! `NOT` deeper than [`MAX_NESTING_DEPTH`].

use dbviz_core::{palette, AstNodeId, Highlight, Probe};
use serde_json::Value;
use thiserror::Error;

use super::ast::{AstKind, AstNode};
use super::lexer::{Token, TokenKind};
use super::QueryState;

/// Deepest accepted nesting of parentheses and `NOT`.
pub const MAX_NESTING_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected {expected} but found {found} at position {position}")]
    Expected {
        expected: &'static str,
        found: String,
        position: usize,
    },

    #[error("unexpected {found} at position {position}")]
    Unexpected { found: String, position: usize },

    #[error("invalid input '{value}' at position {position}")]
    Lexical { value: String, position: usize },

    #[error("expression nested deeper than {limit} levels at position {position}")]
    TooDeep { limit: usize, position: usize },
}

type ParseResult<T> = Result<T, ParseError>;

pub struct Parser<'s, 'p, 'r> {
    state: &'s mut QueryState,
    probe: &'p mut Probe<'r>,
    pos: usize,
    depth: usize,
}

impl<'s, 'p, 'r> Parser<'s, 'p, 'r> {
    /// Parses `state.tokens`, adding nodes to `state.ast_nodes`.
    pub fn new(state: &'s mut QueryState, probe: &'p mut Probe<'r>) -> Self {
        Parser {
            state,
            probe,
            pos: 0,
            depth: 0,
        }
    }

    // -- token cursor ------------------------------------------------------

    fn current(&self) -> Token {
        self.state
            .tokens
            .get(self.pos)
            .or_else(|| self.state.tokens.last())
            .cloned()
            .unwrap_or(Token {
                kind: TokenKind::Eof,
                value: String::new(),
                position: super::lexer::Span {
                    start: self.state.query.len(),
                    end: self.state.query.len(),
                },
            })
    }

    fn kind(&self) -> TokenKind {
        self.current().kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current();
        if self.pos < self.state.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: Option<&'static str>) -> ParseError {
        let token = self.current();
        let position = token.position.start;
        if token.kind == TokenKind::Error {
            return ParseError::Lexical {
                value: token.value,
                position,
            };
        }
        match expected {
            Some(expected) => ParseError::Expected {
                expected,
                found: token.describe(),
                position,
            },
            None => ParseError::Unexpected {
                found: token.describe(),
                position,
            },
        }
    }

    fn enter(&mut self) -> ParseResult<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::TooDeep {
                limit: MAX_NESTING_DEPTH,
                position: self.current().position.start,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> ParseResult<Token> {
        if self.kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(Some(expected)))
        }
    }

    // -- arena -------------------------------------------------------------

    fn create(&mut self, kind: AstKind, value: Option<String>) -> AstNodeId {
        self.create_with(kind, value, [])
    }

    fn create_with<const N: usize>(
        &mut self,
        kind: AstKind,
        value: Option<String>,
        meta: [(&str, Value); N],
    ) -> AstNodeId {
        self.state.next_node += 1;
        let id = AstNodeId(self.state.next_node);
        let mut node = AstNode::new(id, kind, value);
        for (key, v) in meta {
            node.meta.insert(key.to_string(), v);
        }
        let description = match &node.value {
            Some(v) => format!("Created {kind} node with value '{v}'"),
            None => format!("Created {kind} node"),
        };
        self.state.ast_nodes.insert(id, node);
        self.probe.record(
            &*self.state,
            format!("AST: {kind}"),
            description,
            [Highlight::node(id, palette::BUILD).fade_in()],
        );
        id
    }

    fn attach(&mut self, parent: AstNodeId, child: AstNodeId) {
        if let Some(p) = self.state.ast_nodes.get_mut(&parent) {
            p.children.push(child);
        }
        if let Some(c) = self.state.ast_nodes.get_mut(&child) {
            c.parent = Some(parent);
        }
    }

    fn set_meta(&mut self, id: AstNodeId, key: &str, value: Value) {
        if let Some(node) = self.state.ast_nodes.get_mut(&id) {
            node.meta.insert(key.to_string(), value);
        }
    }

    // -- grammar -----------------------------------------------------------

    /// Parses one statement and returns its root node.
    pub fn parse(mut self) -> ParseResult<AstNodeId> {
        if self.kind() != TokenKind::Select {
            return Err(self.unexpected(Some("SELECT")));
        }
        self.advance();
        let root = self.create_with(AstKind::Statement, Some("SELECT".to_string()), [("type", Value::from("SELECT"))]);
        self.state.ast_root = Some(root);

        let columns = self.columns()?;
        self.attach(root, columns);

        self.expect(TokenKind::From, "FROM")?;
        let from = self.create(AstKind::From, None);
        self.attach(root, from);
        let table = self.table()?;
        self.attach(from, table);
        while matches!(self.kind(), TokenKind::Join | TokenKind::Inner | TokenKind::Left) {
            let join = self.join()?;
            self.attach(from, join);
        }

        if self.eat(TokenKind::Where) {
            let clause = self.create(AstKind::Where, None);
            self.attach(root, clause);
            let condition = self.expression()?;
            self.attach(clause, condition);
        }

        if self.eat(TokenKind::Order) {
            self.expect(TokenKind::By, "BY")?;
            let order = self.create(AstKind::OrderBy, None);
            self.attach(root, order);
            loop {
                let column = self.order_item()?;
                self.attach(order, column);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }

        if self.eat(TokenKind::Limit) {
            let count = self.expect(TokenKind::Number, "a row count")?;
            let limit = self.create(AstKind::Limit, Some(count.value));
            self.attach(root, limit);
            if self.eat(TokenKind::Offset) {
                let offset = self.expect(TokenKind::Number, "an offset")?;
                self.set_meta(limit, "offset", Value::from(offset.value));
            }
        }

        self.eat(TokenKind::Semicolon);
        if self.kind() != TokenKind::Eof {
            return Err(self.unexpected(Some("end of statement")));
        }
        Ok(root)
    }

    fn columns(&mut self) -> ParseResult<AstNodeId> {
        if !matches!(self.kind(), TokenKind::Star | TokenKind::Identifier) {
            return Err(self.unexpected(Some("a column list")));
        }
        let columns = self.create(AstKind::Columns, None);
        loop {
            let column = if self.eat(TokenKind::Star) {
                self.create(AstKind::Column, Some("*".to_string()))
            } else {
                let name = self.name()?;
                let column = self.create(AstKind::Column, Some(name));
                if let Some(alias) = self.alias()? {
                    self.set_meta(column, "alias", Value::from(alias));
                }
                column
            };
            self.attach(columns, column);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(columns)
    }

    /// `ident` or `ident.ident`.
    fn name(&mut self) -> ParseResult<String> {
        let first = self.expect(TokenKind::Identifier, "an identifier")?;
        if !self.eat(TokenKind::Dot) {
            return Ok(first.value);
        }
        if self.eat(TokenKind::Star) {
            return Ok(format!("{}.*", first.value));
        }
        let second = self.expect(TokenKind::Identifier, "a column name after '.'")?;
        Ok(format!("{}.{}", first.value, second.value))
    }

    fn alias(&mut self) -> ParseResult<Option<String>> {
        if self.eat(TokenKind::As) {
            return Ok(Some(self.expect(TokenKind::Identifier, "an alias")?.value));
        }
        if self.kind() == TokenKind::Identifier {
            return Ok(Some(self.advance().value));
        }
        Ok(None)
    }

    fn table(&mut self) -> ParseResult<AstNodeId> {
        let name = self.expect(TokenKind::Identifier, "a table name")?;
        let table = self.create(AstKind::Table, Some(name.value));
        if let Some(alias) = self.alias()? {
            self.set_meta(table, "alias", Value::from(alias));
        }
        Ok(table)
    }

    fn join(&mut self) -> ParseResult<AstNodeId> {
        let kind = match self.kind() {
            TokenKind::Inner => {
                self.advance();
                "INNER"
            }
            TokenKind::Left => {
                self.advance();
                "LEFT"
            }
            _ => "INNER",
        };
        self.expect(TokenKind::Join, "JOIN")?;
        let join = self.create_with(AstKind::Join, Some(kind.to_string()), [("joinType", Value::from(kind))]);
        let table = self.table()?;
        self.attach(join, table);
        self.expect(TokenKind::On, "ON")?;
        let condition = self.expression()?;
        self.attach(join, condition);
        Ok(join)
    }

    fn order_item(&mut self) -> ParseResult<AstNodeId> {
        let name = self.name()?;
        let direction = match self.kind() {
            TokenKind::Desc => {
                self.advance();
                "DESC"
            }
            TokenKind::Asc => {
                self.advance();
                "ASC"
            }
            _ => "ASC",
        };
        Ok(self.create_with(AstKind::Column, Some(name), [("direction", Value::from(direction))]))
    }

    fn binary(&mut self, op: &str, left: AstNodeId, right: AstNodeId) -> AstNodeId {
        let node = self.create(AstKind::BinaryExpr, Some(op.to_string()));
        self.attach(node, left);
        self.attach(node, right);
        node
    }

    fn expression(&mut self) -> ParseResult<AstNodeId> {
        let mut left = self.and_expression()?;
        while self.eat(TokenKind::Or) {
            let right = self.and_expression()?;
            left = self.binary("OR", left, right);
        }
        Ok(left)
    }

    fn and_expression(&mut self) -> ParseResult<AstNodeId> {
        let mut left = self.not_expression()?;
        while self.eat(TokenKind::And) {
            let right = self.not_expression()?;
            left = self.binary("AND", left, right);
        }
        Ok(left)
    }

    fn not_expression(&mut self) -> ParseResult<AstNodeId> {
        if self.eat(TokenKind::Not) {
            self.enter()?;
            let operand = self.not_expression()?;
            self.leave();
            let node = self.create(AstKind::UnaryExpr, Some("NOT".to_string()));
            self.attach(node, operand);
            return Ok(node);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> ParseResult<AstNodeId> {
        let left = self.primary()?;
        if self.kind() != TokenKind::Operator {
            return Ok(left);
        }
        let op = self.advance();
        let right = self.primary()?;
        Ok(self.binary(&op.value, left, right))
    }

    fn primary(&mut self) -> ParseResult<AstNodeId> {
        match self.kind() {
            TokenKind::Identifier => {
                let name = self.name()?;
                Ok(self.create(AstKind::Identifier, Some(name)))
            }
            TokenKind::Number => {
                let token = self.advance();
                Ok(self.create_with(AstKind::Literal, Some(token.value), [("literalType", Value::from("number"))]))
            }
            TokenKind::String => {
                let token = self.advance();
                Ok(self.create_with(AstKind::Literal, Some(token.value), [("literalType", Value::from("string"))]))
            }
            TokenKind::LParen => {
                self.enter()?;
                self.advance();
                let inner = self.expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                self.leave();
                Ok(inner)
            }
            _ => Err(self.unexpected(Some("an expression"))),
        }
    }
}
