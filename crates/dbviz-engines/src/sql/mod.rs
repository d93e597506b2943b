//! SQL lexer/parser trace producer.
//!
//! Operations: `parse {query}` and `tokenize {query}`. Every operation starts
//! from an empty [`QueryState`]; there is no configuration.

pub mod ast;
pub mod lexer;
pub mod parser;

use std::collections::BTreeMap;

use dbviz_core::{palette, AstNodeId, Highlight, OperationError, Probe, Trace, TraceProducer, TraceRecorder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use ast::{AstKind, AstNode};
pub use lexer::{tokenize, Lexer, Span, Token, TokenKind};
pub use parser::{ParseError, Parser, MAX_NESTING_DEPTH};

pub const PROJECT: &str = "query-parser";

/// Longest accepted query, in bytes.
pub const MAX_QUERY_LEN: usize = 512;
/// Most tokens (excluding EOF) an accepted query may lex into. Every step
/// captures the token list and the AST so far, so trace size grows with the
/// square of this.
pub const MAX_QUERY_TOKENS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "operation", content = "params", rename_all = "snake_case")]
pub enum QueryOperation {
    Parse { query: String },
    Tokenize { query: String },
}

impl QueryOperation {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryOperation::Parse { .. } => "parse",
            QueryOperation::Tokenize { .. } => "tokenize",
        }
    }

    pub fn query(&self) -> &str {
        match self {
            QueryOperation::Parse { query } | QueryOperation::Tokenize { query } => query,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Tokenizing,
    Parsing,
    Complete,
    Error,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryState {
    pub query: String,
    pub tokens: Vec<Token>,
    pub ast_nodes: BTreeMap<AstNodeId, AstNode>,
    pub ast_root: Option<AstNodeId>,
    pub phase: Phase,
    pub errors: Vec<String>,
    #[serde(skip)]
    pub(crate) next_node: u32,
}

impl QueryState {
    pub fn new(query: &str) -> Self {
        QueryState {
            query: query.to_string(),
            ..QueryState::default()
        }
    }

    pub fn root(&self) -> Option<&AstNode> {
        self.ast_root.and_then(|id| self.ast_nodes.get(&id))
    }

    fn lex(&mut self, probe: &mut Probe<'_>) {
        self.phase = Phase::Tokenizing;
        probe.record(self, "Tokenization", "Breaking input into tokens (lexical analysis)", []);
        for token in tokenize(&self.query) {
            if token.kind == TokenKind::Eof {
                self.tokens.push(token);
                break;
            }
            let index = self.tokens.len();
            let highlight = if token.kind == TokenKind::Error {
                Highlight::token(format!("token-{index}"), palette::FAILURE).shake()
            } else {
                Highlight::token(format!("token-{index}"), palette::EXAMINE).pulse()
            };
            let title = format!("Token: {}", token.kind);
            let description = format!(
                "Found {} token '{}' at position {}-{}",
                token.kind, token.value, token.position.start, token.position.end
            );
            self.tokens.push(token);
            probe.record(self, title, description, [highlight]);
        }
        probe.record(
            self,
            "Tokenization Complete",
            format!("Created {} tokens from input", self.tokens.len().saturating_sub(1)),
            [],
        );
    }

    /// Rejects queries whose trace would be unreasonably large.
    fn size_error(&self) -> Option<String> {
        if self.query.len() > MAX_QUERY_LEN {
            return Some(format!(
                "query is {} bytes long; at most {MAX_QUERY_LEN} are accepted",
                self.query.len()
            ));
        }
        let tokens = tokenize(&self.query)
            .iter()
            .filter(|t| t.kind != TokenKind::Eof)
            .count();
        (tokens > MAX_QUERY_TOKENS)
            .then(|| format!("query has {tokens} tokens; at most {MAX_QUERY_TOKENS} are accepted"))
    }

    fn lexical_errors(&self) -> Vec<String> {
        self.tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Error)
            .map(|t| format!("invalid input '{}' at position {}", t.value, t.position.start))
            .collect()
    }

    fn parse(&mut self, probe: &mut Probe<'_>) {
        self.phase = Phase::Parsing;
        probe.record(self, "Parsing", "Building Abstract Syntax Tree (AST) from tokens", []);
        match Parser::new(self, probe).parse() {
            Ok(root) => {
                self.phase = Phase::Complete;
                probe.record(
                    self,
                    "Parsing Complete",
                    format!("Successfully created AST with {} nodes", self.ast_nodes.len()),
                    [Highlight::node(root, palette::SUCCESS).pulse()],
                );
            }
            Err(err) => {
                tracing::debug!("parse failed: {}", err);
                self.errors.push(err.to_string());
                self.phase = Phase::Error;
                probe.fail(self, "Parse Error", err.to_string());
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryProducer;

impl TraceProducer for QueryProducer {
    type State = QueryState;
    type Operation = QueryOperation;

    fn project(&self) -> &'static str {
        PROJECT
    }

    fn initial_state(&self, _config: &Value) -> Result<QueryState, OperationError> {
        Ok(QueryState::default())
    }

    fn run_operation(&self, state: &QueryState, operation: &QueryOperation) -> (QueryState, Trace) {
        let mut next = QueryState::new(operation.query());
        let mut rec = TraceRecorder::new(PROJECT, operation.kind(), state);
        {
            let mut probe = Probe::new(&mut rec);
            probe.record(
                &next,
                "Start Parsing",
                format!("Parsing SQL query: {}", next.query),
                [],
            );
            if let Some(reason) = next.size_error() {
                tracing::debug!("query rejected: {}", reason);
                next.phase = Phase::Error;
                next.errors.push(reason.clone());
                probe.fail(&next, "Query Too Large", reason);
            } else {
                next.lex(&mut probe);
                match operation {
                    QueryOperation::Tokenize { .. } => {
                        let errors = next.lexical_errors();
                        if errors.is_empty() {
                            next.phase = Phase::Complete;
                        } else {
                            next.phase = Phase::Error;
                            let description = errors.join("; ");
                            next.errors = errors;
                            probe.fail(&next, "Lexical Error", description);
                        }
                    }
                    QueryOperation::Parse { .. } => next.parse(&mut probe),
                }
            }
        }
        let trace = rec.finish(&next);
        (next, trace)
    }
}
