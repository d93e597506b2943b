//! Single-pass SQL scanner.
//!
//! The lexer never backtracks: each call to [`Lexer::next_token`] inspects the
//! next character, consumes one token and records its half-open byte span.
//! Lexical problems become `ERROR` tokens instead of aborting the scan.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    Select,
    From,
    Where,
    And,
    Or,
    Not,
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    Create,
    Table,
    Join,
    Inner,
    Left,
    On,
    As,
    Order,
    Group,
    By,
    Asc,
    Desc,
    Limit,
    Offset,
    Identifier,
    Number,
    String,
    Operator,
    Comma,
    Dot,
    Star,
    #[serde(rename = "LPAREN")]
    LParen,
    #[serde(rename = "RPAREN")]
    RParen,
    Semicolon,
    Eof,
    Error,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Select => "SELECT",
            TokenKind::From => "FROM",
            TokenKind::Where => "WHERE",
            TokenKind::And => "AND",
            TokenKind::Or => "OR",
            TokenKind::Not => "NOT",
            TokenKind::Insert => "INSERT",
            TokenKind::Into => "INTO",
            TokenKind::Values => "VALUES",
            TokenKind::Update => "UPDATE",
            TokenKind::Set => "SET",
            TokenKind::Delete => "DELETE",
            TokenKind::Create => "CREATE",
            TokenKind::Table => "TABLE",
            TokenKind::Join => "JOIN",
            TokenKind::Inner => "INNER",
            TokenKind::Left => "LEFT",
            TokenKind::On => "ON",
            TokenKind::As => "AS",
            TokenKind::Order => "ORDER",
            TokenKind::Group => "GROUP",
            TokenKind::By => "BY",
            TokenKind::Asc => "ASC",
            TokenKind::Desc => "DESC",
            TokenKind::Limit => "LIMIT",
            TokenKind::Offset => "OFFSET",
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::Number => "NUMBER",
            TokenKind::String => "STRING",
            TokenKind::Operator => "OPERATOR",
            TokenKind::Comma => "COMMA",
            TokenKind::Dot => "DOT",
            TokenKind::Star => "STAR",
            TokenKind::LParen => "LPAREN",
            TokenKind::RParen => "RPAREN",
            TokenKind::Semicolon => "SEMICOLON",
            TokenKind::Eof => "EOF",
            TokenKind::Error => "ERROR",
        }
    }

    /// Case-insensitive keyword lookup.
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word.to_ascii_uppercase().as_str() {
            "SELECT" => TokenKind::Select,
            "FROM" => TokenKind::From,
            "WHERE" => TokenKind::Where,
            "AND" => TokenKind::And,
            "OR" => TokenKind::Or,
            "NOT" => TokenKind::Not,
            "INSERT" => TokenKind::Insert,
            "INTO" => TokenKind::Into,
            "VALUES" => TokenKind::Values,
            "UPDATE" => TokenKind::Update,
            "SET" => TokenKind::Set,
            "DELETE" => TokenKind::Delete,
            "CREATE" => TokenKind::Create,
            "TABLE" => TokenKind::Table,
            "JOIN" => TokenKind::Join,
            "INNER" => TokenKind::Inner,
            "LEFT" => TokenKind::Left,
            "ON" => TokenKind::On,
            "AS" => TokenKind::As,
            "ORDER" => TokenKind::Order,
            "GROUP" => TokenKind::Group,
            "BY" => TokenKind::By,
            "ASC" => TokenKind::Asc,
            "DESC" => TokenKind::Desc,
            "LIMIT" => TokenKind::Limit,
            "OFFSET" => TokenKind::Offset,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open byte range into the query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Keywords are upper-cased; string literals hold the text between the quotes.
    pub value: String,
    pub position: Span,
}

impl Token {
    fn new(kind: TokenKind, value: impl Into<String>, start: usize, end: usize) -> Self {
        Token {
            kind,
            value: value.into(),
            position: Span { start, end },
        }
    }

    /// `KIND` or `KIND 'value'`, for messages.
    pub fn describe(&self) -> String {
        if self.value.is_empty() {
            self.kind.to_string()
        } else {
            format!("{} '{}'", self.kind, self.value)
        }
    }
}

pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src,
            pos: 0,
            done: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
    }

    /// Scans the next token. Returns `EOF` at (and after) the end of input.
    pub fn next_token(&mut self) -> Token {
        self.eat_while(char::is_whitespace);
        let start = self.pos;
        let Some(c) = self.bump() else {
            return Token::new(TokenKind::Eof, "", start, start);
        };

        let single = match c {
            ',' => Some(TokenKind::Comma),
            '*' => Some(TokenKind::Star),
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            ';' => Some(TokenKind::Semicolon),
            '.' => Some(TokenKind::Dot),
            _ => None,
        };
        if let Some(kind) = single {
            return Token::new(kind, c.to_string(), start, self.pos);
        }

        match c {
            '=' | '<' | '>' | '!' => {
                let two = matches!(
                    (c, self.peek()),
                    ('<', Some('=')) | ('>', Some('=')) | ('!', Some('=')) | ('<', Some('>'))
                );
                if two {
                    self.bump();
                }
                Token::new(TokenKind::Operator, &self.src[start..self.pos], start, self.pos)
            }
            '\'' | '"' => self.string(start, c),
            c if c.is_ascii_digit() => {
                self.eat_while(|c| c.is_ascii_digit());
                if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                    self.eat_while(|c| c.is_ascii_digit());
                }
                Token::new(TokenKind::Number, &self.src[start..self.pos], start, self.pos)
            }
            c if c.is_alphabetic() || c == '_' => {
                self.eat_while(|c| c.is_alphanumeric() || c == '_');
                let word = &self.src[start..self.pos];
                match TokenKind::keyword(word) {
                    Some(kind) => Token::new(kind, word.to_ascii_uppercase(), start, self.pos),
                    None => Token::new(TokenKind::Identifier, word, start, self.pos),
                }
            }
            other => Token::new(TokenKind::Error, other.to_string(), start, self.pos),
        }
    }

    fn string(&mut self, start: usize, quote: char) -> Token {
        loop {
            match self.bump() {
                None => {
                    return Token::new(TokenKind::Error, "unterminated string", start, self.pos);
                }
                Some('\\') => {
                    self.bump();
                }
                Some(c) if c == quote => break,
                Some(_) => {}
            }
        }
        let inner = &self.src[start + quote.len_utf8()..self.pos - quote.len_utf8()];
        Token::new(TokenKind::String, inner, start, self.pos)
    }
}

/// Yields every token including the trailing `EOF`, then stops.
impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.done {
            return None;
        }
        let token = self.next_token();
        self.done = token.kind == TokenKind::Eof;
        Some(token)
    }
}

pub fn tokenize(src: &str) -> Vec<Token> {
    Lexer::new(src).collect()
}
