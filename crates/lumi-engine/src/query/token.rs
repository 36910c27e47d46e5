//! Tokens produced by the query lexer.

use std::fmt;

use crate::types::Value;

/// Byte span of a token over the input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Offset of the first byte.
    pub start: usize,
    /// Offset one past the last byte.
    pub end: usize,
}

impl Span {
    /// Creates a span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true for a zero-width span.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// The kind of a lexed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `[A-Za-z_][A-Za-z0-9_]*`
    Identifier,
    /// `"..."` or `'...'` with backslash escapes.
    StringLiteral,
    /// Optional `-` then digits and dots.
    FloatLiteral,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `|`
    Pipe,
    /// A run of whitespace. Emitted so that token spans tile the input;
    /// the parser skips these.
    Whitespace,
    /// Anything the lexer could not turn into a token.
    Error,
    /// End of input.
    Eos,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Identifier => "Identifier",
            TokenKind::StringLiteral => "StringLiteral",
            TokenKind::FloatLiteral => "FloatLiteral",
            TokenKind::LParen => "L_Paren",
            TokenKind::RParen => "R_Paren",
            TokenKind::Comma => "Comma",
            TokenKind::Pipe => "Pipe",
            TokenKind::Whitespace => "Whitespace",
            TokenKind::Error => "ErrorToken",
            TokenKind::Eos => "EOS",
        };
        f.write_str(name)
    }
}

/// A token with its span and, for literal kinds, its decoded value.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Token kind.
    pub kind: TokenKind,
    /// Byte span over the input.
    pub span: Span,
    /// Decoded payload: the identifier or string text, or the parsed float.
    /// [`Value::Null`] for kinds without a payload.
    pub value: Value,
}

impl Token {
    /// Creates a payload-less token.
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self {
            kind,
            span,
            value: Value::Null,
        }
    }

    /// Creates a token carrying a decoded value.
    pub fn with_value(kind: TokenKind, span: Span, value: Value) -> Self {
        Self { kind, span, value }
    }
}
