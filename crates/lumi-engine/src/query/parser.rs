//! Recursive-descent parser for the pipeline query language.

use lumi_common::{Error, Result};

use crate::types::Value;

use super::{tokenize_query, Query, QueryFunction, Span, Token, TokenKind};

/// Parses a query line into a [`Query`].
pub fn parse_query(input: &str) -> Result<Query> {
    Parser::new(tokenize_query(input)).parse()
}

/// Single-token-lookahead parser over a token stream.
///
/// Grammar:
///
/// ```text
/// query := func ('|' func)* EOS
/// func  := IDENT ('(' args? ')')?
/// args  := value (',' value)*
/// value := StringLiteral | FloatLiteral | Identifier
/// ```
///
/// Identifier arguments decay to string values; the bareword `null` becomes
/// the null value. A function without parentheses is `name()`.
pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    /// Creates a parser; whitespace tokens are dropped up front.
    pub fn new(tokens: Vec<Token>) -> Self {
        let tokens = tokens
            .into_iter()
            .filter(|t| t.kind != TokenKind::Whitespace)
            .collect();
        Self { tokens, index: 0 }
    }

    /// Parses the full stream into a query.
    pub fn parse(mut self) -> Result<Query> {
        if self.tokens.is_empty() {
            return Err(Error::new("empty query"));
        }

        // Surface lex-level failures before anything else.
        for token in &self.tokens {
            if token.kind == TokenKind::Error {
                return Err(parse_error(token.span, "invalid token"));
            }
        }

        let mut functions = Vec::new();
        loop {
            functions.push(self.parse_function()?);
            let token = self.expect(&[TokenKind::Pipe, TokenKind::Eos])?;
            if token.kind == TokenKind::Eos {
                break;
            }
        }

        Ok(Query::new(functions))
    }

    fn parse_function(&mut self) -> Result<QueryFunction> {
        let token = self.expect(&[TokenKind::Identifier])?;
        let name = token.value.as_str().unwrap_or_default().to_string();

        match self.peek().kind {
            TokenKind::LParen => {
                self.next();
            }
            // `name` alone is shorthand for `name()`.
            TokenKind::Eos | TokenKind::Pipe => return Ok(QueryFunction::new(name, vec![])),
            _ => {
                let token = self.next();
                return Err(unexpected(token.span, "'(', '|' or end of query", token.kind));
            }
        }

        if self.peek().kind == TokenKind::RParen {
            self.next();
            return Ok(QueryFunction::new(name, vec![]));
        }

        let mut args = Vec::new();
        loop {
            args.push(self.parse_value()?);
            let token = self.expect(&[TokenKind::RParen, TokenKind::Comma])?;
            if token.kind == TokenKind::RParen {
                break;
            }
        }

        Ok(QueryFunction::new(name, args))
    }

    fn parse_value(&mut self) -> Result<Value> {
        let token = self.next();
        match token.kind {
            TokenKind::StringLiteral | TokenKind::FloatLiteral => Ok(token.value),
            TokenKind::Identifier => {
                if token.value.as_str() == Some("null") {
                    Ok(Value::Null)
                } else {
                    Ok(token.value)
                }
            }
            kind => Err(unexpected(token.span, "value", kind)),
        }
    }

    fn peek(&self) -> Token {
        self.tokens
            .get(self.index)
            .cloned()
            .unwrap_or_else(|| Token::new(TokenKind::Eos, self.end_span()))
    }

    fn next(&mut self) -> Token {
        let token = self.peek();
        self.index += 1;
        token
    }

    fn expect(&mut self, kinds: &[TokenKind]) -> Result<Token> {
        let token = self.next();
        if kinds.contains(&token.kind) {
            return Ok(token);
        }
        let expected = kinds
            .iter()
            .map(|k| k.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(unexpected(token.span, &expected, token.kind))
    }

    fn end_span(&self) -> Span {
        let end = self.tokens.last().map(|t| t.span.end).unwrap_or(0);
        Span::new(end, end)
    }
}

fn parse_error(span: Span, message: impl std::fmt::Display) -> Error {
    Error::new(format!("parse error at {span}: {message}"))
}

fn unexpected(span: Span, expected: &str, got: TokenKind) -> Error {
    parse_error(
        span,
        format!("unexpected token, expected: {expected}, got: {got}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pipeline() {
        let query = parse_query("query('stu') | select('name') | limit(10)").unwrap();
        assert_eq!(query.functions.len(), 3);
        assert_eq!(query.functions[0].name, "query");
        assert_eq!(query.functions[0].args, vec![Value::string("stu")]);
        assert_eq!(query.functions[2].args, vec![Value::Float(10.0)]);
    }

    #[test]
    fn test_bare_function_means_empty_args() {
        let query = parse_query("show_tables").unwrap();
        assert_eq!(query.functions[0].name, "show_tables");
        assert!(query.functions[0].args.is_empty());

        let query = parse_query("show_tables | limit(1)").unwrap();
        assert_eq!(query.functions.len(), 2);
    }

    #[test]
    fn test_identifier_args_decay_to_strings() {
        let query = parse_query("select(name, age)").unwrap();
        assert_eq!(
            query.functions[0].args,
            vec![Value::string("name"), Value::string("age")]
        );
    }

    #[test]
    fn test_null_bareword_becomes_null_value() {
        let query = parse_query("where('score', '=', null)").unwrap();
        assert_eq!(query.functions[0].args[2], Value::Null);
    }

    #[test]
    fn test_empty_query_is_an_error() {
        assert!(parse_query("").is_err());
        assert!(parse_query("   ").is_err());
    }

    #[test]
    fn test_error_token_carries_span() {
        let err = parse_query("query('stu").unwrap_err();
        assert!(err.message.contains("parse error at"));
        assert!(err.message.contains("invalid token"));
    }

    #[test]
    fn test_missing_rparen() {
        let err = parse_query("query('stu'").unwrap_err();
        assert!(err.message.contains("unexpected token"));
    }

    #[test]
    fn test_render_round_trip() {
        let input = r"f1(10, 'he\'llo') | f2()";
        let first = parse_query(input).unwrap();
        assert_eq!(first.to_string(), input);
        let second = parse_query(&first.to_string()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_round_trip_normalizes_whitespace() {
        let first = parse_query("  query( 'stu' )|limit( 5 )").unwrap();
        let second = parse_query(&first.to_string()).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.to_string(), "query('stu') | limit(5)");
    }
}
