//! Lexer for the pipeline query language.

use crate::types::Value;

use super::{Span, Token, TokenKind};

/// Streaming tokenizer over a single query line.
///
/// The input is UTF-8 but scanned byte-wise as ASCII; a non-ASCII byte
/// outside a string literal becomes an [`TokenKind::Error`] token. Spans are
/// byte offsets, and every byte of the input belongs to exactly one token
/// (whitespace runs included), which the REPL highlighter relies on.
#[derive(Debug)]
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer over `input`.
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    /// Produces the next token; [`TokenKind::Eos`] once the input is
    /// exhausted.
    pub fn next_token(&mut self) -> Token {
        let start = self.pos;
        let c = match self.peek() {
            Some(c) => c,
            None => return Token::new(TokenKind::Eos, Span::new(start, start)),
        };

        match c {
            c if c.is_ascii_whitespace() => {
                self.take_while(|c| c.is_ascii_whitespace());
                Token::new(TokenKind::Whitespace, Span::new(start, self.pos))
            }
            '(' => self.punct(TokenKind::LParen),
            ')' => self.punct(TokenKind::RParen),
            ',' => self.punct(TokenKind::Comma),
            '|' => self.punct(TokenKind::Pipe),
            '"' | '\'' => self.string_literal(c),
            c if c.is_ascii_digit() || c == '-' => self.float_literal(),
            c if c.is_ascii_alphabetic() || c == '_' => self.identifier(),
            _ => {
                self.bump();
                Token::with_value(
                    TokenKind::Error,
                    Span::new(start, self.pos),
                    Value::string(&self.input[start..self.pos]),
                )
            }
        }
    }

    fn punct(&mut self, kind: TokenKind) -> Token {
        let start = self.pos;
        self.bump();
        Token::new(kind, Span::new(start, self.pos))
    }

    fn identifier(&mut self) -> Token {
        let start = self.pos;
        self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let text = &self.input[start..self.pos];
        Token::with_value(
            TokenKind::Identifier,
            Span::new(start, self.pos),
            Value::string(text),
        )
    }

    fn float_literal(&mut self) -> Token {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        self.take_while(|c| c.is_ascii_digit() || c == '.');
        let text = &self.input[start..self.pos];

        match text.parse::<f32>() {
            Ok(v) => Token::with_value(
                TokenKind::FloatLiteral,
                Span::new(start, self.pos),
                Value::Float(v),
            ),
            Err(_) => Token::with_value(
                TokenKind::Error,
                Span::new(start, self.pos),
                Value::string(text),
            ),
        }
    }

    // An unterminated literal (including a trailing lone backslash) consumes
    // the rest of the input and surfaces as an error token.
    fn string_literal(&mut self, quote: char) -> Token {
        let start = self.pos;
        self.bump();

        let mut decoded = String::new();
        loop {
            match self.bump() {
                None => {
                    return Token::with_value(
                        TokenKind::Error,
                        Span::new(start, self.pos),
                        Value::Str(decoded),
                    )
                }
                Some(c) if c == quote => {
                    return Token::with_value(
                        TokenKind::StringLiteral,
                        Span::new(start, self.pos),
                        Value::Str(decoded),
                    )
                }
                Some('\\') => match self.bump() {
                    None => {
                        return Token::with_value(
                            TokenKind::Error,
                            Span::new(start, self.pos),
                            Value::Str(decoded),
                        )
                    }
                    Some('a') => decoded.push('\u{7}'),
                    Some('n') => decoded.push('\n'),
                    Some('r') => decoded.push('\r'),
                    Some('t') => decoded.push('\t'),
                    Some('b') => decoded.push('\u{8}'),
                    Some(other) => decoded.push(other),
                },
                Some(c) => decoded.push(c),
            }
        }
    }
}

/// Tokenizes a whole line, whitespace runs included, without the trailing
/// [`TokenKind::Eos`].
pub fn tokenize_query(input: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        if token.kind == TokenKind::Eos {
            break;
        }
        tokens.push(token);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize_query(input).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            kinds("query('stu') | select(name)"),
            vec![
                TokenKind::Identifier,
                TokenKind::LParen,
                TokenKind::StringLiteral,
                TokenKind::RParen,
                TokenKind::Whitespace,
                TokenKind::Pipe,
                TokenKind::Whitespace,
                TokenKind::Identifier,
                TokenKind::LParen,
                TokenKind::Identifier,
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn test_spans_tile_the_input() {
        let input = "  f1(10, 'he\\'llo') | f2()  ";
        let tokens = tokenize_query(input);
        let mut pos = 0;
        for token in &tokens {
            assert_eq!(token.span.start, pos, "gap before {token:?}");
            pos = token.span.end;
        }
        assert_eq!(pos, input.len());
    }

    #[test]
    fn test_float_literals() {
        let tokens = tokenize_query("limit(10)");
        assert_eq!(tokens[2].kind, TokenKind::FloatLiteral);
        assert_eq!(tokens[2].value, Value::Float(10.0));

        let tokens = tokenize_query("-3.5");
        assert_eq!(tokens[0].kind, TokenKind::FloatLiteral);
        assert_eq!(tokens[0].value, Value::Float(-3.5));

        let tokens = tokenize_query("1.2.3");
        assert_eq!(tokens[0].kind, TokenKind::Error);

        let tokens = tokenize_query("-");
        assert_eq!(tokens[0].kind, TokenKind::Error);
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize_query(r#""a\tb\\c\'d""#);
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].value, Value::string("a\tb\\c'd"));
    }

    #[test]
    fn test_unterminated_string_spans_to_end() {
        let input = "query('stu";
        let tokens = tokenize_query(input);
        let last = tokens.last().unwrap();
        assert_eq!(last.kind, TokenKind::Error);
        assert_eq!(last.span.end, input.len());
    }

    #[test]
    fn test_unknown_char_is_error_token() {
        let tokens = tokenize_query("a @ b");
        assert_eq!(tokens[2].kind, TokenKind::Error);
        assert_eq!(tokens[2].value, Value::string("@"));
    }

    #[test]
    fn test_non_ascii_outside_string_is_error() {
        let tokens = tokenize_query("缺");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(tokens[0].span.len(), "缺".len());
    }
}
