//! Character stream → token stream.
//!
//! The lexer is a straightforward hand-rolled scanner over a `Vec<char>`
//! buffer (so we can look one character ahead without juggling a
//! `Peekable<Chars>` iterator through every helper). It tracks line/column
//! the way the original language description requires: line starts at 1 and
//! increments on `\n`; column starts at 1, increments per consumed
//! character, and resets to 1 on a newline.

pub mod error;

pub use error::LexError;

use crate::token::{keyword_or_id, Token, TokenKind};

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Scan the whole source and return its token stream, ending with a
    /// single [`TokenKind::Eos`] token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();

            let (line, column) = (self.line, self.column);
            let start = self.pos;

            let Some(c) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eos, "", line, column));
                break;
            };

            let kind = match c {
                '=' => self.two_char('=', TokenKind::Equal, TokenKind::Assign),
                ',' => self.single(TokenKind::Comma),
                '.' => self.single(TokenKind::Dot),
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                ':' => self.single(TokenKind::Colon),
                '+' => self.single(TokenKind::Plus),
                '-' => self.single(TokenKind::Minus),
                '*' => self.single(TokenKind::Times),
                '/' => self.single(TokenKind::Divide),
                '%' => self.single(TokenKind::Modulo),
                '<' => self.two_char('=', TokenKind::LessEqual, TokenKind::Less),
                '>' => self.two_char('=', TokenKind::GreaterEqual, TokenKind::Greater),
                '!' => self.two_char('=', TokenKind::NotEqual, TokenKind::Not),
                '\'' => self.char_literal()?,
                '"' => self.string_literal()?,
                c if c.is_ascii_digit() => self.number()?,
                c if c.is_alphabetic() => self.identifier(),
                other => {
                    return Err(LexError::new(
                        format!("unexpected character '{other}'"),
                        line,
                        column,
                    ))
                }
            };

            // The lexeme is the exact source text, except for quoted
            // literals: §4.1 excludes the opening/closing quotes from a
            // string's lexeme, and a char literal's lexeme is likewise just
            // its one character.
            let lexeme = match &kind {
                TokenKind::StringVal(v) => v.clone(),
                TokenKind::CharVal(v) => v.to_string(),
                _ => self.chars[start..self.pos].iter().collect(),
            };
            tokens.push(Token::new(kind, lexeme, line, column));
        }
        Ok(tokens)
    }

    // --- low-level cursor helpers -----------------------------------

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn two_char(&mut self, follow: char, matched: TokenKind, unmatched: TokenKind) -> TokenKind {
        self.advance();
        if self.peek() == Some(follow) {
            self.advance();
            matched
        } else {
            unmatched
        }
    }

    fn char_literal(&mut self) -> Result<TokenKind, LexError> {
        let (line, column) = (self.line, self.column);
        self.advance(); // opening quote
        let Some(c) = self.peek() else {
            return Err(LexError::new("unterminated character literal", line, column));
        };
        if c == '\'' {
            return Err(LexError::new("empty character literal", line, column));
        }
        if !c.is_alphabetic() {
            return Err(LexError::new(
                format!("non-alphabetic character literal '{c}'"),
                line,
                column,
            ));
        }
        self.advance();
        match self.peek() {
            Some('\'') => {
                self.advance();
                Ok(TokenKind::CharVal(c))
            }
            _ => Err(LexError::new(
                "character literal must contain exactly one character",
                line,
                column,
            )),
        }
    }

    fn string_literal(&mut self) -> Result<TokenKind, LexError> {
        let (line, column) = (self.line, self.column);
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(LexError::new("unterminated string literal", line, column)),
                Some('\n') => return Err(LexError::new("newline in string literal", line, column)),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        Ok(TokenKind::StringVal(value))
    }

    fn number(&mut self) -> Result<TokenKind, LexError> {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        let mut is_double = false;

        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            text.push(self.advance().unwrap());
        }

        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_double = true;
            text.push(self.advance().unwrap()); // '.'
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                text.push(self.advance().unwrap());
            }
        }

        if matches!(self.peek(), Some(c) if c.is_alphabetic() || c == '_') {
            return Err(LexError::new(
                "identifier cannot start immediately after a number",
                line,
                column,
            ));
        }

        if is_double {
            let value: f64 = text.parse().map_err(|_| {
                LexError::new(format!("malformed double literal '{text}'"), line, column)
            })?;
            Ok(TokenKind::DoubleVal(value))
        } else {
            let value: i64 = text.parse().map_err(|_| {
                LexError::new(format!("malformed integer literal '{text}'"), line, column)
            })?;
            Ok(TokenKind::IntVal(value))
        }
    }

    fn identifier(&mut self) -> TokenKind {
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            text.push(self.advance().unwrap());
        }
        keyword_or_id(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn skips_whitespace_and_comments() {
        let tokens = kinds("  # a comment\n  var # another\n  x");
        assert_eq!(tokens, vec![TokenKind::Var, TokenKind::Id("x".into()), TokenKind::Eos]);
    }

    #[test]
    fn two_character_operators() {
        assert_eq!(
            kinds("== != <= >= = < >"),
            vec![
                TokenKind::Equal,
                TokenKind::NotEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::Assign,
                TokenKind::Less,
                TokenKind::Greater,
                TokenKind::Eos,
            ]
        );
    }

    #[test]
    fn bang_is_not_synonym() {
        assert_eq!(kinds("!x"), vec![TokenKind::Not, TokenKind::Id("x".into()), TokenKind::Eos]);
    }

    #[test]
    fn integer_and_double_literals() {
        assert_eq!(
            kinds("42 3.14"),
            vec![TokenKind::IntVal(42), TokenKind::DoubleVal(3.14), TokenKind::Eos]
        );
    }

    #[test]
    fn reserved_words_and_booleans() {
        assert_eq!(
            kinds("if true else false"),
            vec![
                TokenKind::If,
                TokenKind::BoolVal(true),
                TokenKind::Else,
                TokenKind::BoolVal(false),
                TokenKind::Eos
            ]
        );
    }

    #[test]
    fn char_literal_errors() {
        assert!(Lexer::new("''").tokenize().is_err());
        assert!(Lexer::new("'1'").tokenize().is_err());
        assert!(Lexer::new("'ab'").tokenize().is_err());
    }

    #[test]
    fn string_literal_cannot_span_newline() {
        assert!(Lexer::new("\"abc\ndef\"").tokenize().is_err());
    }

    #[test]
    fn number_touching_identifier_is_an_error() {
        assert!(Lexer::new("1abc").tokenize().is_err());
    }

    #[test]
    fn line_and_column_tracking() {
        let tokens = Lexer::new("var\nx").tokenize().unwrap();
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (2, 1));
    }
}
