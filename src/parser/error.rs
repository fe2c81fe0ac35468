use std::fmt;

use crate::token::{Position, Token};

/// An error raised while building the AST from a token stream.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub position: Position,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: Position) -> Self {
        ParseError {
            message: message.into(),
            position,
        }
    }

    pub fn unexpected(expected: &str, found: &Token) -> Self {
        ParseError::new(
            format!("expected {expected}, found {found}"),
            found.position(),
        )
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}
