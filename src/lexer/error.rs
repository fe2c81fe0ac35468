use std::fmt;

use crate::token::Position;

/// An error raised while turning source text into tokens.
#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub position: Position,
}

impl LexError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        LexError {
            message: message.into(),
            position: Position { line, column },
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for LexError {}
