use std::fmt;

use crate::token::Position;

/// An error raised while statically checking an AST (§4.3).
#[derive(Debug, Clone)]
pub struct TypeError {
    pub message: String,
    pub position: Position,
}

impl TypeError {
    pub fn new(message: impl Into<String>, position: Position) -> Self {
        TypeError {
            message: message.into(),
            position,
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TypeError {}
