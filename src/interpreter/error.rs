use std::fmt;

use crate::token::Position;
use crate::value::Value;

/// The two built-in runtime error categories a `catch` clause may name by
/// identifier, plus a generic bucket for everything else (§7).
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeErrorKind {
    ZeroDivision,
    IndexOutOfBounds,
    Generic,
}

impl RuntimeErrorKind {
    /// The identifier a `catch (Name)` clause matches against, or `None`
    /// for the generic bucket (which only a matching throw expression catches).
    pub fn catch_name(&self) -> Option<&'static str> {
        match self {
            RuntimeErrorKind::ZeroDivision => Some("ZeroDivision"),
            RuntimeErrorKind::IndexOutOfBounds => Some("IndexOutOfBounds"),
            RuntimeErrorKind::Generic => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
    pub position: Position,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, message: impl Into<String>, position: Position) -> Self {
        RuntimeError {
            kind,
            message: message.into(),
            position,
        }
    }

    pub fn zero_division(position: Position) -> Self {
        RuntimeError::new(RuntimeErrorKind::ZeroDivision, "division by zero", position)
    }

    pub fn index_out_of_bounds(position: Position) -> Self {
        RuntimeError::new(
            RuntimeErrorKind::IndexOutOfBounds,
            "index out of bounds",
            position,
        )
    }

    pub fn generic(message: impl Into<String>, position: Position) -> Self {
        RuntimeError::new(RuntimeErrorKind::Generic, message, position)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RuntimeError {}

/// A value that has been `throw`n but not yet caught, carried alongside the
/// position it was thrown at so an uncaught throw can still be reported.
#[derive(Debug, Clone, PartialEq)]
pub struct Thrown {
    pub value: Value,
    pub position: Position,
}

/// Everything that can interrupt normal, in-order statement execution:
/// an explicit `return`, a `throw`, or a built-in runtime error. Modeled as
/// its own type rather than folded into `RuntimeError` so the evaluator can
/// tell apart "stop, a function wants to return" from "stop, something went
/// wrong" without inspecting a payload (§4.4/§5).
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Return(Value),
    Thrown(Thrown),
    Error(RuntimeError),
}

impl From<RuntimeError> for Flow {
    fn from(err: RuntimeError) -> Self {
        Flow::Error(err)
    }
}

impl Flow {
    /// Collapses any uncaught `Flow` that escaped `main` into a single
    /// reportable error (§7): an uncaught throw is reported by its value,
    /// a `return` escaping every call frame can't happen in a well-formed
    /// program but is handled defensively all the same.
    pub fn into_runtime_error(self) -> RuntimeError {
        match self {
            Flow::Error(err) => err,
            Flow::Thrown(thrown) => RuntimeError::generic(
                format!("uncaught thrown value '{}'", thrown.value),
                thrown.position,
            ),
            Flow::Return(_) => {
                RuntimeError::generic("return outside of a function call", Position { line: 1, column: 1 })
            }
        }
    }
}

pub type EvalResult<T> = Result<T, Flow>;
