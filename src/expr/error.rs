// ABOUTME: Error types for expression evaluation.
// ABOUTME: Configuration points are not errors and never appear here.

use super::{Value, ValueKind};
use crate::function::Arity;

/// Fatal evaluation failures.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("malformed number literal: {0:?}")]
    MalformedNumber(String),

    #[error("invalid empty list expression")]
    EmptyList,

    #[error("{position} cannot depend on configuration ({count} pending point(s))")]
    UnexpectedPending { position: &'static str, count: usize },

    #[error("expected {expected}, found {found}")]
    UnexpectedKind { expected: ValueKind, found: ValueKind },

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("invalid arguments for {function}: expected {arity}, found {found}")]
    InvalidArguments {
        function: String,
        arity: Arity,
        found: usize,
    },

    #[error("config point {module}/{identifier} is not declared")]
    UndeclaredConfig { module: String, identifier: String },

    #[error("stored value for {module}/{identifier} is not valid UTF-8")]
    InvalidStoredValue { module: String, identifier: String },

    #[error("invalid config point kind: {0:?}")]
    InvalidPointKind(String),

    #[error("malformed command: {0}")]
    MalformedCommand(String),

    #[error("function {function} failed: {reason}")]
    Function { function: String, reason: String },

    #[error("{field}: {source}")]
    InField {
        field: String,
        #[source]
        source: Box<EvalError>,
    },
}

impl EvalError {
    pub(crate) fn unexpected_kind(expected: ValueKind, found: &Value) -> Self {
        EvalError::UnexpectedKind {
            expected,
            found: found.kind(),
        }
    }

    /// Attach the name of the expression that failed.
    pub fn in_field(self, field: impl Into<String>) -> Self {
        EvalError::InField {
            field: field.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with field context stripped.
    pub fn root(&self) -> &EvalError {
        match self {
            EvalError::InField { source, .. } => source.root(),
            other => other,
        }
    }
}
