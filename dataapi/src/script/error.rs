//! Errors raised while evaluating data code.

use thiserror::Error;

use crate::transport::TransportError;

pub type Result<T> = std::result::Result<T, EvalError>;

/// A failure produced by one expression, built-in, or script line.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("malformed expression: {0}")]
    MalformedExpression(String),
    #[error("function {0} not found")]
    FunctionNotFound(String),
    #[error("{name} expected {expected} parameter(s) but got: {got}")]
    ArityMismatch {
        name: &'static str,
        expected: &'static str,
        got: usize,
    },
    #[error("expression did not evaluate to {expected}: {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },
    #[error("{0}")]
    AssertionFailed(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("io error: {0}")]
    Io(String),

    #[error("variableType \"{0}\" does not exist")]
    UnknownType(String),
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),
    #[error("invalid json: {0}")]
    InvalidJson(String),
    #[error("header is not in the format '{0}'")]
    InvalidHeader(&'static str),
    #[error("{0}")]
    LengthMismatch(String),
    #[error("field {0} could not be found in the response or environment")]
    MissingField(String),
    #[error("{0}")]
    Response(String),
    #[error("{0}")]
    Expression(String),
    /// Raised explicitly by `[Fail(message)]`, or a stored error value.
    #[error("{0}")]
    Fail(String),
    /// Every failure of one multi-expression line, in order.
    #[error("{}", join(.0))]
    Cascade(Vec<EvalError>),
}

impl From<std::io::Error> for EvalError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidJson(e.to_string())
    }
}

fn join(errs: &[EvalError]) -> String {
    errs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
