use thiserror::Error;

/// Typed errors raised during AST evaluation. They propagate to the
/// embedder untouched; the evaluator never catches them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Unknown name: {path}")]
    UnknownName { path: String },
    #[error("No method {method}({arity}) in class {class}")]
    UnknownMethod {
        method: String,
        arity: usize,
        class: String,
    },
    #[error("Target is not a class instance")]
    NotAnInstance,
    #[error("Error: the operation cannot be performed: {operation}")]
    UnsupportedOperation { operation: &'static str },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Cannot compare objects for {comparison}")]
    Incomparable { comparison: &'static str },
    #[error("Invalid arguments")]
    InvalidLogicalOperand,
    #[error("Method {method} must return Bool")]
    ComparisonNotBool { method: String },
    #[error("Writing to the output stream: {0}")]
    Output(String),
}
