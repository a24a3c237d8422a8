//! Error type for logic evaluation.

/// Errors from evaluating a logic tree.
///
/// Guard call sites treat any of these as "guard is false" and keep
/// searching for the next candidate transition; a broken guard never takes
/// down an event dispatch.
#[derive(Debug, thiserror::Error)]
pub enum LogicError {
    /// The node is not a recognizable operator application.
    #[error("malformed logic node: {0}")]
    Malformed(String),

    /// The operator name is not part of the evaluator's vocabulary.
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),

    /// Wrong number of arguments for the operator.
    #[error("operator `{op}` expects {expected} argument(s), got {got}")]
    Arity {
        op: String,
        expected: usize,
        got: usize,
    },

    /// An arithmetic or ordering operand could not be coerced to a number.
    #[error("non-numeric operand for `{0}`")]
    NonNumeric(String),

    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,
}
