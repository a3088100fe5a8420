//! Error types for expression parsing and evaluation.

use derive_more::Display;
use thiserror::Error;

/// Result type for expression operations.
pub type Result<T> = std::result::Result<T, ExprError>;

/// Coarse classification of an [`ExprError`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed expression text
    Syntax,
    /// Identifier is neither a field nor a named sub-expression
    UnknownField,
    /// Call to an operator that is not registered
    UnknownOperator,
    /// Wrong argument count or argument type
    Arity,
    /// Input the operator cannot handle, e.g. a zero-sum scale target
    DegenerateInput,
    /// Failure contained to one entity or timestamp partition
    PartitionCompute,
    /// Operands that cannot be broadcast together
    Shape,
    /// Operator registration rejected
    Registration,
    /// Invalid panel or engine configuration
    Input,
}

/// Errors that can occur while parsing or evaluating factor expressions.
#[derive(Debug, Error)]
pub enum ExprError {
    /// Expression text could not be parsed
    #[error("Syntax error at position {position}: {message} (near `{fragment}`)")]
    Syntax {
        /// What went wrong
        message: String,
        /// Offending substring of the expression
        fragment: String,
        /// Byte offset into the expression
        position: usize,
    },

    /// Identifier resolved to neither a panel field nor a definition
    #[error("Unknown field: {name}")]
    UnknownField {
        /// The unresolved identifier
        name: String,
    },

    /// Operator name not present in the registry
    #[error("Unknown operator: {name}")]
    UnknownOperator {
        /// The unresolved operator name
        name: String,
    },

    /// Wrong number of arguments
    #[error("Operator {operator} expects {expected} arguments, got {found}")]
    Arity {
        /// Operator name
        operator: String,
        /// Human-readable accepted argument count
        expected: String,
        /// Number of arguments supplied
        found: usize,
    },

    /// Argument of the wrong type or out of range
    #[error("Invalid argument `{argument}` for {operator}: {reason}")]
    InvalidArgument {
        /// Operator name
        operator: String,
        /// Argument name or expression text
        argument: String,
        /// Why the argument was rejected
        reason: String,
    },

    /// Input that makes the computation meaningless
    #[error("Degenerate input for {operator}: {reason}")]
    DegenerateInput {
        /// Operator name
        operator: String,
        /// Why the input is degenerate
        reason: String,
    },

    /// Two operands that cannot be aligned
    #[error("Shape mismatch: {left} rows vs {right} rows")]
    ShapeMismatch {
        /// Left operand length
        left: usize,
        /// Right operand length
        right: usize,
    },

    /// Failure inside one partition, surfaced under the strict error policy
    #[error("Operator {operator} failed on partition {partition}: {source}")]
    PartitionCompute {
        /// Operator name
        operator: String,
        /// Entity or timestamp key of the partition
        partition: String,
        /// Underlying failure
        source: Box<ExprError>,
    },

    /// Named sub-expression refers back to itself
    #[error("Recursive definition: {name}")]
    RecursiveDefinition {
        /// Name of the definition that closes the cycle
        name: String,
    },

    /// Operator rejected at registration time
    #[error("Invalid operator {name}: {reason}")]
    InvalidOperator {
        /// Operator name
        name: String,
        /// Why the operator was rejected
        reason: String,
    },

    /// Operator name already bound in the registry
    #[error("Operator already registered: {name}")]
    DuplicateOperator {
        /// Operator name
        name: String,
    },

    /// Panel violates its structural invariants
    #[error("Invalid panel: {0}")]
    InvalidPanel(String),

    /// Engine configuration problem
    #[error("Configuration error: {0}")]
    Config(String),

    /// Polars DataFrame error
    #[error("DataFrame error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Any failure, annotated with the full expression text
    #[error("{source} in expression `{expression}`")]
    Expression {
        /// Expression that failed
        expression: String,
        /// Underlying failure
        source: Box<ExprError>,
    },
}

impl ExprError {
    /// Attach the full expression text to this error.
    ///
    /// Errors that already carry an expression are returned unchanged.
    pub fn in_expression(self, expression: &str) -> Self {
        match self {
            Self::Expression { .. } => self,
            other => Self::Expression {
                expression: expression.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through the expression annotation.
    pub fn root(&self) -> &Self {
        match self {
            Self::Expression { source, .. } => source.root(),
            other => other,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Expression { source, .. } => source.kind(),
            Self::Syntax { .. } => ErrorKind::Syntax,
            Self::UnknownField { .. } | Self::RecursiveDefinition { .. } => ErrorKind::UnknownField,
            Self::UnknownOperator { .. } => ErrorKind::UnknownOperator,
            Self::Arity { .. } | Self::InvalidArgument { .. } => ErrorKind::Arity,
            Self::DegenerateInput { .. } => ErrorKind::DegenerateInput,
            Self::PartitionCompute { .. } => ErrorKind::PartitionCompute,
            Self::ShapeMismatch { .. } => ErrorKind::Shape,
            Self::InvalidOperator { .. } | Self::DuplicateOperator { .. } => ErrorKind::Registration,
            Self::InvalidPanel(_) | Self::Config(_) | Self::Polars(_) => ErrorKind::Input,
        }
    }

    pub(crate) fn degenerate(operator: &str, reason: impl Into<String>) -> Self {
        Self::DegenerateInput {
            operator: operator.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_argument(
        operator: &str,
        argument: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            operator: operator.to_string(),
            argument: argument.into(),
            reason: reason.into(),
        }
    }
}
