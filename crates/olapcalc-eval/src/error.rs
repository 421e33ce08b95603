//! Errors raised while resolving, compiling and evaluating expressions

use olapcalc_diagnostics::{
    Diagnostic, ErrorCode, OLAP0001, OLAP0002, OLAP0003, OLAP0004, OLAP0005, OLAP0006, OLAP0007,
    OLAP0100, OLAP0101, OLAP0103, OLAP0200, OLAP0201, OLAP0202, OLAP0300, OLAP0301, OLAP0302,
    OLAP0500,
};
use olapcalc_model::ModelError;
use olapcalc_types::{CellError, SignatureError, TupleError};
use thiserror::Error;

/// Result type for evaluation operations
pub type EvalResult<T> = Result<T, EvalError>;

/// Coarse classification of errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// No function matches, unknown names
    Resolution,
    /// Runtime fault while computing a value
    Evaluation,
    /// Result limit, cancellation or timeout; never recovered from
    ResourceLimit,
    /// Arity or hierarchy mismatch
    Invariant,
    Internal,
}

/// Errors that can occur during compilation and evaluation
#[derive(Debug, Error, Clone)]
pub enum EvalError {
    /// No registered signature accepts the arguments
    #[error("No function matches signature '{signature}'")]
    NoApplicableFunction {
        name: String,
        signature: String,
        candidates: Vec<String>,
    },

    #[error("Unknown identifier: {name}")]
    UnknownIdentifier { name: String },

    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("Invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    /// The expression cannot be produced in any of the accepted styles
    #[error("{function} cannot produce a result in any of the styles {accepted}")]
    UnsupportedResultStyle { function: String, accepted: String },

    #[error("Invalid alias: {message}")]
    InvalidAlias { message: String },

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Invalid argument for {function}: {message}")]
    InvalidArgument { function: String, message: String },

    #[error("Cannot convert {from} to {to}")]
    ConversionError { from: String, to: String },

    #[error("Maximum recursion depth of {depth} exceeded")]
    RecursionLimit { depth: usize },

    #[error("Result of size {size} exceeds the limit of {limit}")]
    ResultLimitExceeded { size: u128, limit: usize },

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Execution timed out after {millis} ms")]
    Timeout { millis: u128 },

    #[error("Arity mismatch: expected {expected}, found {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("Hierarchy mismatch: {message}")]
    HierarchyMismatch { message: String },

    #[error("Savepoint {token} is above the undo depth {depth}")]
    UnbalancedSavepoint { token: usize, depth: usize },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Internal evaluation error: {message}")]
    Internal { message: String },
}

impl EvalError {
    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Create a conversion error
    pub fn conversion_error(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::ConversionError {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create an unknown identifier error
    pub fn unknown_identifier(name: impl Into<String>) -> Self {
        Self::UnknownIdentifier { name: name.into() }
    }

    /// Create a hierarchy mismatch error
    pub fn hierarchy_mismatch(message: impl Into<String>) -> Self {
        Self::HierarchyMismatch {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NoApplicableFunction { .. }
            | Self::UnknownIdentifier { .. }
            | Self::UnknownFunction { .. }
            | Self::InvalidSignature(_)
            | Self::UnsupportedResultStyle { .. }
            | Self::InvalidAlias { .. }
            | Self::TypeMismatch { .. } => ErrorClass::Resolution,
            Self::InvalidArgument { .. }
            | Self::ConversionError { .. }
            | Self::RecursionLimit { .. }
            | Self::Model(_) => ErrorClass::Evaluation,
            Self::ResultLimitExceeded { .. } | Self::Cancelled | Self::Timeout { .. } => {
                ErrorClass::ResourceLimit
            }
            Self::ArityMismatch { .. }
            | Self::HierarchyMismatch { .. }
            | Self::UnbalancedSavepoint { .. } => ErrorClass::Invariant,
            Self::Internal { .. } => ErrorClass::Internal,
        }
    }

    /// Whether the error must unwind the whole statement
    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::ResourceLimit
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoApplicableFunction { .. } => OLAP0001,
            Self::UnknownIdentifier { .. } => OLAP0002,
            Self::UnknownFunction { .. } => OLAP0003,
            Self::InvalidSignature(_) => OLAP0004,
            Self::UnsupportedResultStyle { .. } => OLAP0005,
            Self::InvalidAlias { .. } => OLAP0006,
            Self::TypeMismatch { .. } => OLAP0007,
            Self::InvalidArgument { .. } => OLAP0100,
            Self::ConversionError { .. } => OLAP0101,
            Self::RecursionLimit { .. } => OLAP0103,
            Self::ResultLimitExceeded { .. } => OLAP0200,
            Self::Cancelled => OLAP0201,
            Self::Timeout { .. } => OLAP0202,
            Self::ArityMismatch { .. } => OLAP0300,
            Self::HierarchyMismatch { .. } => OLAP0301,
            Self::UnbalancedSavepoint { .. } => OLAP0302,
            Self::Model(e) => e.code(),
            Self::Internal { .. } => OLAP0500,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(self.code(), self.to_string());
        if let Self::NoApplicableFunction { candidates, .. } = self {
            for c in candidates {
                diag = diag.with_related(format!("candidate: {c}"));
            }
        }
        diag
    }

    /// The error as a cell value
    pub fn to_cell_error(&self) -> CellError {
        CellError::new(self.code(), self.to_string())
    }
}

impl From<TupleError> for EvalError {
    fn from(e: TupleError) -> Self {
        match e {
            TupleError::ArityMismatch { expected, found } => Self::ArityMismatch { expected, found },
            TupleError::ResultLimitExceeded { size, limit } => {
                Self::ResultLimitExceeded { size, limit }
            }
            TupleError::ColumnOutOfRange { column, arity } => Self::invalid_argument(
                "projection",
                format!("column {column} out of range for arity {arity}"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_errors_are_fatal() {
        assert!(EvalError::Cancelled.is_fatal());
        assert!(EvalError::ResultLimitExceeded { size: 10, limit: 5 }.is_fatal());
        assert!(!EvalError::invalid_argument("Sum", "bad").is_fatal());
        assert_eq!(EvalError::Timeout { millis: 5 }.code(), OLAP0202);
    }

    #[test]
    fn test_diagnostic_lists_candidates() {
        let err = EvalError::NoApplicableFunction {
            name: "Rank".into(),
            signature: "Rank(<Numeric Expression>)".into(),
            candidates: vec!["Rank(<Tuple>, <Set>)".into()],
        };
        let diag = err.to_diagnostic();
        assert_eq!(diag.code, OLAP0001);
        assert_eq!(diag.related, vec!["candidate: Rank(<Tuple>, <Set>)".to_string()]);
    }

    #[test]
    fn test_tuple_error_conversion() {
        let err: EvalError = TupleError::ArityMismatch { expected: 2, found: 1 }.into();
        assert_eq!(err.class(), ErrorClass::Invariant);
    }
}
