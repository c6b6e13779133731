use evalforge_core::TensorOpKind;
use thiserror::Error;

/// Shape errors and missing engine support.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TensorError {
    /// A dimension shared by two operands has different sizes.
    #[error("dimension '{dimension}' has size {lhs} on the left and {rhs} on the right")]
    DimensionMismatch {
        dimension: String,
        lhs: usize,
        rhs: usize,
    },

    #[error("dimension '{0}' not found")]
    DimensionNotFound(String),

    #[error("duplicate dimension '{0}'")]
    DuplicateDimension(String),

    #[error("cannot rename {from} dimensions to {to} dimensions")]
    RenameArity { from: usize, to: usize },

    #[error("dimension '{0}' has size 0")]
    EmptyDimension(String),

    #[error("{0} has more cells than can be addressed")]
    TooManyCells(String),

    #[error("tensor type requires {expected} cells, got {got}")]
    CellCount { expected: usize, got: usize },

    /// The engine does not provide this operation. Not a shape error.
    #[error("{engine} engine does not implement {op}")]
    Unimplemented {
        engine: &'static str,
        op: TensorOpKind,
    },
}

impl TensorError {
    pub fn is_unimplemented(&self) -> bool {
        matches!(self, TensorError::Unimplemented { .. })
    }
}

/// Errors raised while interpreting an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Tensor(#[from] TensorError),

    /// A tensor appeared where only a double is allowed.
    #[error("expected a double: {0}")]
    ExpectedDouble(String),

    #[error("expected {expected} parameters, got {got}")]
    ParamCount { expected: usize, got: usize },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, TensorError>;
