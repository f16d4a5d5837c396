//! Error types for the numeric solver.

use thiserror::Error;

/// A failure reported by an objective evaluation.
///
/// Native evaluators cannot fail across the C ABI, so this mostly arises
/// from hand-written [`Objective`](crate::Objective) implementations and
/// from adapters that were wired incompletely. The solver surfaces it to
/// the caller unchanged.
#[derive(Error, Debug, Clone)]
#[error("objective evaluation failed: {0}")]
pub struct EvalError(pub String);

impl EvalError {
    pub fn new(msg: impl Into<String>) -> Self {
        EvalError(msg.into())
    }
}

/// Errors that can occur while constructing or running the solver.
#[derive(Error, Debug)]
pub enum SolverError {
    /// The objective failed its consistency checks at solver construction
    #[error("objective validation failed: {0}")]
    ValidationFailed(String),

    /// A user-supplied start vector disagrees with the objective dimensions
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Backtracking hit its iteration cap. This usually means the current
    /// iterate is infeasible for the barrier.
    #[error("reached maximum number of line search iterations ({0})")]
    LineSearchExceeded(usize),

    /// The Newton step system could not be solved. The solver assumes a
    /// strongly convex barrier-augmented objective; a singular KKT matrix
    /// means that assumption was violated.
    #[error("newton step system is singular")]
    SingularSystem,

    /// An evaluation failure reported by the objective
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Result type for solver operations.
pub type SolverResult<T> = Result<T, SolverError>;
