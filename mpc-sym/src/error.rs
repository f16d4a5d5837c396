//! Error types for the symbolic pipeline.

use thiserror::Error;

/// Errors that can occur while building, transforming, or compiling
/// symbolic models.
#[derive(Error, Debug)]
pub enum SymError {
    /// Index out of range, bad shape, or a non-symbol where a symbol is
    /// required
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An expression references a symbol missing from the required
    /// ordering
    #[error("unknown symbol `{0}`")]
    UnknownSymbol(String),

    /// The emitter cannot address a symbol through the given orderings
    #[error("no representation for symbol `{0}`")]
    MissingRepresentation(String),

    /// Affine extraction found a term of total variable degree > 1
    #[error("expected a linear equation: {0}")]
    Nonlinear(String),

    /// The symbolic objective was used before `finalize`
    #[error("symbolic objective has not been finalized")]
    NotFinalized,

    /// The runtime compiler exited with a failure
    #[error("runtime compilation failed:\n{0}")]
    CompileFailed(String),

    /// The shared object could not be opened
    #[error("failed to load shared object: {0}")]
    LoadFailed(#[from] libloading::Error),

    /// A required entry point is absent from the shared object
    #[error("entry point `{0}` missing from shared object")]
    SymbolMissing(String),

    /// Temp file plumbing failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for symbolic operations.
pub type SymResult<T> = Result<T, SymError>;
