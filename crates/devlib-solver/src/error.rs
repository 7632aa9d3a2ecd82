//! Error types for devlib-solver.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("singular matrix")]
    SingularMatrix,

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Newton-Raphson hit the iteration limit.
    #[error("no convergence after {iterations} iterations")]
    NoConvergence {
        iterations: usize,
        /// Last instance that reported non-convergence.
        trouble: Option<String>,
    },

    /// The circuit carries fatal parse errors.
    #[error("circuit has fatal parse errors")]
    NoGo,

    #[error(transparent)]
    Device(#[from] devlib_devices::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
