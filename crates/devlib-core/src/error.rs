//! Error types for devlib-core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A matrix entry could not be allocated.
    #[error("no memory for matrix entry ({row}, {col})")]
    NoMem { row: usize, col: usize },

    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// A handle from before the last matrix reallocation was used.
    #[error("stale matrix entry handle (slot {0})")]
    StaleEntry(usize),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
