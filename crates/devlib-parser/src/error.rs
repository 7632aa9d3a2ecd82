//! Error types for deck reading.

use thiserror::Error;

/// Errors that can occur while reading a deck.
#[derive(Debug, Error)]
pub enum Error {
    /// Deck file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// At least one line had a fatal error.
    #[error("Deck has {count} error(s); first at line {line}: {message}")]
    NotBuildable {
        count: usize,
        line: usize,
        message: String,
    },

    /// Error from a device driver.
    #[error(transparent)]
    Device(#[from] devlib_devices::Error),
}

/// Result type for deck operations.
pub type Result<T> = std::result::Result<T, Error>;
