//! Error types for the device layer.

use thiserror::Error;

/// Errors returned by device drivers and the device library.
#[derive(Debug, Error)]
pub enum Error {
    /// Parameter id not in the device's table.
    #[error("Unknown parameter id {0}")]
    BadParam(usize),

    /// Parameter value of the wrong type.
    #[error("Bad value for parameter '{0}'")]
    BadParamValue(String),

    /// Parameter keyword not in the device's table.
    #[error("Unknown parameter '{0}'")]
    UnknownParam(String),

    /// No instance with this name.
    #[error("Unknown instance '{0}'")]
    UnknownInstance(String),

    /// Matrix entry request failed.
    #[error("Out of matrix entries at ({row}, {col})")]
    NoMem { row: usize, col: usize },

    /// A controlling source named by a current-controlled device does not exist.
    #[error("Unknown controlling source '{0}'")]
    UnknownControl(String),

    /// A named AC table was never defined.
    #[error("Unknown AC table '{0}'")]
    UnknownAcTable(String),

    /// No device in the library handles this key/level.
    #[error("No device for key '{key}' level {level}")]
    UnknownDevice { key: char, level: usize },

    /// Library slot out of range.
    #[error("No device at library index {0}")]
    BadDeviceIndex(usize),

    /// The library no longer accepts load or unload.
    #[error("Device library is frozen")]
    LibraryFrozen,

    /// Expression parse or evaluation failure.
    #[error("Expression error: {0}")]
    Expression(String),

    /// Error from the circuit context.
    #[error(transparent)]
    Core(devlib_core::Error),
}

impl From<devlib_core::Error> for Error {
    fn from(e: devlib_core::Error) -> Self {
        match e {
            devlib_core::Error::NoMem { row, col } => Error::NoMem { row, col },
            other => Error::Core(other),
        }
    }
}

/// Result type for device operations.
pub type Result<T> = std::result::Result<T, Error>;
