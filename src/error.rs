//! Error types for the ADXL345 acquisition core

use thiserror::Error;

/// Failure of a primitive register-bus transfer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The bus itself reported a failure
    #[error("Bus error: {0}")]
    Bus(String),

    /// Fewer bytes were written than requested
    #[error("Short write: expected {expected} bytes, wrote {actual}")]
    ShortWrite { expected: usize, actual: usize },

    /// Fewer bytes were read than requested
    #[error("Short read: expected {expected} bytes, read {actual}")]
    ShortRead { expected: usize, actual: usize },
}

/// Error type for acquisition operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    /// Register bus failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Burst length is not a whole number of samples
    #[error("Protocol error: burst of {len} bytes is not a multiple of 6")]
    Protocol { len: usize },

    /// A blocking read was cancelled before data arrived
    #[error("Read interrupted while waiting for data")]
    Interrupted,

    /// The device was detached while the read was pending
    #[error("Device removed")]
    DeviceRemoved,

    /// Control command outside the recognized set
    #[error("Unsupported command: {0}")]
    UnsupportedCommand(u32),

    /// Axis value that does not name X, Y or Z
    #[error("Invalid axis: {0}")]
    InvalidAxis(String),

    /// Allocation of per-device state failed during attach
    #[error("Out of memory: could not reserve {requested} queue slots")]
    OutOfMemory { requested: usize },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for acquisition operations
pub type Result<T> = std::result::Result<T, AcquisitionError>;
