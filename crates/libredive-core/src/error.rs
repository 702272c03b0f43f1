//! Error types
//!
//! One error enum covers the whole library: transport failures, protocol
//! violations on the wire, and data-format violations in a downloaded
//! memory image. Drivers retry only `Protocol` and `Timeout`; everything
//! else aborts the current operation.

use thiserror::Error;

/// Errors that can occur during device communication
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgs(String),

    #[error("out of memory")]
    NoMemory,

    #[error("access denied: {0}")]
    NoAccess(String),

    #[error("operation not supported")]
    Unsupported,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("timeout")]
    Timeout,

    #[error("operation cancelled")]
    Cancelled,

    #[error("data format error: {0}")]
    DataFormat(String),

    #[error("no matching device found")]
    NoDevice,

    #[error("iteration exhausted")]
    Done,
}

impl Error {
    /// Whether a transfer wrapper may retry after this failure.
    ///
    /// Corrupted frames and missed deadlines are transient; everything
    /// else indicates a condition a retry cannot fix.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Protocol(_) | Error::Timeout)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Combine two results, keeping the first failure.
///
/// Used on cleanup paths where several steps may each fail and the earliest
/// error is the one worth reporting.
pub fn fold_status(status: &mut Result<()>, rc: Result<()>) {
    if status.is_ok() {
        if let Err(e) = rc {
            *status = Err(e);
        }
    }
}
