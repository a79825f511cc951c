//! Error types for the mediatag library.
//!
//! Fatal conditions surface through [`Error`]; recoverable inconsistencies are
//! reported through [`crate::diag::Diagnostics`] instead and never abort a parse.

use thiserror::Error;

/// Main error type for the mediatag library.
#[derive(Error, Debug)]
pub enum Error {
    /// Stream read/write failed or was truncated.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Structurally malformed input (bad magic, inconsistent sizes, bad VINT,
    /// bad synchsafe integer, bad unsynchronisation).
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Recognised format but unsupported revision.
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(String),

    /// A rewrite would invalidate referenced offsets and cannot be patched safely.
    #[error("Tag offset cannot be patched: {0}")]
    BadTagOffset(String),

    /// Expected data is absent (e.g. no tag present to read).
    #[error("No data found: {0}")]
    NoDataFound(String),

    /// Cancellation was observed at a checkpoint.
    #[error("Operation aborted")]
    OperationAborted,

    /// An element declares a size exceeding its parent's remaining span.
    #[error("Truncated data at offset {offset}: element declares {declared} bytes but only {available} remain")]
    TruncatedData {
        offset: u64,
        declared: u64,
        available: u64,
    },

    /// Unsupported feature or format.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Invalid parameter provided by the caller.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Error::InvalidData(msg.into())
    }

    /// Create an unsupported version error.
    pub fn unsupported_version(msg: impl Into<String>) -> Self {
        Error::UnsupportedVersion(msg.into())
    }

    /// Create a no-data-found error.
    pub fn no_data(msg: impl Into<String>) -> Self {
        Error::NoDataFound(msg.into())
    }

    /// Create a bad tag offset error.
    pub fn bad_tag_offset(msg: impl Into<String>) -> Self {
        Error::BadTagOffset(msg.into())
    }

    /// Create an unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Create an invalid parameter error.
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }

    /// Check whether this error was raised by cancellation.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::OperationAborted)
    }

    /// Check whether the error indicates a short read at end of stream.
    #[must_use]
    pub fn is_truncated_io(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}
