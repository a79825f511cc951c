//! Matroska-specific error types.

use thiserror::Error;

/// Matroska/EBML error types.
#[derive(Error, Debug)]
pub enum MkvError {
    /// Invalid EBML header.
    #[error("Invalid EBML header: {0}")]
    InvalidEbmlHeader(String),

    /// The document type is not one we read.
    #[error("Unsupported document type: {0:?}")]
    UnsupportedDocType(String),

    /// The document type version exceeds what we read.
    #[error("Unsupported {doc_type} version {version}")]
    UnsupportedDocTypeVersion {
        /// Document type the version belongs to.
        doc_type: String,
        /// The declared read version.
        version: u64,
    },

    /// Invalid variable-length integer.
    #[error("Invalid VINT encoding at offset {offset}")]
    InvalidVint {
        /// Byte offset where the invalid VINT was found.
        offset: u64,
    },

    /// VINT longer than 8 bytes.
    #[error("VINT overflow: value exceeds maximum representable size")]
    VintOverflow,

    /// Invalid element ID.
    #[error("Invalid element ID at offset {offset}")]
    InvalidElementId {
        /// Byte offset where the invalid ID was found.
        offset: u64,
    },

    /// Missing required element.
    #[error("Missing required element: {0}")]
    MissingElement(&'static str),

    /// Element size inconsistent with its parent.
    #[error("Invalid element size at offset {offset}: {message}")]
    InvalidElementSize {
        /// Byte offset of the element.
        offset: u64,
        /// Description of the inconsistency.
        message: String,
    },

    /// A SeekHead entry points outside the segment.
    #[error("Seek entry for element 0x{id:08X} points outside the segment")]
    BadSeekEntry {
        /// Element id of the entry.
        id: u32,
    },

    /// Cancellation observed at a checkpoint.
    #[error("Operation aborted")]
    Aborted,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl From<String> for MkvError {
    fn from(s: String) -> Self {
        MkvError::Other(s)
    }
}

impl From<&str> for MkvError {
    fn from(s: &str) -> Self {
        MkvError::Other(s.to_string())
    }
}

/// Result type for Matroska operations.
pub type Result<T> = std::result::Result<T, MkvError>;

impl From<MkvError> for mediatag_core::Error {
    fn from(err: MkvError) -> Self {
        match err {
            MkvError::Io(e) => mediatag_core::Error::Io(e),
            MkvError::Aborted => mediatag_core::Error::OperationAborted,
            MkvError::UnsupportedDocType(doc_type) => {
                mediatag_core::Error::Unsupported(format!("EBML document type {doc_type:?}"))
            }
            MkvError::UnsupportedDocTypeVersion { doc_type, version } => {
                mediatag_core::Error::UnsupportedVersion(format!("{doc_type} version {version}"))
            }
            MkvError::InvalidElementSize { offset, message } => {
                mediatag_core::Error::InvalidData(format!(
                    "element size at offset {offset}: {message}"
                ))
            }
            other => mediatag_core::Error::InvalidData(other.to_string()),
        }
    }
}

impl From<mediatag_core::Error> for MkvError {
    fn from(err: mediatag_core::Error) -> Self {
        match err {
            mediatag_core::Error::Io(e) => MkvError::Io(e),
            mediatag_core::Error::OperationAborted => MkvError::Aborted,
            other => MkvError::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MkvError::InvalidVint { offset: 12 };
        assert_eq!(err.to_string(), "Invalid VINT encoding at offset 12");
    }

    #[test]
    fn test_conversion_to_core_error() {
        let err = MkvError::UnsupportedDocTypeVersion {
            doc_type: "webm".into(),
            version: 9,
        };
        let core: mediatag_core::Error = err.into();
        assert!(matches!(core, mediatag_core::Error::UnsupportedVersion(_)));
    }
}
