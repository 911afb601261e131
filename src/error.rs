//! Error types for the xref indexing library.
//!
//! The error policy follows the document-open flow: structural and corruption
//! errors raised while parsing declared xref structure are caught by the
//! caller and trigger the recovery scanner; only I/O faults are fatal.
//! A lookup miss is never an error; it is `Ok(None)` at the API level.

/// Result type alias for xref indexing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while locating and decoding the object index.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `startxref`/`%%EOF` could not be located in any retry window
    #[error("startxref keyword not found in file tail")]
    TrailerNotFound,

    /// Declared xref structure is inconsistent (bad offset, missing keyword)
    #[error("Invalid xref structure: {0}")]
    XrefState(String),

    /// Binary xref stream data ended mid-entry
    #[error("Corrupt xref stream: {0}")]
    XrefCorrupt(String),

    /// Tokenizer/parser failure at a specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    Parse {
        /// Byte offset where the failure occurred
        offset: usize,
        /// Reason for the failure
        reason: String,
    },

    /// Stream filter decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the document-open caller should fall back to the recovery
    /// scanner. Everything except a true I/O fault is recoverable: the file
    /// bytes are intact, only the declared structure is unusable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Io(_))
    }
}
