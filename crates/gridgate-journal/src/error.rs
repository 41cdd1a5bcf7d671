//! Journal error types

use thiserror::Error;

/// Journal error
#[derive(Error, Debug)]
pub enum JournalError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A segment file cannot be parsed
    #[error("corrupt segment {segment} at offset {offset}: {reason}")]
    Corrupt {
        segment: u64,
        offset: u64,
        reason: String,
    },

    /// The record at this location has been tombstoned
    #[error("record at segment {segment} index {index} has been deleted")]
    RecordDeleted { segment: u64, index: u32 },

    /// No record exists at this location
    #[error("no record at segment {segment} index {index}")]
    UnknownLocation { segment: u64, index: u32 },
}

/// Result type for journal operations
pub type JournalResult<T> = Result<T, JournalError>;
