//! Metadata redo log error types

use gridgate_journal::JournalError;
use thiserror::Error;

/// Metadata redo log error
#[derive(Error, Debug)]
pub enum MetaError {
    /// Journal error
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Metadata store rejected an operation
    #[error("metadata store error: {0}")]
    Store(String),
}

/// Result type for metadata redo log operations
pub type MetaResult<T> = Result<T, MetaError>;
