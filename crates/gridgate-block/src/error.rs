//! Block reclaim error types

use gridgate_common::{BlockKey, GatewayId};
use gridgate_journal::JournalError;
use thiserror::Error;

/// Block reclaim error
#[derive(Error, Debug)]
pub enum BlockError {
    /// Journal error
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    /// An acknowledgment arrived for a block with no tracked deletion
    #[error("no deletion tracked for block {0}")]
    UnknownKey(BlockKey),

    /// A gateway id outside the configured gateway set
    #[error("gateway {0} is not in the configured gateway set")]
    UnknownGateway(GatewayId),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// The external collector rejected a reclamation batch
    #[error("collection failed: {0}")]
    Collection(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for block reclaim operations
pub type BlockResult<T> = Result<T, BlockError>;
