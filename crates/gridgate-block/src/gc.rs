//! Garbage collection surface
//!
//! The reclaim manager decides *when* a block may be reclaimed; the actual
//! freeing of bytes belongs to an external executor behind [`BlockCollector`].

use crate::block::Block;
use crate::error::BlockResult;
use gridgate_common::BlockKey;

/// A block whose deletion every configured gateway has acknowledged
#[derive(Debug, Clone)]
pub struct PendingBlock {
    /// Correlation key for the block
    pub key: BlockKey,
    /// Full identity, enough to physically reclaim the bytes
    pub block: Block,
}

/// External executor that physically reclaims block storage.
///
/// A batch succeeds or fails as a whole; a failure propagates back to the
/// caller that triggered collection and the batch is not retried by the
/// reclaim manager.
pub trait BlockCollector: Send + Sync {
    /// Reclaim the storage of every block in the batch
    fn collect(&self, batch: &[PendingBlock]) -> BlockResult<()>;
}
