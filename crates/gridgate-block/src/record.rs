//! Journal record for one deletion acknowledgment
//!
//! Every acknowledgment (local or remote) of a block deletion is persisted
//! as one [`ReclaimRecord`]. The record carries the full block identity so a
//! restart can rebuild both the acknowledgment state and the pending
//! reclamation queue from the journal alone.

use crate::block::Block;
use crate::error::{BlockError, BlockResult};
use gridgate_common::{BlockKey, GatewayId, ObjectId};
use serde::{Deserialize, Serialize};

/// One gateway's acknowledgment of one block deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclaimRecord {
    /// Gateway that created the block
    pub owner: GatewayId,
    /// Object the block belongs to
    pub object_id: ObjectId,
    /// Byte offset of the block within the object
    pub offset: u64,
    /// Block version
    pub version: u64,
    /// Block length in bytes
    pub length: u64,
    /// Backend stores holding the block's bytes
    pub store_ids: Vec<String>,
    /// Correlation key shared by all records for this block
    pub block_key: BlockKey,
    /// Wall-clock millis of the original deletion
    pub deleted_at: i64,
    /// Gateway whose acknowledgment this record is
    pub acked_by: GatewayId,
    /// Wall-clock millis when the acknowledgment was recorded
    pub acked_at: i64,
}

impl ReclaimRecord {
    /// Build the record for `acked_by`'s acknowledgment of `block`'s deletion
    #[must_use]
    pub fn new(block: &Block, acked_by: GatewayId) -> Self {
        Self {
            owner: block.owner,
            object_id: block.object_id,
            offset: block.offset,
            version: block.version,
            length: block.length,
            store_ids: block.store_ids.clone(),
            block_key: block.key(),
            deleted_at: block.deleted_at,
            acked_by,
            acked_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Reconstruct the block identity carried by this record
    #[must_use]
    pub fn block(&self) -> Block {
        Block {
            owner: self.owner,
            object_id: self.object_id,
            offset: self.offset,
            version: self.version,
            length: self.length,
            store_ids: self.store_ids.clone(),
            deleted_at: self.deleted_at,
        }
    }

    /// Serialize for journaling
    pub fn to_bytes(&self) -> BlockResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| BlockError::Serialization(e.to_string()))
    }

    /// Deserialize a journaled record
    pub fn from_bytes(bytes: &[u8]) -> BlockResult<Self> {
        bincode::deserialize(bytes).map_err(|e| BlockError::Deserialization(e.to_string()))
    }
}
