//! Block identity
//!
//! A [`Block`] carries everything the reclaim path needs to identify one
//! stored block replica-wide: which gateway wrote it, the object it belongs
//! to, its position and version, and the backend stores holding its bytes.

use gridgate_common::{BlockKey, GatewayId, ObjectId};
use serde::{Deserialize, Serialize};

/// Identity of one deleted block awaiting reclamation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
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
    /// Wall-clock millis of the original deletion
    pub deleted_at: i64,
}

impl Block {
    /// Deterministic key for this block.
    ///
    /// Two deletion events for the same block always produce the same key;
    /// the key doubles as the correlation id for journal records.
    #[must_use]
    pub fn key(&self) -> BlockKey {
        let mut identity = Vec::with_capacity(32);
        identity.extend_from_slice(self.object_id.as_bytes());
        identity.extend_from_slice(&self.offset.to_be_bytes());
        identity.extend_from_slice(&self.version.to_be_bytes());
        BlockKey::from_identity(&identity)
    }
}
