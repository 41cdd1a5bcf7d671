//! Journaled metadata operations

use crate::error::{MetaError, MetaResult};
use serde::{Deserialize, Serialize};

/// A metadata-store operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaOp {
    /// Create a node at a path
    Create,
    /// Replace the data of an existing node
    Update,
    /// Remove a node
    Remove,
    /// Marker sealing all prior records of the same transaction
    Commit,
}

/// One journaled metadata operation.
///
/// `path` and `data` are absent on commit markers; `data` is also absent on
/// removes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaRecord {
    /// Transaction this operation belongs to
    pub txn_id: u64,
    /// Operation type
    pub op: MetaOp,
    /// Target path in the metadata store
    pub path: Option<String>,
    /// Payload bytes
    pub data: Option<Vec<u8>>,
}

impl MetaRecord {
    /// Serialize for journaling
    pub fn to_bytes(&self) -> MetaResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| MetaError::Serialization(e.to_string()))
    }

    /// Deserialize a journaled record
    pub fn from_bytes(bytes: &[u8]) -> MetaResult<Self> {
        bincode::deserialize(bytes).map_err(|e| MetaError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_roundtrip() {
        let record = MetaRecord {
            txn_id: 17,
            op: MetaOp::Update,
            path: Some("/volumes/vol-1/meta".into()),
            data: Some(b"payload".to_vec()),
        };
        let parsed = MetaRecord::from_bytes(&record.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_garbage_bytes_fail_decode() {
        assert!(matches!(
            MetaRecord::from_bytes(&[0xFE, 0xED]),
            Err(MetaError::Deserialization(_))
        ));
    }
}
