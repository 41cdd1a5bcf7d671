//! Metadata store surface
//!
//! The redo log recovers operations *into* a metadata store; the store
//! itself (a ZooKeeper-style path tree in production) lives behind the
//! [`MetaStore`] trait. [`MemMetaStore`] is the in-memory implementation
//! used by tests.

use crate::error::{MetaError, MetaResult};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Ground-truth metadata store the redo log recovers into
pub trait MetaStore: Send + Sync {
    /// Create a node at `path`
    fn create(&self, path: &str, data: &[u8]) -> MetaResult<()>;

    /// Replace the data of the node at `path`
    fn update(&self, path: &str, data: &[u8]) -> MetaResult<()>;

    /// Remove the node at `path`
    fn remove(&self, path: &str) -> MetaResult<()>;
}

/// In-memory metadata store
#[derive(Default)]
pub struct MemMetaStore {
    nodes: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemMetaStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Data of the node at `path`, if present
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.nodes.lock().get(path).cloned()
    }

    /// Number of nodes in the store
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.lock().len()
    }

    /// Whether the store holds no nodes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.lock().is_empty()
    }
}

impl MetaStore for MemMetaStore {
    fn create(&self, path: &str, data: &[u8]) -> MetaResult<()> {
        self.nodes.lock().insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn update(&self, path: &str, data: &[u8]) -> MetaResult<()> {
        let mut nodes = self.nodes.lock();
        let Some(node) = nodes.get_mut(path) else {
            return Err(MetaError::Store(format!("no node at {path}")));
        };
        *node = data.to_vec();
        Ok(())
    }

    fn remove(&self, path: &str) -> MetaResult<()> {
        if self.nodes.lock().remove(path).is_none() {
            return Err(MetaError::Store(format!("no node at {path}")));
        }
        Ok(())
    }
}
