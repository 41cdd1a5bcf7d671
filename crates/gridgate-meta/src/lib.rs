//! GridGate Meta - metadata-transaction redo log
//!
//! This crate records metadata-store operations in a write-ahead journal and
//! redoes them after a crash. A transaction's operations reach the store
//! only if its commit marker made it into the journal, so recovery is
//! all-or-nothing per transaction.

pub mod error;
pub mod log;
pub mod record;
pub mod store;

pub use error::{MetaError, MetaResult};
pub use log::MetaLog;
pub use record::{MetaOp, MetaRecord};
pub use store::{MemMetaStore, MetaStore};
