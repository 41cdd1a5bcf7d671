//! GridGate Journal - segmented write-ahead log
//!
//! This crate provides the durable logging primitive shared by the GridGate
//! block-reclaim components: an append-only journal with tombstone-style
//! deletion, ordered replay, segment rollover, and background compaction.
//!
//! ```no_run
//! use gridgate_journal::{Journal, ReadMode, WriteMode};
//!
//! let journal = Journal::open("/var/lib/gridgate/journal/blocks", 8192)?;
//! let loc = journal.append(b"record", WriteMode::Async)?;
//! let bytes = journal.read(loc, ReadMode::Async)?;
//! journal.delete(loc)?;
//! # Ok::<(), gridgate_journal::JournalError>(())
//! ```

pub mod compactor;
pub mod error;
pub mod journal;
mod segment;

pub use compactor::LogCompactor;
pub use error::{JournalError, JournalResult};
pub use journal::{Journal, Location, ReadMode, Redo, WriteMode};
