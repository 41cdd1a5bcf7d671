//! Metadata-transaction redo log
//!
//! Metadata-store operations are journaled before they are applied so that a
//! crash between durability here and durability in the store can be healed
//! by redo. Operations are grouped by transaction id; a commit marker seals
//! a transaction, and recovery applies a transaction's operations only when
//! its marker is present — transactions without one are discarded, giving
//! all-or-nothing redo.

use crate::error::{MetaError, MetaResult};
use crate::record::{MetaOp, MetaRecord};
use crate::store::MetaStore;
use gridgate_common::JournalConfig;
use gridgate_journal::{Journal, Location, LogCompactor, ReadMode, WriteMode};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Redo log for metadata-store transactions
pub struct MetaLog {
    journal: Arc<Journal>,
    compactor: LogCompactor,
}

impl MetaLog {
    /// Open or create the redo log rooted at `dir` and start its compactor
    pub fn open(dir: impl AsRef<Path>, config: &JournalConfig) -> MetaResult<Self> {
        let journal = Arc::new(Journal::open(dir, config.max_segment_size)?);
        let compactor = LogCompactor::new(Arc::clone(&journal));
        compactor.start(config.compaction_interval);
        Ok(Self { journal, compactor })
    }

    /// Journal one operation of transaction `txn_id`.
    ///
    /// Commit markers are written synchronously; everything else is buffered.
    pub fn record(
        &self,
        txn_id: u64,
        op: MetaOp,
        path: Option<&str>,
        data: Option<&[u8]>,
    ) -> MetaResult<Location> {
        let record = MetaRecord {
            txn_id,
            op,
            path: path.map(Into::into),
            data: data.map(<[u8]>::to_vec),
        };
        let mode = if op == MetaOp::Commit {
            WriteMode::Sync
        } else {
            WriteMode::Async
        };
        let location = self.journal.append(&record.to_bytes()?, mode)?;
        debug!(txn_id, ?op, %location, "journaled metadata operation");
        Ok(location)
    }

    /// Read back a journaled record; fails if it has been tombstoned
    pub fn read(&self, location: Location) -> MetaResult<MetaRecord> {
        let bytes = self.journal.read(location, ReadMode::Async)?;
        MetaRecord::from_bytes(&bytes)
    }

    /// Tombstone one journaled record
    pub fn delete(&self, location: Location) -> MetaResult<()> {
        self.journal.delete(location)?;
        Ok(())
    }

    /// Replay the log into `store`, applying each committed transaction's
    /// operations in original order at its commit marker. Uncommitted
    /// transactions are discarded. The journal is cleaned afterwards.
    ///
    /// Returns the number of records processed.
    pub fn redo_old_records(&self, store: &dyn MetaStore) -> MetaResult<usize> {
        info!("redoing metadata journal records");
        self.journal.sync()?;

        let mut open_txns: HashMap<u64, Vec<MetaRecord>> = HashMap::new();
        let mut processed = 0usize;

        for item in self.journal.redo() {
            let (_, payload) = item?;
            let record = MetaRecord::from_bytes(&payload)?;
            processed += 1;

            if record.op == MetaOp::Commit {
                for op in open_txns.remove(&record.txn_id).unwrap_or_default() {
                    apply(store, &op)?;
                }
            } else {
                open_txns.entry(record.txn_id).or_default().push(record);
            }
        }

        if !open_txns.is_empty() {
            warn!(
                discarded = open_txns.len(),
                "discarding transactions with no commit marker"
            );
        }

        self.clean_journal()?;
        info!(processed, "redo of metadata journal finished");
        Ok(processed)
    }

    /// Tombstone every live record, then compact
    pub fn clean_journal(&self) -> MetaResult<()> {
        self.journal.sync()?;
        let locations = self
            .journal
            .redo()
            .map(|item| item.map(|(location, _)| location))
            .collect::<Result<Vec<_>, _>>()?;
        for location in locations {
            self.journal.delete(location)?;
        }
        self.journal.compact()?;
        Ok(())
    }

    /// The journal backing this log
    #[must_use]
    pub fn journal(&self) -> &Arc<Journal> {
        &self.journal
    }

    /// Stop background compaction and sync the journal
    pub fn close(&self) {
        self.compactor.stop();
        if let Err(e) = self.journal.sync() {
            error!("failed to sync metadata journal on close: {}", e);
        }
    }
}

fn apply(store: &dyn MetaStore, record: &MetaRecord) -> MetaResult<()> {
    let path = record
        .path
        .as_deref()
        .ok_or_else(|| MetaError::Deserialization("operation record missing path".into()))?;
    match record.op {
        MetaOp::Create => store.create(path, record.data.as_deref().unwrap_or_default()),
        MetaOp::Update => store.update(path, record.data.as_deref().unwrap_or_default()),
        MetaOp::Remove => store.remove(path),
        MetaOp::Commit => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemMetaStore;
    use gridgate_journal::JournalError;
    use std::time::Duration;
    use tempfile::tempdir;

    fn config() -> JournalConfig {
        JournalConfig {
            max_segment_size: 8192,
            compaction_interval: Duration::from_secs(3600),
        }
    }

    #[test]
    fn test_record_is_written_and_read_back() {
        let dir = tempdir().unwrap();
        let log = MetaLog::open(dir.path(), &config()).unwrap();

        let location = log
            .record(7, MetaOp::Create, Some("/nodes/a"), Some(b"test".as_slice()))
            .unwrap();
        let record = log.read(location).unwrap();
        assert_eq!(record.txn_id, 7);
        assert_eq!(record.op, MetaOp::Create);
        assert_eq!(record.path.as_deref(), Some("/nodes/a"));
        assert_eq!(record.data.as_deref(), Some(b"test".as_slice()));
        log.close();
    }

    #[test]
    fn test_read_after_delete_fails() {
        let dir = tempdir().unwrap();
        let log = MetaLog::open(dir.path(), &config()).unwrap();

        let location = log
            .record(7, MetaOp::Create, Some("/nodes/a"), Some(b"test".as_slice()))
            .unwrap();
        log.delete(location).unwrap();
        assert!(matches!(
            log.read(location),
            Err(MetaError::Journal(JournalError::RecordDeleted { .. }))
        ));
        log.close();
    }

    #[test]
    fn test_uncommitted_transaction_is_discarded() {
        let dir = tempdir().unwrap();
        let store = MemMetaStore::new();

        {
            let log = MetaLog::open(dir.path(), &config()).unwrap();
            for i in 0..3 {
                let path = format!("/nodes/{i}");
                log.record(1, MetaOp::Create, Some(path.as_str()), Some(b"x".as_slice()))
                    .unwrap();
            }
            // crash before any commit marker
            log.close();
        }

        let log = MetaLog::open(dir.path(), &config()).unwrap();
        let processed = log.redo_old_records(&store).unwrap();
        assert_eq!(processed, 3);
        assert!(store.is_empty());
        log.close();
    }

    #[test]
    fn test_committed_transaction_is_redone_in_order() {
        let dir = tempdir().unwrap();
        let store = MemMetaStore::new();

        {
            let log = MetaLog::open(dir.path(), &config()).unwrap();
            log.record(1, MetaOp::Create, Some("/nodes/a"), Some(b"v1".as_slice()))
                .unwrap();
            log.record(1, MetaOp::Create, Some("/nodes/b"), Some(b"v1".as_slice()))
                .unwrap();
            log.record(1, MetaOp::Update, Some("/nodes/a"), Some(b"v2".as_slice()))
                .unwrap();
            log.record(1, MetaOp::Commit, None, None).unwrap();
            log.close();
        }

        let log = MetaLog::open(dir.path(), &config()).unwrap();
        let processed = log.redo_old_records(&store).unwrap();
        assert_eq!(processed, 4);

        // the update landed after the create it depends on
        assert_eq!(store.get("/nodes/a").unwrap(), b"v2");
        assert_eq!(store.get("/nodes/b").unwrap(), b"v1");

        // redone records are cleaned away
        assert_eq!(log.journal().live_records(), 0);
        log.close();
    }

    #[test]
    fn test_commit_applies_only_its_own_transaction() {
        let dir = tempdir().unwrap();
        let store = MemMetaStore::new();

        {
            let log = MetaLog::open(dir.path(), &config()).unwrap();
            log.record(1, MetaOp::Create, Some("/nodes/committed"), Some(b"yes".as_slice()))
                .unwrap();
            log.record(2, MetaOp::Create, Some("/nodes/uncommitted"), Some(b"no".as_slice()))
                .unwrap();
            log.record(1, MetaOp::Commit, None, None).unwrap();
            log.close();
        }

        let log = MetaLog::open(dir.path(), &config()).unwrap();
        log.redo_old_records(&store).unwrap();
        assert_eq!(store.get("/nodes/committed").unwrap(), b"yes");
        assert!(store.get("/nodes/uncommitted").is_none());
        log.close();
    }

    #[test]
    fn test_remove_is_redone() {
        let dir = tempdir().unwrap();
        let store = MemMetaStore::new();
        store.create("/nodes/old", b"stale").unwrap();

        {
            let log = MetaLog::open(dir.path(), &config()).unwrap();
            log.record(1, MetaOp::Remove, Some("/nodes/old"), None).unwrap();
            log.record(1, MetaOp::Commit, None, None).unwrap();
            log.close();
        }

        let log = MetaLog::open(dir.path(), &config()).unwrap();
        log.redo_old_records(&store).unwrap();
        assert!(store.get("/nodes/old").is_none());
        log.close();
    }

    #[test]
    fn test_clean_journal_tombstones_everything() {
        let dir = tempdir().unwrap();
        let log = MetaLog::open(dir.path(), &config()).unwrap();

        for i in 0..5 {
            let path = format!("/nodes/{i}");
            log.record(i, MetaOp::Create, Some(path.as_str()), Some(b"x".as_slice()))
                .unwrap();
        }
        assert_eq!(log.journal().live_records(), 5);

        log.clean_journal().unwrap();
        assert_eq!(log.journal().live_records(), 0);
        log.close();
    }
}
