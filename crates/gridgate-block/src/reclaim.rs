//! Cross-gateway deletion acknowledgment tracking
//!
//! Every gateway that replicated a block must acknowledge its deletion
//! before the block's storage is reclaimed. The [`ReclaimManager`] tracks
//! one acknowledgment bit per configured gateway per deleted block, persists
//! every acknowledgment to a write-ahead journal, moves fully-acknowledged
//! blocks onto a pending queue, and periodically drains that queue to the
//! external collector.
//!
//! All coordination state lives behind a single lock: the transition of a
//! block from the acknowledgment map to the pending queue and the drain of
//! the pending queue are each one critical section, so concurrent
//! acknowledgments can neither double-enqueue a block nor double-drain the
//! queue. On restart the journal is replayed to rebuild both structures
//! exactly as they were.

use crate::block::Block;
use crate::error::{BlockError, BlockResult};
use crate::gc::{BlockCollector, PendingBlock};
use crate::record::ReclaimRecord;
use crate::volume::VolumeContext;
use gridgate_common::{BlockKey, GatewayId};
use gridgate_journal::{Journal, LogCompactor, WriteMode};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Acknowledgment bits for one block, one bit per configured gateway.
///
/// Bit *i* corresponds to the gateway at position *i* of the configured
/// gateway list.
#[derive(Debug, Clone, Copy, Default)]
struct AckSet {
    bits: u64,
}

impl AckSet {
    fn set(&mut self, position: usize) {
        self.bits |= 1 << position;
    }

    fn get(&self, position: usize) -> bool {
        self.bits & (1 << position) != 0
    }

    fn count(&self) -> u32 {
        self.bits.count_ones()
    }

    fn is_full(&self, gateways: usize) -> bool {
        self.bits == full_mask(gateways)
    }
}

fn full_mask(gateways: usize) -> u64 {
    u64::MAX >> (64 - gateways)
}

struct ReclaimState {
    /// Blocks with outstanding acknowledgments
    acks: HashMap<BlockKey, AckSet>,
    /// Fully-acknowledged blocks awaiting collection
    pending: Vec<PendingBlock>,
    /// When the pending queue was last drained
    last_gc: Instant,
}

/// Coordinates block deletion acknowledgments across gateways for one volume
pub struct ReclaimManager {
    /// All participating gateways; the local gateway is the last entry and a
    /// gateway's position here is its bit index in [`AckSet`]s
    gateway_ids: Vec<GatewayId>,
    local_gateway: GatewayId,
    journal: Arc<Journal>,
    compactor: LogCompactor,
    collector: Arc<dyn BlockCollector>,
    gc_threshold: Duration,
    state: Mutex<ReclaimState>,
}

impl ReclaimManager {
    /// Create the reclaim manager for `context`'s volume.
    ///
    /// `remote_gateways` lists every other participating gateway; the local
    /// gateway id from the context is appended to form the full set. If the
    /// volume's journal directory already exists it is replayed before the
    /// manager accepts notifications. The manager registers itself on the
    /// context as the volume's reclaim manager.
    pub fn new(
        remote_gateways: &[GatewayId],
        context: &Arc<VolumeContext>,
        collector: Arc<dyn BlockCollector>,
    ) -> BlockResult<Arc<Self>> {
        let config = context.config();
        let local_gateway = config.gateway_id;

        let mut gateway_ids = remote_gateways.to_vec();
        gateway_ids.push(local_gateway);
        if gateway_ids.len() > 64 {
            return Err(BlockError::Configuration(format!(
                "{} gateways exceed the supported maximum of 64",
                gateway_ids.len()
            )));
        }

        let dir = context.block_journal_dir();
        let existed = dir.exists();
        let journal = Arc::new(Journal::open(&dir, config.journal.max_segment_size)?);

        let manager = Arc::new(Self {
            gateway_ids,
            local_gateway,
            compactor: LogCompactor::new(Arc::clone(&journal)),
            journal,
            collector,
            gc_threshold: config.reclaim.gc_threshold,
            state: Mutex::new(ReclaimState {
                acks: HashMap::new(),
                pending: Vec::new(),
                last_gc: Instant::now(),
            }),
        });

        if existed {
            let replayed = manager.replay()?;
            info!(
                volume = context.volume_id(),
                replayed, "replayed block reclaim journal"
            );
        }

        manager.compactor.start(config.journal.compaction_interval);
        context.register_reclaimer(&manager);
        Ok(manager)
    }

    /// Record the local gateway's own deletion of `block`.
    ///
    /// Installs a fresh acknowledgment set with only the local bit and
    /// journals the event. The installed entry is not removed if the append
    /// fails; the error is reported to the caller.
    pub fn notify_delete_local(&self, block: &Block) -> BlockResult<()> {
        let key = block.key();
        let position = self.position(self.local_gateway)?;

        {
            let mut state = self.state.lock();
            let mut acks = AckSet::default();
            acks.set(position);
            state.acks.insert(key.clone(), acks);
        }

        let record = ReclaimRecord::new(block, self.local_gateway);
        self.journal.append(&record.to_bytes()?, WriteMode::Async)?;
        debug!(%key, "recorded local block deletion");
        Ok(())
    }

    /// Record a remote gateway's acknowledgment of `block`'s deletion.
    ///
    /// The block must already be tracked via [`notify_delete_local`]
    /// (acknowledgments for unknown blocks are dropped). When the
    /// acknowledgment completes the set, the block moves to the pending
    /// queue; when the drain threshold has elapsed, the queue is handed to
    /// the collector and all journal records for the drained blocks are
    /// tombstoned.
    ///
    /// [`notify_delete_local`]: Self::notify_delete_local
    pub fn notify_delete_remote(&self, block: &Block, remote: GatewayId) -> BlockResult<()> {
        let key = block.key();
        let position = self.position(remote)?;

        {
            let mut state = self.state.lock();
            let Some(acks) = state.acks.get_mut(&key) else {
                error!(%key, gateway = %remote, "acknowledgment for untracked block, dropping");
                return Err(BlockError::UnknownKey(key));
            };
            acks.set(position);
        }

        let record = ReclaimRecord::new(block, remote);
        self.journal.append(&record.to_bytes()?, WriteMode::Async)?;
        debug!(%key, gateway = %remote, "recorded remote deletion acknowledgment");

        let batch = {
            let mut state = self.state.lock();

            if state
                .acks
                .get(&key)
                .is_some_and(|acks| acks.is_full(self.gateway_ids.len()))
            {
                state.acks.remove(&key);
                state.pending.push(PendingBlock {
                    key: key.clone(),
                    block: block.clone(),
                });
                info!(%key, "block deletion acknowledged by all gateways");
            }

            if state.last_gc.elapsed() >= self.gc_threshold {
                state.last_gc = Instant::now();
                std::mem::take(&mut state.pending)
            } else {
                Vec::new()
            }
        };

        if batch.is_empty() {
            return Ok(());
        }
        self.run_collection(&batch)
    }

    /// Replay the journal into empty in-memory state, returning the number
    /// of records processed.
    fn replay(&self) -> BlockResult<usize> {
        let gateways = self.gateway_ids.len();
        let mut replayed = 0usize;

        for item in self.journal.redo() {
            let (_, payload) = item?;
            let record = ReclaimRecord::from_bytes(&payload)?;
            let position = self.position(record.acked_by)?;

            let mut state = self.state.lock();
            // a record for a block that already completed stays completed
            if state.pending.iter().any(|p| p.key == record.block_key) {
                replayed += 1;
                continue;
            }
            let acks = state.acks.entry(record.block_key.clone()).or_default();
            acks.set(position);
            if acks.is_full(gateways) {
                state.acks.remove(&record.block_key);
                state.pending.push(PendingBlock {
                    key: record.block_key.clone(),
                    block: record.block(),
                });
            }
            replayed += 1;
        }
        Ok(replayed)
    }

    /// Hand a drained batch to the collector, then tombstone the journal
    /// records of every block in it.
    ///
    /// There is one record per gateway per block, found by scanning the full
    /// journal per block. The first tombstone failure aborts the batch;
    /// records tombstoned before the failure stay tombstoned and the batch
    /// is not retried here.
    fn run_collection(&self, batch: &[PendingBlock]) -> BlockResult<()> {
        info!(blocks = batch.len(), "sending reclaimed blocks to the collector");

        {
            let mut state = self.state.lock();
            for pending in batch {
                state.acks.remove(&pending.key);
            }
        }

        self.collector
            .collect(batch)
            .inspect_err(|e| error!("block collection failed: {}", e))?;

        for pending in batch {
            for item in self.journal.redo() {
                let (location, payload) = item?;
                let record = ReclaimRecord::from_bytes(&payload)?;
                if record.block_key == pending.key {
                    self.journal.delete(location)?;
                }
            }
        }
        Ok(())
    }

    fn position(&self, gateway: GatewayId) -> BlockResult<usize> {
        self.gateway_ids
            .iter()
            .position(|g| *g == gateway)
            .ok_or(BlockError::UnknownGateway(gateway))
    }

    /// All participating gateways, local last
    #[must_use]
    pub fn gateway_ids(&self) -> &[GatewayId] {
        &self.gateway_ids
    }

    /// The journal backing this manager
    #[must_use]
    pub fn journal(&self) -> &Arc<Journal> {
        &self.journal
    }

    /// Gateways that have acknowledged `key`'s deletion so far, or `None` if
    /// the block is not being tracked
    #[must_use]
    pub fn acked_gateways(&self, key: &BlockKey) -> Option<Vec<GatewayId>> {
        let state = self.state.lock();
        let acks = state.acks.get(key)?;
        Some(
            self.gateway_ids
                .iter()
                .enumerate()
                .filter(|(i, _)| acks.get(*i))
                .map(|(_, g)| *g)
                .collect(),
        )
    }

    /// Number of acknowledgments received for `key`
    #[must_use]
    pub fn ack_count(&self, key: &BlockKey) -> Option<u32> {
        self.state.lock().acks.get(key).map(AckSet::count)
    }

    /// Keys currently awaiting collection
    #[must_use]
    pub fn pending_keys(&self) -> Vec<BlockKey> {
        self.state
            .lock()
            .pending
            .iter()
            .map(|p| p.key.clone())
            .collect()
    }

    /// Stop background compaction and sync the journal
    pub fn shutdown(&self) {
        self.compactor.stop();
        if let Err(e) = self.journal.sync() {
            error!("failed to sync reclaim journal on shutdown: {}", e);
        }
    }
}
