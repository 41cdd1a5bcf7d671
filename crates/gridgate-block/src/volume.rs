//! Volume context
//!
//! Supplies the reclaim manager with its gateway identity and journal
//! location, and holds the back-registration of the manager as *the* reclaim
//! manager for the volume.

use crate::reclaim::ReclaimManager;
use gridgate_common::{GatewayConfig, GatewayId};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

/// Per-volume context shared with the reclaim components
pub struct VolumeContext {
    volume_id: String,
    config: GatewayConfig,
    reclaimer: Mutex<Weak<ReclaimManager>>,
}

impl VolumeContext {
    /// Create a context for `volume_id` under the given gateway configuration
    #[must_use]
    pub fn new(volume_id: impl Into<String>, config: GatewayConfig) -> Arc<Self> {
        Arc::new(Self {
            volume_id: volume_id.into(),
            config,
            reclaimer: Mutex::new(Weak::new()),
        })
    }

    /// Volume this context belongs to
    #[must_use]
    pub fn volume_id(&self) -> &str {
        &self.volume_id
    }

    /// Gateway configuration
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Id of the local gateway
    #[must_use]
    pub fn gateway_id(&self) -> GatewayId {
        self.config.gateway_id
    }

    /// Journal directory for this volume's block reclaim journal
    #[must_use]
    pub fn block_journal_dir(&self) -> PathBuf {
        self.config.journal_root.join(&self.volume_id).join("blocks")
    }

    /// Journal directory for this volume's metadata redo journal
    #[must_use]
    pub fn meta_journal_dir(&self) -> PathBuf {
        self.config.journal_root.join(&self.volume_id).join("meta")
    }

    /// Record the volume's reclaim manager; called once from the manager's
    /// constructor
    pub(crate) fn register_reclaimer(&self, manager: &Arc<ReclaimManager>) {
        *self.reclaimer.lock() = Arc::downgrade(manager);
    }

    /// The reclaim manager registered for this volume, if still alive
    #[must_use]
    pub fn reclaimer(&self) -> Option<Arc<ReclaimManager>> {
        self.reclaimer.lock().upgrade()
    }
}
