//! Configuration types for GridGate
//!
//! Plain configuration values with explicit defaults. Test setups construct
//! these directly with the fields they care about; there is no layered or
//! subclassed configuration.

use crate::types::GatewayId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Per-gateway configuration for the block-reclaim components
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Id of the local gateway
    pub gateway_id: GatewayId,
    /// Root directory for this gateway's journals
    pub journal_root: PathBuf,
    /// Journal tuning
    pub journal: JournalConfig,
    /// Reclaim coordinator tuning
    pub reclaim: ReclaimConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            gateway_id: GatewayId::new(0),
            journal_root: PathBuf::from("/var/lib/gridgate/journal"),
            journal: JournalConfig::default(),
            reclaim: ReclaimConfig::default(),
        }
    }
}

/// Journal tuning knobs
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Maximum size of one segment file before rollover
    pub max_segment_size: u64,
    /// Interval between background compaction passes
    #[serde(with = "duration_millis")]
    pub compaction_interval: Duration,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            max_segment_size: 8192,
            compaction_interval: Duration::from_secs(60),
        }
    }
}

/// Reclaim coordinator tuning knobs
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReclaimConfig {
    /// Minimum time between garbage-collection batch triggers
    #[serde(with = "duration_millis")]
    pub gc_threshold: Duration,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            gc_threshold: Duration::from_millis(1000),
        }
    }
}

/// Serialize durations as integer milliseconds in config files
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.journal.max_segment_size, 8192);
        assert_eq!(config.reclaim.gc_threshold, Duration::from_millis(1000));
    }
}
