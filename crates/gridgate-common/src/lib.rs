//! GridGate Common - Shared types and configuration
//!
//! This crate provides the identifier types and configuration structures
//! shared by the GridGate block-reclaim components.

pub mod config;
pub mod types;

pub use config::{GatewayConfig, JournalConfig, ReclaimConfig};
pub use types::{BlockKey, GatewayId, ObjectId};
