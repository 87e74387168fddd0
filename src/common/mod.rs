//! Common utilities and types shared across podmanager

pub mod audit;
pub mod config;
pub mod error;

pub use audit::{AuditEntry, AuditEventType, AuditLogger, AuditOutcome};
pub use config::{Config, FanoutConfig, TopologyConfig};
pub use error::{Error, Result};
