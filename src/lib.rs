//! # podmanager
//!
//! Administration of sentinel-monitored Redis pods:
//! - Failover, reset and removal fanned out to every sentinel of a pod
//! - Validation that the known sentinels actually monitor the pod
//! - Credential checks against the master and reachable replicas
//! - Detection of pods that share node addresses
//! - Pod-wide credential rotation with rollback of the master
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │                 ops                       │
//! │  sentinel (reset/failover/remove/validate)│
//! │  auth · topology · rotate                 │
//! │        └──── QuorumExecutor ────┘         │
//! └──────┬──────────────────────────┬─────────┘
//!        │ Registry                 │ Connector
//! ┌──────▼──────────┐     ┌─────────▼──────────┐
//! │ sentinel.conf / │     │ RespConnector      │
//! │ in-memory       │     │ (master, replicas, │
//! └─────────────────┘     │  sentinels)        │
//!                         └────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! podmanager info pod1 --json
//! podmanager failover pod1
//! podmanager validate-sentinels pod1
//! podmanager topology pod1 --full
//! podmanager rotate-password pod1 --old s3cret --new n3w
//! ```

#![allow(clippy::result_large_err)]

pub mod client;
pub mod common;
pub mod ops;
pub mod pod;

// Re-export commonly used types
pub use common::{Config, Error, Result};
pub use ops::Context;
pub use pod::{Address, PodConfig};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
