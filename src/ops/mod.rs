//! Ops commands for pod management
//!
//! Every command takes an explicit [`Context`] (connector, registry,
//! settings, audit trail) and the [`PodConfig`] it acts on.

pub mod auth;
pub mod quorum;
pub mod rotate;
pub mod sentinel;
pub mod topology;

pub use auth::{check_auth, AuthReport};
pub use quorum::{QuorumExecutor, SuccessPolicy, Tally, TargetCommand};
pub use rotate::{rotate_credential, RotationReport};
pub use sentinel::{
    failover, remove, reset, validate_sentinels, Failover, Remove, Reset, ValidateSentinels,
};
pub use topology::{audit_registry, overlaps, walk, walk_topology, WalkDepth};

use crate::client::Connector;
use crate::common::{AuditLogger, Config, Result};
use crate::pod::{PodConfig, Registry};
use async_trait::async_trait;
use std::sync::Arc;

/// Everything an operation needs besides the pod itself
#[derive(Clone)]
pub struct Context {
    pub connector: Arc<dyn Connector>,
    pub registry: Arc<dyn Registry>,
    pub config: Config,
    pub audit: Arc<AuditLogger>,
}

impl Context {
    pub fn new(connector: Arc<dyn Connector>, registry: Arc<dyn Registry>) -> Self {
        Self {
            connector,
            registry,
            config: Config::default(),
            audit: Arc::new(AuditLogger::disabled()),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Arc::new(audit);
        self
    }

    pub fn executor(&self) -> QuorumExecutor<'_> {
        QuorumExecutor::new(self.connector.as_ref(), &self.config.fanout)
    }
}

/// A named administrative command fanned out to a pod's sentinels
#[async_trait]
pub trait Operation: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run the command and judge the tally by the operation's policy
    async fn execute(&self, ctx: &Context, pod: &PodConfig) -> Result<Tally>;
}

/// Run `op` against `pod`, logging start and outcome under the operation's name
pub async fn dispatch(op: &dyn Operation, ctx: &Context, pod: &PodConfig) -> Result<Tally> {
    tracing::info!("Running {} on pod {}", op.name(), pod.name);
    let result = op.execute(ctx, pod).await;
    match &result {
        Ok(tally) => tracing::info!("{} on {} done: {}", op.name(), pod.name, tally),
        Err(e) => tracing::warn!("{} on {} failed: {}", op.name(), pod.name, e),
    }
    result
}
