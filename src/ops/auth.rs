//! Credential check against a pod's master and replicas
//!
//! The master is always tested. Replicas are only tested when they accept a
//! connection; an unreachable replica cannot say anything about the
//! credential and is left out of the report entirely.

use crate::common::{AuditEventType, AuditOutcome, Error, Result};
use crate::ops::quorum::for_each_target;
use crate::ops::Context;
use crate::pod::{Address, PodConfig};
use serde::Serialize;
use std::collections::BTreeMap;

/// Key used for the master in [`AuthReport::results`]
pub const MASTER_KEY: &str = "master";

/// Node id (`"master"` or replica address) to "credential accepted"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthReport {
    pub results: BTreeMap<String, bool>,
}

impl AuthReport {
    pub fn tested(&self) -> usize {
        self.results.len()
    }

    pub fn failed(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, ok)| !**ok)
            .map(|(node, _)| node.as_str())
            .collect()
    }

    pub fn all_passed(&self) -> bool {
        self.results.values().all(|ok| *ok)
    }

    /// `Err` iff at least one tested node rejected the credential
    pub fn verdict(&self) -> Result<()> {
        let failed = self.failed().len();
        if failed > 0 {
            return Err(Error::AuthCheckFailed {
                failed,
                tested: self.tested(),
            });
        }
        Ok(())
    }
}

pub async fn check_auth(ctx: &Context, pod: &PodConfig) -> AuthReport {
    let mut report = AuthReport::default();
    report
        .results
        .insert(MASTER_KEY.to_string(), check_master(ctx, pod).await);

    let replicas = for_each_target(&pod.known_slaves, ctx.config.fanout.concurrent, |addr| {
        check_replica(ctx, pod, addr)
    })
    .await;
    for (addr, outcome) in pod.known_slaves.iter().zip(replicas) {
        if let Some(ok) = outcome {
            report.results.insert(addr.to_string(), ok);
        }
    }

    let failed = report.failed();
    if failed.is_empty() {
        tracing::info!(
            "All {} tested nodes of {} accept the credential",
            report.tested(),
            pod.name
        );
    } else {
        tracing::warn!("Auth check failed on {} for pod {}", failed.join(", "), pod.name);
    }
    ctx.audit.log_event(
        AuditEventType::AuthChecked,
        &pod.name,
        if report.all_passed() {
            AuditOutcome::Success
        } else {
            AuditOutcome::Failure
        },
        format!("{} of {} tested nodes failed", failed.len(), report.tested()),
        None,
    );
    report
}

async fn check_master(ctx: &Context, pod: &PodConfig) -> bool {
    let mut session = match ctx.connector.connect(&pod.master, pod.password()).await {
        Ok(session) => session,
        Err(Error::InvalidCredential { addr, reason }) => {
            tracing::warn!("Master {} rejected the credential: {}", addr, reason);
            return false;
        }
        Err(e) => {
            tracing::warn!("Unable to connect to master {}: {}", pod.master, e);
            return false;
        }
    };
    match session.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Master {} failed ping: {}", pod.master, e);
            false
        }
    }
}

/// `None` when the replica could not be reached at all
async fn check_replica(ctx: &Context, pod: &PodConfig, addr: &Address) -> Option<bool> {
    let mut session = match ctx.connector.connect(addr, None).await {
        Ok(session) => session,
        Err(e) => {
            tracing::debug!("Skipping unreachable replica {}: {}", addr, e);
            return None;
        }
    };

    if let Some(password) = pod.password() {
        if let Err(e) = session.authenticate(password).await {
            tracing::warn!("Replica {} rejected the credential: {}", addr, e);
            return Some(false);
        }
    }
    match session.ping().await {
        Ok(()) => Some(true),
        Err(e) => {
            tracing::warn!("Replica {} failed ping: {}", addr, e);
            Some(false)
        }
    }
}
