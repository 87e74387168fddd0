//! Pod-wide credential rotation
//!
//! Order: master, then replicas, then sentinels. The only step that is
//! unwound on failure is the replica discovery right after the master has
//! been switched; past that point node failures are tallied and reported,
//! since undoing a partial fan-out would need another fan-out that can
//! fail the same way.

use crate::client::{NodeSession, CLIENT_AUTH_PARAM, MASTER_AUTH_PARAM, SENTINEL_AUTH_PARAM};
use crate::common::{AuditEventType, AuditOutcome, Error, Result};
use crate::ops::quorum::{SuccessPolicy, Tally, TargetCommand};
use crate::ops::Context;
use crate::pod::PodConfig;
use async_trait::async_trait;

/// Outcome of a rotation that got past the master
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationReport {
    pub pod: String,
    pub replicas: Tally,
    pub sentinels: Tally,
    /// Set when the sentinel list itself could not be fetched
    pub sentinel_listing_error: Option<String>,
}

impl RotationReport {
    /// Every sentinel holds the new credential
    pub fn is_complete(&self) -> bool {
        self.sentinel_listing_error.is_none() && self.sentinels.is_complete()
    }

    pub fn summary(&self) -> String {
        let mut s = format!(
            "{} replicas updated, {} sentinels updated",
            self.replicas, self.sentinels
        );
        if let Some(e) = &self.sentinel_listing_error {
            s.push_str(&format!(" (sentinel list unavailable: {})", e));
        }
        s
    }
}

struct ReplicaCredentialUpdate<'a> {
    old: &'a str,
    new: &'a str,
}

#[async_trait]
impl TargetCommand for ReplicaCredentialUpdate<'_> {
    fn action(&self) -> &'static str {
        "switched to the new credential"
    }

    // replicas have not heard of the new credential yet
    fn password(&self) -> Option<&str> {
        non_empty(self.old)
    }

    async fn apply(&self, session: &mut dyn NodeSession) -> Result<()> {
        session.set_parameter(MASTER_AUTH_PARAM, self.new).await?;
        session.set_parameter(CLIENT_AUTH_PARAM, self.new).await
    }
}

struct SentinelCredentialUpdate<'a> {
    pod: &'a str,
    new: &'a str,
}

#[async_trait]
impl TargetCommand for SentinelCredentialUpdate<'_> {
    fn action(&self) -> &'static str {
        "recorded the new credential"
    }

    async fn apply(&self, session: &mut dyn NodeSession) -> Result<()> {
        session
            .sentinel_set(self.pod, SENTINEL_AUTH_PARAM, self.new)
            .await
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Change the pod's shared credential from `old` to `new`.
///
/// `pod.authpass` follows the master: it holds `new` once the master has
/// been switched and is put back to `old` if the change is rolled back.
/// `Ok` with an incomplete report means some sentinels still carry the old
/// credential and need manual attention.
pub async fn rotate_credential(
    ctx: &Context,
    pod: &mut PodConfig,
    old: &str,
    new: &str,
) -> Result<RotationReport> {
    if old != pod.authpass {
        return Err(Error::CredentialMismatch);
    }
    if new.is_empty() {
        return Err(Error::InvalidConfig("new credential must not be empty".into()));
    }

    tracing::info!("Rotating credential of pod {} (master {})", pod.name, pod.master);

    // Primary
    let mut master = ctx.connector.connect(&pod.master, pod.password()).await?;
    update_primary(ctx, master.as_mut(), old, new).await?;
    pod.authpass = new.to_string();

    // Secondary discovery; failure here unwinds the primary
    let replicas = match ctx.registry.replicas_of(pod).await {
        Ok(replicas) => replicas,
        Err(e) => {
            tracing::error!("Cannot list replicas of {}: {}; rolling back master", pod.name, e);
            let restored = revert_primary(master.as_mut(), old).await;
            pod.authpass = old.to_string();
            let reason = if restored {
                format!("replica discovery failed ({}); master restored", e)
            } else {
                format!(
                    "replica discovery failed ({}); master {} could not be fully restored",
                    e, pod.master
                )
            };
            ctx.audit.log_event(
                AuditEventType::CredentialRolledBack,
                &pod.name,
                if restored {
                    AuditOutcome::Success
                } else {
                    AuditOutcome::Partial
                },
                reason.clone(),
                None,
            );
            return Err(Error::RotationRolledBack { reason });
        }
    };
    drop(master);

    // Secondaries
    let executor = ctx.executor();
    let replica_update = ReplicaCredentialUpdate { old, new };
    let replicas = executor
        .run(&replicas, SuccessPolicy::AllMustSucceed, &replica_update)
        .await;
    if !replicas.is_complete() {
        tracing::warn!(
            "{} replicas of {} updated; fix the rest by hand",
            replicas,
            pod.name
        );
    }

    // Sentinels
    let (sentinels, sentinel_listing_error) = match ctx.registry.watchdogs_of(pod).await {
        Ok(list) => {
            let update = SentinelCredentialUpdate {
                pod: &pod.name,
                new,
            };
            let tally = executor
                .run(&list, SuccessPolicy::AllMustSucceed, &update)
                .await;
            (tally, None)
        }
        Err(e) => {
            tracing::error!("Cannot list sentinels of {}: {}", pod.name, e);
            (Tally::default(), Some(e.to_string()))
        }
    };

    let report = RotationReport {
        pod: pod.name.clone(),
        replicas,
        sentinels,
        sentinel_listing_error,
    };

    if report.is_complete() {
        tracing::info!("Credential of {} rotated: {}", pod.name, report.summary());
    } else {
        tracing::warn!(
            "Credential of {} only partially rotated: {}. Sentinels not updated still hold the old credential and need manual remediation",
            pod.name,
            report.summary()
        );
    }
    ctx.audit.log_event(
        AuditEventType::CredentialRotated,
        &pod.name,
        if report.is_complete() {
            AuditOutcome::Success
        } else {
            AuditOutcome::Partial
        },
        report.summary(),
        Some(serde_json::json!({
            "replicas_updated": report.replicas.successes(),
            "replicas_total": report.replicas.total,
            "sentinels_updated": report.sentinels.successes(),
            "sentinels_total": report.sentinels.total,
        })),
    );
    Ok(report)
}

/// Switch both auth parameters on the master.
///
/// Individual writes are unchecked unless `verify_primary_write` is set, in
/// which case a failed write or a read-back mismatch restores the old
/// credential and aborts.
async fn update_primary(
    ctx: &Context,
    master: &mut dyn NodeSession,
    old: &str,
    new: &str,
) -> Result<()> {
    let verify = ctx.config.verify_primary_write;

    for param in [MASTER_AUTH_PARAM, CLIENT_AUTH_PARAM] {
        if let Err(e) = master.set_parameter(param, new).await {
            if verify {
                revert_primary(master, old).await;
                return Err(Error::PrimaryWriteFailed {
                    addr: master.address().to_string(),
                    reason: format!("setting {}: {}", param, e),
                });
            }
            tracing::debug!("Unchecked write of {} on {}: {}", param, master.address(), e);
        }
    }

    if verify {
        let current = master.get_parameter(CLIENT_AUTH_PARAM).await;
        if !matches!(&current, Ok(Some(value)) if value == new) {
            revert_primary(master, old).await;
            return Err(Error::PrimaryWriteFailed {
                addr: master.address().to_string(),
                reason: format!("{} did not read back as written", CLIENT_AUTH_PARAM),
            });
        }
    }
    Ok(())
}

/// Best-effort restore of the master's auth parameters; `true` if both took
async fn revert_primary(master: &mut dyn NodeSession, old: &str) -> bool {
    let mut restored = true;
    for param in [CLIENT_AUTH_PARAM, MASTER_AUTH_PARAM] {
        if let Err(e) = master.set_parameter(param, old).await {
            tracing::error!("Failed to restore {} on {}: {}", param, master.address(), e);
            restored = false;
        }
    }
    restored
}
