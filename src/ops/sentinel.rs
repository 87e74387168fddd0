//! Sentinel-wide commands: reset, failover, remove, validate
//!
//! Each command targets the pod's current sentinel list from the registry.
//! A registry failure aborts the command before any sentinel is contacted.

use crate::client::NodeSession;
use crate::common::{AuditEventType, AuditOutcome, Error, Result};
use crate::ops::quorum::{SuccessPolicy, Tally, TargetCommand};
use crate::ops::{dispatch, Context, Operation};
use crate::pod::PodConfig;
use async_trait::async_trait;

fn audit_outcome(tally: &Tally) -> AuditOutcome {
    if tally.is_complete() {
        AuditOutcome::Success
    } else if tally.any_succeeded() {
        AuditOutcome::Partial
    } else {
        AuditOutcome::Failure
    }
}

async fn fan_out(
    ctx: &Context,
    pod: &PodConfig,
    policy: SuccessPolicy,
    command: &dyn TargetCommand,
) -> Result<Tally> {
    let sentinels = ctx.registry.watchdogs_of(pod).await?;
    if sentinels.is_empty() {
        tracing::warn!("Pod {} has no known sentinels", pod.name);
    }
    Ok(ctx.executor().run(&sentinels, policy, command).await)
}

fn record(ctx: &Context, event: AuditEventType, pod: &PodConfig, tally: &Tally, verb: &str) {
    ctx.audit.log_event(
        event,
        &pod.name,
        audit_outcome(tally),
        format!("{} sentinels {}", tally, verb),
        Some(serde_json::json!({
            "succeeded": tally.successes(),
            "attempted": tally.attempted(),
            "total": tally.total,
        })),
    );
}

// ===== Reset =====

struct ResetCommand<'a> {
    pod: &'a str,
}

#[async_trait]
impl TargetCommand for ResetCommand<'_> {
    fn action(&self) -> &'static str {
        "reset"
    }

    async fn apply(&self, session: &mut dyn NodeSession) -> Result<()> {
        session.sentinel_reset(self.pod).await
    }
}

/// Reset the pod's state on every sentinel; all must succeed
pub struct Reset;

#[async_trait]
impl Operation for Reset {
    fn name(&self) -> &'static str {
        "reset"
    }

    async fn execute(&self, ctx: &Context, pod: &PodConfig) -> Result<Tally> {
        let command = ResetCommand { pod: &pod.name };
        let tally = fan_out(ctx, pod, SuccessPolicy::AllMustSucceed, &command).await?;
        record(ctx, AuditEventType::SentinelsReset, pod, &tally, "reset");

        if !tally.is_complete() {
            return Err(Error::QuorumNotReached {
                action: "reset",
                succeeded: tally.successes(),
                total: tally.total,
            });
        }
        Ok(tally)
    }
}

// ===== Failover =====

struct FailoverCommand<'a> {
    pod: &'a str,
}

#[async_trait]
impl TargetCommand for FailoverCommand<'_> {
    fn action(&self) -> &'static str {
        "accepted the failover"
    }

    async fn apply(&self, session: &mut dyn NodeSession) -> Result<()> {
        if session.sentinel_failover(self.pod).await? {
            Ok(())
        } else {
            Err(Error::unexpected(
                session.address(),
                "failover request not accepted",
            ))
        }
    }
}

/// Ask sentinels, in order, to fail the pod over until one accepts
pub struct Failover;

#[async_trait]
impl Operation for Failover {
    fn name(&self) -> &'static str {
        "failover"
    }

    async fn execute(&self, ctx: &Context, pod: &PodConfig) -> Result<Tally> {
        let command = FailoverCommand { pod: &pod.name };
        let tally = fan_out(ctx, pod, SuccessPolicy::FirstSuccess, &command).await?;

        let outcome = if tally.any_succeeded() {
            AuditOutcome::Success
        } else {
            AuditOutcome::Failure
        };
        let message = match tally.succeeded.first() {
            Some(addr) => format!("failover accepted by {}", addr),
            None => format!("no sentinel accepted the failover ({} tried)", tally.attempted()),
        };
        ctx.audit.log_event(
            AuditEventType::FailoverRequested,
            &pod.name,
            outcome,
            message,
            None,
        );

        if !tally.any_succeeded() {
            return Err(Error::NoFailoverAccepted {
                attempted: tally.attempted(),
            });
        }
        Ok(tally)
    }
}

// ===== Remove =====

struct RemoveCommand<'a> {
    pod: &'a str,
}

#[async_trait]
impl TargetCommand for RemoveCommand<'_> {
    fn action(&self) -> &'static str {
        "removed the pod"
    }

    async fn apply(&self, session: &mut dyn NodeSession) -> Result<()> {
        if session.sentinel_remove(self.pod).await? {
            Ok(())
        } else {
            Err(Error::unexpected(
                session.address(),
                "unknown removal status, manual verification recommended",
            ))
        }
    }
}

/// Remove the pod from every sentinel; all must succeed.
///
/// A sentinel that is down when this runs keeps monitoring the pod and has
/// to be cleaned up by hand once it is back.
pub struct Remove;

#[async_trait]
impl Operation for Remove {
    fn name(&self) -> &'static str {
        "remove"
    }

    async fn execute(&self, ctx: &Context, pod: &PodConfig) -> Result<Tally> {
        let command = RemoveCommand { pod: &pod.name };
        let tally = fan_out(ctx, pod, SuccessPolicy::AllMustSucceed, &command).await?;
        record(ctx, AuditEventType::PodRemoved, pod, &tally, "removed the pod");

        if !tally.is_complete() {
            for failure in &tally.failed {
                tracing::warn!(
                    "Sentinel {} still monitors {}: {}",
                    failure.addr,
                    pod.name,
                    failure.reason
                );
            }
            return Err(Error::ManualCleanupRequired {
                removed: tally.successes(),
                total: tally.total,
            });
        }
        Ok(tally)
    }
}

// ===== Validate =====

struct ValidateCommand<'a> {
    pod: &'a str,
}

#[async_trait]
impl TargetCommand for ValidateCommand<'_> {
    fn action(&self) -> &'static str {
        "confirmed the pod"
    }

    async fn apply(&self, session: &mut dyn NodeSession) -> Result<()> {
        let master = session.sentinel_master(self.pod).await?;
        if master.name != self.pod {
            return Err(Error::SemanticMismatch {
                addr: session.address().to_string(),
                expected: self.pod.to_string(),
                actual: master.name,
            });
        }
        Ok(())
    }
}

/// Check that every known sentinel is reachable and monitors this pod
pub struct ValidateSentinels;

#[async_trait]
impl Operation for ValidateSentinels {
    fn name(&self) -> &'static str {
        "validate-sentinels"
    }

    async fn execute(&self, ctx: &Context, pod: &PodConfig) -> Result<Tally> {
        let command = ValidateCommand { pod: &pod.name };
        let tally = fan_out(ctx, pod, SuccessPolicy::AllMustSucceed, &command).await?;
        record(
            ctx,
            AuditEventType::SentinelsValidated,
            pod,
            &tally,
            "confirmed the pod",
        );

        if !tally.is_complete() {
            return Err(Error::QuorumNotReached {
                action: "contacted and have this pod in their list",
                succeeded: tally.successes(),
                total: tally.total,
            });
        }
        Ok(tally)
    }
}

// ===== Entry points =====

pub async fn reset(ctx: &Context, pod: &PodConfig) -> Result<()> {
    dispatch(&Reset, ctx, pod).await.map(|_| ())
}

pub async fn failover(ctx: &Context, pod: &PodConfig) -> Result<()> {
    dispatch(&Failover, ctx, pod).await.map(|_| ())
}

pub async fn remove(ctx: &Context, pod: &PodConfig) -> Result<bool> {
    dispatch(&Remove, ctx, pod).await.map(|_| true)
}

pub async fn validate_sentinels(ctx: &Context, pod: &PodConfig) -> Result<bool> {
    dispatch(&ValidateSentinels, ctx, pod).await.map(|_| true)
}
