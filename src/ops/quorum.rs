//! Fan-out with aggregation
//!
//! The executor applies one [`TargetCommand`] to every address of a target
//! list. A target that cannot be reached, rejects the command, answers
//! nonsense or runs past the deadline counts as one failure; the diagnostic
//! is logged and only the tally travels back to the caller.

use crate::client::{Connector, NodeSession};
use crate::common::config::FanoutConfig;
use crate::common::{Error, Result};
use crate::pod::Address;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::fmt;
use std::future::Future;

/// How individual outcomes decide the overall result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessPolicy {
    /// Every target must succeed. An empty list is vacuously satisfied.
    AllMustSucceed,
    /// Targets are tried in order; the first success ends the fan-out.
    FirstSuccess,
}

/// Command applied to one target over a fresh session
#[async_trait]
pub trait TargetCommand: Send + Sync {
    /// Past participle used in tallies ("reset", "removed", ...)
    fn action(&self) -> &'static str;

    /// Password presented when connecting to each target
    fn password(&self) -> Option<&str> {
        None
    }

    async fn apply(&self, session: &mut dyn NodeSession) -> Result<()>;
}

/// One target that did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFailure {
    pub addr: Address,
    pub reason: String,
}

/// Per-target outcomes of one fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub total: usize,
    pub succeeded: Vec<Address>,
    pub failed: Vec<TargetFailure>,
}

impl Tally {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn successes(&self) -> usize {
        self.succeeded.len()
    }

    /// Targets actually contacted (less than `total` after a short-circuit)
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Every target succeeded; true for an empty target list
    pub fn is_complete(&self) -> bool {
        self.successes() == self.total
    }

    pub fn any_succeeded(&self) -> bool {
        !self.succeeded.is_empty()
    }

    fn record(&mut self, addr: &Address, outcome: Result<()>) {
        match outcome {
            Ok(()) => self.succeeded.push(addr.clone()),
            Err(e) => self.failed.push(TargetFailure {
                addr: addr.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.successes(), self.total)
    }
}

/// Runs target commands through a connector
pub struct QuorumExecutor<'a> {
    connector: &'a dyn Connector,
    fanout: &'a FanoutConfig,
}

impl<'a> QuorumExecutor<'a> {
    pub fn new(connector: &'a dyn Connector, fanout: &'a FanoutConfig) -> Self {
        Self { connector, fanout }
    }

    pub async fn run(
        &self,
        targets: &[Address],
        policy: SuccessPolicy,
        command: &dyn TargetCommand,
    ) -> Tally {
        let mut tally = Tally::new(targets.len());
        if targets.is_empty() {
            tracing::debug!(
                "No targets to {}; treating the empty list as satisfied",
                command.action()
            );
            return tally;
        }

        match policy {
            SuccessPolicy::FirstSuccess => {
                for target in targets {
                    let outcome = self.attempt(target, command).await;
                    let done = outcome.is_ok();
                    tally.record(target, outcome);
                    if done {
                        tracing::debug!(
                            "{} succeeded on {}, skipping the rest",
                            command.action(),
                            target
                        );
                        break;
                    }
                }
            }
            SuccessPolicy::AllMustSucceed => {
                let outcomes = for_each_target(targets, self.fanout.concurrent, |target| {
                    self.attempt(target, command)
                })
                .await;
                for (target, outcome) in targets.iter().zip(outcomes) {
                    tally.record(target, outcome);
                }
            }
        }

        tracing::info!("{} targets {}", tally, command.action());
        tally
    }

    async fn attempt(&self, target: &Address, command: &dyn TargetCommand) -> Result<()> {
        let work = async {
            let mut session = self.connector.connect(target, command.password()).await?;
            command.apply(session.as_mut()).await
        };

        let outcome = match self.fanout.target_timeout() {
            Some(deadline) => tokio::time::timeout(deadline, work)
                .await
                .unwrap_or_else(|_| {
                    Err(Error::Timeout(format!("{} on {}", command.action(), target)))
                }),
            None => work.await,
        };

        if let Err(e) = &outcome {
            tracing::warn!("[{}] {}", target, e);
        }
        outcome
    }
}

/// Run `f` for every target, concurrently or in order, keeping target order in the output
pub(crate) async fn for_each_target<'t, F, Fut, T>(
    targets: &'t [Address],
    concurrent: bool,
    f: F,
) -> Vec<T>
where
    F: Fn(&'t Address) -> Fut,
    Fut: Future<Output = T>,
{
    if concurrent {
        join_all(targets.iter().map(f)).await
    } else {
        let mut out = Vec::with_capacity(targets.len());
        for target in targets {
            out.push(f(target).await);
        }
        out
    }
}
