//! Topology conflict detection
//!
//! Two pods are entangled when one node address is registered under both:
//! their masters coincide, a master of one is a replica of the other, or
//! they share a replica. Detection is pairwise; [`walk`] expands it
//! breadth-first from a target pod up to a hop limit.

use crate::common::config::TopologyConfig;
use crate::common::{AuditEventType, AuditOutcome, Result};
use crate::ops::auth::check_auth;
use crate::ops::Context;
use crate::pod::PodConfig;
use std::collections::{BTreeMap, BTreeSet};

/// How far [`walk`] expands from the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkDepth {
    /// Stop after this many hops
    Hops(usize),
    /// Expand until no new pod turns up
    Full,
}

impl Default for WalkDepth {
    fn default() -> Self {
        WalkDepth::Hops(2)
    }
}

impl From<&TopologyConfig> for WalkDepth {
    fn from(config: &TopologyConfig) -> Self {
        if config.full_closure {
            WalkDepth::Full
        } else {
            WalkDepth::Hops(config.depth)
        }
    }
}

impl WalkDepth {
    fn allows(&self, hop: usize) -> bool {
        match self {
            WalkDepth::Hops(limit) => hop <= *limit,
            WalkDepth::Full => true,
        }
    }
}

/// Do `target` and `other` claim a common node?
pub fn overlaps(target: &PodConfig, other: &PodConfig) -> bool {
    other.serves(&target.master) || target.known_slaves.iter().any(|s| other.serves(s))
}

/// Pods directly entangled with `target`, skipping the target itself by name
pub fn direct_conflicts<'a>(
    target: &PodConfig,
    pods: &'a BTreeMap<String, PodConfig>,
) -> Vec<&'a PodConfig> {
    pods.values()
        .filter(|other| other.name != target.name && overlaps(target, other))
        .collect()
}

/// Breadth-first expansion of the entanglement graph from `target`.
///
/// Returns discovered pods in discovery order, never the target itself.
pub fn walk(
    target: &PodConfig,
    pods: &BTreeMap<String, PodConfig>,
    depth: WalkDepth,
) -> Vec<PodConfig> {
    let mut visited = BTreeSet::from([target.name.clone()]);
    let mut found = Vec::new();
    let mut frontier = vec![target];
    let mut hop = 1;

    while !frontier.is_empty() && depth.allows(hop) {
        let mut next = Vec::new();
        for pod in frontier {
            for other in direct_conflicts(pod, pods) {
                if visited.insert(other.name.clone()) {
                    tracing::debug!("Hop {}: {} entangled with {}", hop, pod.name, other.name);
                    found.push(other.clone());
                    next.push(other);
                }
            }
        }
        frontier = next;
        hop += 1;
    }
    found
}

/// Group every entangled pod of a registry, walking each unvisited pod once.
///
/// Isolated pods do not appear. Group members are sorted by name.
pub fn audit_registry(pods: &BTreeMap<String, PodConfig>, depth: WalkDepth) -> Vec<Vec<String>> {
    let mut visited = BTreeSet::new();
    let mut groups = Vec::new();

    for pod in pods.values() {
        if visited.contains(&pod.name) {
            continue;
        }
        let entangled = walk(pod, pods, depth);
        if entangled.is_empty() {
            continue;
        }
        let mut group: Vec<String> = std::iter::once(pod.name.clone())
            .chain(entangled.into_iter().map(|p| p.name))
            .collect();
        group.sort();
        visited.extend(group.iter().cloned());
        groups.push(group);
    }
    groups
}

/// Find pods entangled with `pod` in the registry.
///
/// When any turn up, the pod's credential is checked as a diagnostic and
/// the conflict is logged and audited.
pub async fn walk_topology(ctx: &Context, pod: &PodConfig) -> Result<Vec<PodConfig>> {
    let pods = ctx.registry.all_pods().await?;
    let depth = WalkDepth::from(&ctx.config.topology);
    let entangled = walk(pod, &pods, depth);

    if entangled.is_empty() {
        tracing::info!("Pod {} is isolated", pod.name);
        return Ok(entangled);
    }

    let names: Vec<&str> = entangled.iter().map(|p| p.name.as_str()).collect();
    tracing::warn!(
        "Pod {} is entangled with {} other pod(s): {}",
        pod.name,
        names.len(),
        names.join(", ")
    );

    let auth = check_auth(ctx, pod).await;
    for (node, ok) in &auth.results {
        tracing::info!("  auth {} -> {}", node, if *ok { "ok" } else { "FAILED" });
    }

    ctx.audit.log_event(
        AuditEventType::TopologyConflict,
        &pod.name,
        AuditOutcome::Failure,
        format!("entangled with {}", names.join(", ")),
        Some(serde_json::json!({ "entangled": names, "auth": auth.results })),
    );
    Ok(entangled)
}
