//! Entanglement detection through the registry

mod common;

use common::*;
use podmanager::ops::{self, WalkDepth};
use podmanager::pod::{Registry, SentinelConfRegistry, StaticRegistry};
use podmanager::{Address, PodConfig};
use std::io::Write;

fn addr(last: u8) -> Address {
    Address::new(format!("10.0.2.{}", last), 6379)
}

#[tokio::test]
async fn test_isolated_pod_makes_no_calls() {
    let (cluster, pod) = healthy_pod("pw", 1, 1);
    let other = PodConfig::new("pod2", addr(1)).with_slaves([addr(2)]);
    let ctx = context(&cluster, StaticRegistry::new([pod.clone(), other]));

    let entangled = ops::walk_topology(&ctx, &pod).await.unwrap();
    assert!(entangled.is_empty());
    assert!(cluster.calls().is_empty());
}

#[tokio::test]
async fn test_entangled_pod_triggers_auth_probe() {
    let (cluster, pod) = healthy_pod("pw", 1, 0);
    // pod2 registered the same master under another name
    let other = PodConfig::new("pod2", master()).with_authpass("pw");
    let ctx = context(&cluster, StaticRegistry::new([pod.clone(), other]));

    let entangled = ops::walk_topology(&ctx, &pod).await.unwrap();
    assert_eq!(entangled.len(), 1);
    assert_eq!(entangled[0].name, "pod2");
    assert_eq!(cluster.calls_of("ping").len(), 2);
}

#[tokio::test]
async fn test_walk_depth_from_config() {
    let cluster = MockCluster::new();
    let pods = vec![
        PodConfig::new("a", addr(1)).with_slaves([addr(2)]),
        PodConfig::new("b", addr(2)).with_slaves([addr(3)]),
        PodConfig::new("c", addr(3)).with_slaves([addr(4)]),
        PodConfig::new("d", addr(4)),
    ];
    let target = pods[0].clone();
    let ctx = context(&cluster, StaticRegistry::new(pods.clone()));

    let names = |found: Vec<PodConfig>| found.into_iter().map(|p| p.name).collect::<Vec<_>>();

    let found = ops::walk_topology(&ctx, &target).await.unwrap();
    assert_eq!(names(found), vec!["b", "c"]);

    let mut config = podmanager::Config::default();
    config.topology.full_closure = true;
    let ctx = ctx.with_config(config);
    let found = ops::walk_topology(&ctx, &target).await.unwrap();
    assert_eq!(names(found), vec!["b", "c", "d"]);
}

#[tokio::test]
async fn test_conflicts_from_sentinel_conf() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "sentinel monitor pod1 10.0.0.1 6379 2\n\
         sentinel known-slave pod1 10.0.0.2 6379\n\
         sentinel monitor pod2 10.0.0.2 6379 2\n\
         sentinel monitor pod3 10.0.0.9 6379 2\n"
    )
    .unwrap();
    file.flush().unwrap();

    let registry = SentinelConfRegistry::new(file.path());
    let pods = registry.all_pods().await.unwrap();
    let groups = ops::audit_registry(&pods, WalkDepth::default());
    assert_eq!(groups, vec![vec!["pod1".to_string(), "pod2".to_string()]]);
}
