//! Pod registries
//!
//! A registry resolves pod names and answers "who are the replicas and
//! sentinels of this pod right now". Operations receive it explicitly so
//! tests can hand in fabricated topologies.

use crate::common::{Error, Result};
use crate::pod::{parse_sentinel_config, Address, PodConfig};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait Registry: Send + Sync {
    /// Snapshot of one pod
    async fn resolve_pod(&self, name: &str) -> Result<PodConfig>;

    /// Every pod this registry knows about
    async fn all_pods(&self) -> Result<BTreeMap<String, PodConfig>>;

    /// Current replica list of `pod`
    async fn replicas_of(&self, pod: &PodConfig) -> Result<Vec<Address>>;

    /// Current sentinel list of `pod`
    async fn watchdogs_of(&self, pod: &PodConfig) -> Result<Vec<Address>>;
}

/// Registry backed by a sentinel.conf file, re-read on every call
pub struct SentinelConfRegistry {
    path: PathBuf,
}

impl SentinelConfRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, PodConfig>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::Registry(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        parse_sentinel_config(&content)
    }

    async fn current(&self, name: &str) -> Result<PodConfig> {
        self.load()
            .await?
            .remove(name)
            .ok_or_else(|| Error::PodNotFound(name.to_string()))
    }
}

#[async_trait]
impl Registry for SentinelConfRegistry {
    async fn resolve_pod(&self, name: &str) -> Result<PodConfig> {
        tracing::debug!("Resolving pod {} from {}", name, self.path.display());
        self.current(name).await
    }

    async fn all_pods(&self) -> Result<BTreeMap<String, PodConfig>> {
        self.load().await
    }

    async fn replicas_of(&self, pod: &PodConfig) -> Result<Vec<Address>> {
        Ok(self.current(&pod.name).await?.known_slaves)
    }

    async fn watchdogs_of(&self, pod: &PodConfig) -> Result<Vec<Address>> {
        Ok(self.current(&pod.name).await?.known_sentinels)
    }
}

/// In-memory registry
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    pods: BTreeMap<String, PodConfig>,
}

impl StaticRegistry {
    pub fn new(pods: impl IntoIterator<Item = PodConfig>) -> Self {
        Self {
            pods: pods.into_iter().map(|p| (p.name.clone(), p)).collect(),
        }
    }

    pub fn insert(&mut self, pod: PodConfig) -> Option<PodConfig> {
        self.pods.insert(pod.name.clone(), pod)
    }

    fn get(&self, name: &str) -> Result<&PodConfig> {
        self.pods
            .get(name)
            .ok_or_else(|| Error::PodNotFound(name.to_string()))
    }
}

#[async_trait]
impl Registry for StaticRegistry {
    async fn resolve_pod(&self, name: &str) -> Result<PodConfig> {
        self.get(name).cloned()
    }

    async fn all_pods(&self) -> Result<BTreeMap<String, PodConfig>> {
        Ok(self.pods.clone())
    }

    async fn replicas_of(&self, pod: &PodConfig) -> Result<Vec<Address>> {
        Ok(self.get(&pod.name)?.known_slaves.clone())
    }

    async fn watchdogs_of(&self, pod: &PodConfig) -> Result<Vec<Address>> {
        Ok(self.get(&pod.name)?.known_sentinels.clone())
    }
}
