//! Pod data model and registries
//!
//! A pod is one sentinel-monitored replica set: a master, its replicas and
//! the sentinels watching it. A registry maps pod names to [`PodConfig`]
//! snapshots.

pub mod registry;
pub mod sentinel_conf;

pub use registry::{Registry, SentinelConfRegistry, StaticRegistry};
pub use sentinel_conf::parse_sentinel_config;

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Network identity of a node, compared textually as `host:port`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Build from the separate ip/port tokens found in sentinel directives
    pub fn from_parts(host: &str, port: &str) -> Result<Self> {
        if host.is_empty() {
            return Err(Error::InvalidConfig("empty host".into()));
        }
        let port = port
            .parse()
            .map_err(|_| Error::InvalidConfig(format!("invalid port: {}", port)))?;
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidConfig(format!("address without port: {}", s)))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        Self::from_parts(host, port)
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.to_string()
    }
}

/// Identity and topology of one monitored replica set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodConfig {
    pub name: String,
    pub master: Address,
    pub quorum: u32,
    pub authpass: String,
    pub known_slaves: Vec<Address>,
    pub known_sentinels: Vec<Address>,
    /// Remaining per-pod sentinel directives, verbatim
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, String>,
}

impl PodConfig {
    pub fn new(name: impl Into<String>, master: Address) -> Self {
        Self {
            name: name.into(),
            master,
            quorum: 2,
            authpass: String::new(),
            known_slaves: Vec::new(),
            known_sentinels: Vec::new(),
            settings: BTreeMap::new(),
        }
    }

    pub fn with_authpass(mut self, authpass: impl Into<String>) -> Self {
        self.authpass = authpass.into();
        self
    }

    pub fn with_slaves(mut self, slaves: impl IntoIterator<Item = Address>) -> Self {
        self.known_slaves = slaves.into_iter().collect();
        self
    }

    pub fn with_sentinels(mut self, sentinels: impl IntoIterator<Item = Address>) -> Self {
        self.known_sentinels = sentinels.into_iter().collect();
        self
    }

    /// `None` when the pod runs without `requirepass`
    pub fn password(&self) -> Option<&str> {
        if self.authpass.is_empty() {
            None
        } else {
            Some(&self.authpass)
        }
    }

    /// Is `addr` the master or one of the known replicas?
    pub fn serves(&self, addr: &Address) -> bool {
        self.master == *addr || self.known_slaves.contains(addr)
    }
}
