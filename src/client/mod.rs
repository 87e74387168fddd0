//! Node client
//!
//! [`Connector`] opens sessions; [`NodeSession`] is the request/response
//! vocabulary the operations need from a master, a replica or a sentinel.
//! [`RespConnector`] implements both over plain TCP.

pub mod resp;
pub mod session;

pub use session::{RespConnector, RespSession};

use crate::common::Result;
use crate::pod::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Parameter carrying the password replicas use towards their master
pub const MASTER_AUTH_PARAM: &str = "masterauth";
/// Parameter carrying the password clients must present
pub const CLIENT_AUTH_PARAM: &str = "requirepass";
/// Sentinel-side pod setting holding the pod password
pub const SENTINEL_AUTH_PARAM: &str = "auth-pass";

/// Opens sessions to nodes
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `addr`, authenticating first when `password` is given.
    ///
    /// A rejected password surfaces as `Error::InvalidCredential`.
    async fn connect(&self, addr: &Address, password: Option<&str>)
        -> Result<Box<dyn NodeSession>>;
}

/// One open connection
#[async_trait]
pub trait NodeSession: Send {
    fn address(&self) -> &Address;

    async fn authenticate(&mut self, password: &str) -> Result<()>;

    async fn ping(&mut self) -> Result<()>;

    async fn get_parameter(&mut self, name: &str) -> Result<Option<String>>;

    async fn set_parameter(&mut self, name: &str, value: &str) -> Result<()>;

    async fn sentinel_reset(&mut self, pod: &str) -> Result<()>;

    /// `true` when the sentinel accepted the failover request
    async fn sentinel_failover(&mut self, pod: &str) -> Result<bool>;

    /// `true` when the sentinel confirmed removal
    async fn sentinel_remove(&mut self, pod: &str) -> Result<bool>;

    async fn sentinel_master(&mut self, pod: &str) -> Result<MasterInfo>;

    async fn sentinel_set(&mut self, pod: &str, key: &str, value: &str) -> Result<()>;
}

/// What a sentinel reports about the master of a pod
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterInfo {
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub flags: String,
    pub num_slaves: u32,
    pub num_other_sentinels: u32,
    pub quorum: u32,
}

impl MasterInfo {
    /// Build from the flat field/value list returned by `SENTINEL MASTER`
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut info = MasterInfo::default();
        for (key, value) in pairs {
            match key {
                "name" => info.name = value.to_string(),
                "ip" => info.ip = value.to_string(),
                "port" => info.port = value.parse().unwrap_or_default(),
                "flags" => info.flags = value.to_string(),
                "num-slaves" => info.num_slaves = value.parse().unwrap_or_default(),
                "num-other-sentinels" => {
                    info.num_other_sentinels = value.parse().unwrap_or_default()
                }
                "quorum" => info.quorum = value.parse().unwrap_or_default(),
                _ => {}
            }
        }
        info
    }
}
