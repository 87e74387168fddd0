//! In-memory nodes and registries for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use podmanager::client::{Connector, MasterInfo, NodeSession};
use podmanager::pod::{Registry, StaticRegistry};
use podmanager::{Address, Context, Error, PodConfig, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How long a hanging node stalls; well past any deadline a test sets
pub const HANG_FOR: Duration = Duration::from_secs(30);

/// Behaviour and state of one fake node (master, replica or sentinel)
#[derive(Debug, Clone, Default)]
pub struct MockNode {
    pub down: bool,
    /// Accept the connection but never get around to answering
    pub hang: bool,
    pub ping_fails: bool,
    pub fail_config_set: bool,
    pub params: BTreeMap<String, String>,
    pub reject_sentinel_commands: bool,
    pub failover_accepted: bool,
    pub remove_confirmed: bool,
    /// Pod name a sentinel reports back from `SENTINEL MASTER`
    pub reports_pod: Option<String>,
    pub sentinel_settings: BTreeMap<(String, String), String>,
}

impl MockNode {
    pub fn data(password: &str) -> Self {
        let mut node = MockNode::default();
        if !password.is_empty() {
            node.params.insert("requirepass".into(), password.into());
            node.params.insert("masterauth".into(), password.into());
        }
        node
    }

    pub fn sentinel() -> Self {
        MockNode {
            failover_accepted: true,
            remove_confirmed: true,
            ..Default::default()
        }
    }

    pub fn down() -> Self {
        MockNode {
            down: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub addr: Address,
    pub op: String,
}

#[derive(Default)]
struct State {
    nodes: BTreeMap<Address, MockNode>,
    calls: Vec<Call>,
}

/// Fake cluster acting as the connector; records every call
#[derive(Clone, Default)]
pub struct MockCluster {
    state: Arc<Mutex<State>>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, addr: &Address, node: MockNode) {
        self.state.lock().unwrap().nodes.insert(addr.clone(), node);
    }

    pub fn update(&self, addr: &Address, f: impl FnOnce(&mut MockNode)) {
        let mut state = self.state.lock().unwrap();
        f(state.nodes.get_mut(addr).expect("unknown mock node"));
    }

    pub fn node(&self, addr: &Address) -> MockNode {
        self.state.lock().unwrap().nodes[addr].clone()
    }

    pub fn param(&self, addr: &Address, name: &str) -> Option<String> {
        self.node(addr).params.get(name).cloned()
    }

    pub fn sentinel_setting(&self, addr: &Address, pod: &str, key: &str) -> Option<String> {
        self.node(addr)
            .sentinel_settings
            .get(&(pod.to_string(), key.to_string()))
            .cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Addresses that received `op`, in call order
    pub fn calls_of(&self, op: &str) -> Vec<Address> {
        self.calls()
            .into_iter()
            .filter(|c| c.op == op)
            .map(|c| c.addr)
            .collect()
    }

    pub fn contacted(&self, addr: &Address) -> bool {
        self.calls().iter().any(|c| c.addr == *addr)
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Does `addr` accept `password` on a fresh connection?
    pub async fn accepts(&self, addr: &Address, password: &str) -> bool {
        self.connect(addr, Some(password)).await.is_ok()
    }

    fn log(&self, addr: &Address, op: &str) {
        self.state.lock().unwrap().calls.push(Call {
            addr: addr.clone(),
            op: op.to_string(),
        });
    }

    fn with_node<T>(&self, addr: &Address, f: impl FnOnce(&mut MockNode) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(state.nodes.get_mut(addr).expect("unknown mock node"))
    }
}

#[async_trait]
impl Connector for MockCluster {
    async fn connect(
        &self,
        addr: &Address,
        password: Option<&str>,
    ) -> Result<Box<dyn NodeSession>> {
        self.log(addr, "connect");
        let (reachable, hang) = {
            let state = self.state.lock().unwrap();
            state
                .nodes
                .get(addr)
                .map(|n| (!n.down, n.hang))
                .unwrap_or((false, false))
        };
        if hang {
            tokio::time::sleep(HANG_FOR).await;
        }
        if !reachable {
            return Err(Error::ConnectionFailed {
                addr: addr.to_string(),
                reason: "connection refused".into(),
            });
        }

        let mut session = MockSession {
            addr: addr.clone(),
            cluster: self.clone(),
            authed: false,
        };
        if let Some(password) = password {
            session.authenticate(password).await?;
        }
        Ok(Box::new(session))
    }
}

pub struct MockSession {
    addr: Address,
    cluster: MockCluster,
    authed: bool,
}

impl MockSession {
    fn require_auth(&self, node: &MockNode) -> Result<()> {
        let protected = node
            .params
            .get("requirepass")
            .map(|p| !p.is_empty())
            .unwrap_or(false);
        if protected && !self.authed {
            return Err(Error::InvalidCredential {
                addr: self.addr.to_string(),
                reason: "NOAUTH Authentication required.".into(),
            });
        }
        Ok(())
    }

    fn sentinel_guard(&self, node: &MockNode) -> Result<()> {
        if node.reject_sentinel_commands {
            return Err(Error::Protocol {
                addr: self.addr.to_string(),
                message: "ERR No such master with that name".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl NodeSession for MockSession {
    fn address(&self) -> &Address {
        &self.addr
    }

    async fn authenticate(&mut self, password: &str) -> Result<()> {
        self.cluster.log(&self.addr, "auth");
        let expected = self
            .cluster
            .with_node(&self.addr, |n| n.params.get("requirepass").cloned());
        match expected {
            Some(p) if !p.is_empty() && p != password => Err(Error::InvalidCredential {
                addr: self.addr.to_string(),
                reason: "ERR invalid password".into(),
            }),
            _ => {
                self.authed = true;
                Ok(())
            }
        }
    }

    async fn ping(&mut self) -> Result<()> {
        self.cluster.log(&self.addr, "ping");
        let node = self.cluster.node(&self.addr);
        self.require_auth(&node)?;
        if node.ping_fails {
            return Err(Error::Protocol {
                addr: self.addr.to_string(),
                message: "LOADING".into(),
            });
        }
        Ok(())
    }

    async fn get_parameter(&mut self, name: &str) -> Result<Option<String>> {
        self.cluster.log(&self.addr, "config_get");
        let node = self.cluster.node(&self.addr);
        self.require_auth(&node)?;
        Ok(node.params.get(name).cloned())
    }

    async fn set_parameter(&mut self, name: &str, value: &str) -> Result<()> {
        self.cluster.log(&self.addr, "config_set");
        let node = self.cluster.node(&self.addr);
        self.require_auth(&node)?;
        if node.fail_config_set {
            return Err(Error::Protocol {
                addr: self.addr.to_string(),
                message: "ERR CONFIG SET failed".into(),
            });
        }
        self.cluster.with_node(&self.addr, |n| {
            n.params.insert(name.to_string(), value.to_string())
        });
        Ok(())
    }

    async fn sentinel_reset(&mut self, _pod: &str) -> Result<()> {
        self.cluster.log(&self.addr, "sentinel_reset");
        self.sentinel_guard(&self.cluster.node(&self.addr))
    }

    async fn sentinel_failover(&mut self, _pod: &str) -> Result<bool> {
        self.cluster.log(&self.addr, "sentinel_failover");
        let node = self.cluster.node(&self.addr);
        self.sentinel_guard(&node)?;
        Ok(node.failover_accepted)
    }

    async fn sentinel_remove(&mut self, _pod: &str) -> Result<bool> {
        self.cluster.log(&self.addr, "sentinel_remove");
        let node = self.cluster.node(&self.addr);
        self.sentinel_guard(&node)?;
        Ok(node.remove_confirmed)
    }

    async fn sentinel_master(&mut self, pod: &str) -> Result<MasterInfo> {
        self.cluster.log(&self.addr, "sentinel_master");
        let node = self.cluster.node(&self.addr);
        self.sentinel_guard(&node)?;
        Ok(MasterInfo {
            name: node.reports_pod.unwrap_or_else(|| pod.to_string()),
            ..Default::default()
        })
    }

    async fn sentinel_set(&mut self, pod: &str, key: &str, value: &str) -> Result<()> {
        self.cluster.log(&self.addr, "sentinel_set");
        self.sentinel_guard(&self.cluster.node(&self.addr))?;
        self.cluster.with_node(&self.addr, |n| {
            n.sentinel_settings
                .insert((pod.to_string(), key.to_string()), value.to_string())
        });
        Ok(())
    }
}

/// Registry whose replica or sentinel listing can be made to fail
pub struct FlakyRegistry {
    pub inner: StaticRegistry,
    pub fail_replicas: bool,
    pub fail_watchdogs: bool,
}

impl FlakyRegistry {
    pub fn new(pods: impl IntoIterator<Item = PodConfig>) -> Self {
        Self {
            inner: StaticRegistry::new(pods),
            fail_replicas: false,
            fail_watchdogs: false,
        }
    }
}

#[async_trait]
impl Registry for FlakyRegistry {
    async fn resolve_pod(&self, name: &str) -> Result<PodConfig> {
        self.inner.resolve_pod(name).await
    }

    async fn all_pods(&self) -> Result<BTreeMap<String, PodConfig>> {
        self.inner.all_pods().await
    }

    async fn replicas_of(&self, pod: &PodConfig) -> Result<Vec<Address>> {
        if self.fail_replicas {
            return Err(Error::Registry("replica listing unavailable".into()));
        }
        self.inner.replicas_of(pod).await
    }

    async fn watchdogs_of(&self, pod: &PodConfig) -> Result<Vec<Address>> {
        if self.fail_watchdogs {
            return Err(Error::Registry("sentinel listing unavailable".into()));
        }
        self.inner.watchdogs_of(pod).await
    }
}

pub fn master() -> Address {
    Address::new("10.0.0.1", 6379)
}

pub fn replica(n: u8) -> Address {
    Address::new(format!("10.0.0.{}", 10 + n), 6379)
}

pub fn sentinel(n: u8) -> Address {
    Address::new(format!("10.0.1.{}", n), 26379)
}

/// Pod "pod1" with password `password`, `replicas` replicas and `sentinels`
/// sentinels, all registered healthy in a fresh cluster
pub fn healthy_pod(password: &str, replicas: u8, sentinels: u8) -> (MockCluster, PodConfig) {
    let cluster = MockCluster::new();
    cluster.add(&master(), MockNode::data(password));
    let replicas: Vec<Address> = (1..=replicas).map(replica).collect();
    for r in &replicas {
        cluster.add(r, MockNode::data(password));
    }
    let sentinels: Vec<Address> = (1..=sentinels).map(sentinel).collect();
    for s in &sentinels {
        cluster.add(s, MockNode::sentinel());
    }

    let pod = PodConfig::new("pod1", master())
        .with_authpass(password)
        .with_slaves(replicas)
        .with_sentinels(sentinels);
    (cluster, pod)
}

pub fn context(cluster: &MockCluster, registry: impl Registry + 'static) -> Context {
    Context::new(Arc::new(cluster.clone()), Arc::new(registry))
}
