//! TCP sessions speaking the node text protocol

use crate::client::resp::{encode_command, parse_reply, Reply};
use crate::client::{Connector, MasterInfo, NodeSession};
use crate::common::{Config, Error, Result};
use crate::pod::Address;
use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Error-reply fragments that mean "wrong or missing password"
const AUTH_REJECTIONS: &[&str] = &[
    "invalid password",
    "WRONGPASS",
    "NOAUTH",
    "invalid username-password",
];

/// Connector that opens a fresh TCP session per call
#[derive(Debug, Clone)]
pub struct RespConnector {
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl RespConnector {
    pub fn new(connect_timeout: Duration, command_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            command_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.connect_timeout(), config.command_timeout())
    }
}

#[async_trait]
impl Connector for RespConnector {
    async fn connect(
        &self,
        addr: &Address,
        password: Option<&str>,
    ) -> Result<Box<dyn NodeSession>> {
        let target = addr.to_string();
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&target))
            .await
            .map_err(|_| Error::Timeout(format!("connect to {}", target)))?
            .map_err(|e| Error::connection(&target, e))?;
        stream.set_nodelay(true).ok();

        tracing::debug!("Connected to {}", target);
        let mut session = RespSession {
            addr: addr.clone(),
            stream,
            buf: BytesMut::with_capacity(4096),
            command_timeout: self.command_timeout,
        };
        if let Some(password) = password {
            session.authenticate(password).await?;
        }
        Ok(Box::new(session))
    }
}

pub struct RespSession {
    addr: Address,
    stream: TcpStream,
    buf: BytesMut,
    command_timeout: Duration,
}

impl RespSession {
    /// Send one command and wait for its reply, bounded by the command timeout
    pub async fn call(&mut self, args: &[&str]) -> Result<Reply> {
        let timeout = self.command_timeout;
        let name = args.first().copied().unwrap_or_default().to_string();
        tokio::time::timeout(timeout, self.round_trip(args))
            .await
            .map_err(|_| Error::Timeout(format!("{} on {}", name, self.addr)))?
    }

    async fn round_trip(&mut self, args: &[&str]) -> Result<Reply> {
        let request = encode_command(args);
        self.stream
            .write_all(&request)
            .await
            .map_err(|e| Error::connection(&self.addr, e))?;

        loop {
            match parse_reply(&self.buf) {
                Ok(Some((reply, used))) => {
                    self.buf.advance(used);
                    return Ok(reply);
                }
                Ok(None) => {}
                Err(e) => return Err(Error::protocol(&self.addr, e)),
            }
            let n = self
                .stream
                .read_buf(&mut self.buf)
                .await
                .map_err(|e| Error::connection(&self.addr, e))?;
            if n == 0 {
                return Err(Error::connection(&self.addr, "connection closed by peer"));
            }
        }
    }

    /// Like [`call`](Self::call) but turns error replies into `Err`
    async fn command(&mut self, args: &[&str]) -> Result<Reply> {
        match self.call(args).await? {
            Reply::Error(message) => {
                if AUTH_REJECTIONS.iter().any(|r| message.contains(r)) {
                    Err(Error::InvalidCredential {
                        addr: self.addr.to_string(),
                        reason: message,
                    })
                } else {
                    Err(Error::protocol(&self.addr, message))
                }
            }
            reply => Ok(reply),
        }
    }

    async fn expect_ok(&mut self, args: &[&str]) -> Result<()> {
        let reply = self.command(args).await?;
        if reply.is_ok() {
            Ok(())
        } else {
            Err(Error::unexpected(&self.addr, reply))
        }
    }
}

#[async_trait]
impl NodeSession for RespSession {
    fn address(&self) -> &Address {
        &self.addr
    }

    async fn authenticate(&mut self, password: &str) -> Result<()> {
        self.expect_ok(&["AUTH", password]).await
    }

    async fn ping(&mut self) -> Result<()> {
        match self.command(&["PING"]).await? {
            Reply::Simple(s) if s == "PONG" => Ok(()),
            other => Err(Error::unexpected(&self.addr, other)),
        }
    }

    async fn get_parameter(&mut self, name: &str) -> Result<Option<String>> {
        match self.command(&["CONFIG", "GET", name]).await? {
            Reply::Array(Some(items)) => Ok(items.get(1).and_then(Reply::as_text)),
            Reply::Array(None) => Ok(None),
            other => Err(Error::unexpected(&self.addr, other)),
        }
    }

    async fn set_parameter(&mut self, name: &str, value: &str) -> Result<()> {
        self.expect_ok(&["CONFIG", "SET", name, value]).await
    }

    async fn sentinel_reset(&mut self, pod: &str) -> Result<()> {
        match self.command(&["SENTINEL", "RESET", pod]).await? {
            Reply::Integer(n) => {
                tracing::debug!("{} reset {} pod(s) matching '{}'", self.addr, n, pod);
                Ok(())
            }
            other => Err(Error::unexpected(&self.addr, other)),
        }
    }

    async fn sentinel_failover(&mut self, pod: &str) -> Result<bool> {
        Ok(self.command(&["SENTINEL", "FAILOVER", pod]).await?.is_ok())
    }

    async fn sentinel_remove(&mut self, pod: &str) -> Result<bool> {
        Ok(self.command(&["SENTINEL", "REMOVE", pod]).await?.is_ok())
    }

    async fn sentinel_master(&mut self, pod: &str) -> Result<MasterInfo> {
        match self.command(&["SENTINEL", "MASTER", pod]).await? {
            Reply::Array(Some(items)) => {
                let fields: Vec<String> = items.iter().filter_map(Reply::as_text).collect();
                let pairs = fields
                    .chunks_exact(2)
                    .map(|kv| (kv[0].as_str(), kv[1].as_str()));
                Ok(MasterInfo::from_pairs(pairs))
            }
            other => Err(Error::unexpected(&self.addr, other)),
        }
    }

    async fn sentinel_set(&mut self, pod: &str, key: &str, value: &str) -> Result<()> {
        self.expect_ok(&["SENTINEL", "SET", pod, key, value]).await
    }
}
