//! Error types for podmanager

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Connectivity Errors ===
    #[error("Connection to {addr} failed: {reason}")]
    ConnectionFailed { addr: String, reason: String },

    #[error("Operation timeout: {0}")]
    Timeout(String),

    // === Protocol Errors ===
    #[error("{addr} rejected the credential: {reason}")]
    InvalidCredential { addr: String, reason: String },

    #[error("{addr} replied with error: {message}")]
    Protocol { addr: String, message: String },

    #[error("Unexpected reply from {addr}: {reply}")]
    UnexpectedReply { addr: String, reply: String },

    #[error("Asked {addr} about pod '{expected}', got pod '{actual}'")]
    SemanticMismatch {
        addr: String,
        expected: String,
        actual: String,
    },

    // === Precondition Errors ===
    #[error("Supplied old credential does not match the pod's current credential")]
    CredentialMismatch,

    // === Registry Errors ===
    #[error("Pod not found: {0}")]
    PodNotFound(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Sentinel config line {line}: {reason}")]
    SentinelConfig { line: usize, reason: String },

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Ops Errors ===
    #[error("Only {succeeded} of {total} sentinels were successfully {action}")]
    QuorumNotReached {
        action: &'static str,
        succeeded: usize,
        total: usize,
    },

    #[error("No sentinels accepted the failover request ({attempted} tried)")]
    NoFailoverAccepted { attempted: usize },

    #[error(
        "{removed} of {total} sentinels removed the pod. Manual intervention required on the rest."
    )]
    ManualCleanupRequired { removed: usize, total: usize },

    #[error("{failed} of {tested} tested nodes in pod failed auth check")]
    AuthCheckFailed { failed: usize, tested: usize },

    #[error("Primary credential write failed on {addr}: {reason}")]
    PrimaryWriteFailed { addr: String, reason: String },

    #[error("Credential change rolled back: {reason}")]
    RotationRolledBack { reason: String },

    // === Generic ===
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Is this a retryable error?
    pub fn is_retryable(&self) -> bool {
        self.is_connectivity()
            || matches!(
                self,
                Error::QuorumNotReached { .. } | Error::NoFailoverAccepted { .. }
            )
    }

    /// Did the target fail to answer at all (as opposed to answering badly)?
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_) | Error::ConnectionFailed { .. } | Error::Io(_)
        )
    }

    /// Did the failure happen before any remote state was touched?
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::CredentialMismatch | Error::PodNotFound(_) | Error::InvalidConfig(_)
        )
    }

    pub(crate) fn connection(addr: impl ToString, reason: impl ToString) -> Self {
        Error::ConnectionFailed {
            addr: addr.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn protocol(addr: impl ToString, message: impl ToString) -> Self {
        Error::Protocol {
            addr: addr.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn unexpected(addr: impl ToString, reply: impl ToString) -> Self {
        Error::UnexpectedReply {
            addr: addr.to_string(),
            reply: reply.to_string(),
        }
    }
}

// Implement From for common error types
impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}
