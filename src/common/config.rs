//! Configuration for podmanager
//!
//! Values are layered: built-in defaults, then an optional TOML file
//! (`podmanager.toml` in the working directory, or an explicit path), then
//! `PODMANAGER_*` environment variables. Nested keys use a double underscore,
//! e.g. `PODMANAGER_FANOUT__CONCURRENT=false`.

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sentinel configuration file used as the pod registry
    pub sentinel_config_file: PathBuf,

    /// Logging level (overridden by RUST_LOG)
    pub log_level: String,

    /// TCP connect timeout for every node session
    pub connect_timeout_ms: u64,

    /// Timeout for a single request/response exchange
    pub command_timeout_ms: u64,

    /// Check each primary parameter write during credential rotation
    pub verify_primary_write: bool,

    /// Append audit entries to this file (JSON lines)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_log: Option<PathBuf>,

    pub fanout: FanoutConfig,

    pub topology: TopologyConfig,
}

/// How a fan-out visits its targets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Run all-must-succeed fan-outs concurrently (failover is always sequential)
    pub concurrent: bool,

    /// Deadline for one target, on top of the connector timeouts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_timeout_ms: Option<u64>,
}

/// Entanglement walk settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Number of hops expanded from the target pod
    pub depth: usize,

    /// Ignore `depth` and expand to a fixed point
    pub full_closure: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sentinel_config_file: PathBuf::from("/etc/redis/sentinel.conf"),
            log_level: "info".to_string(),
            connect_timeout_ms: 2_000,
            command_timeout_ms: 5_000,
            verify_primary_write: false,
            audit_log: None,
            fanout: FanoutConfig::default(),
            topology: TopologyConfig::default(),
        }
    }
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            concurrent: true,
            target_timeout_ms: None,
        }
    }
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            depth: 2,
            full_closure: false,
        }
    }
}

impl Config {
    /// Load configuration from defaults, file and environment.
    ///
    /// With `path == None` a `podmanager.toml` in the working directory is
    /// used when present; an explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name("podmanager").required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("PODMANAGER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_ms == 0 || self.command_timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeouts must be non-zero".into()));
        }
        if self.fanout.target_timeout_ms == Some(0) {
            return Err(Error::InvalidConfig(
                "fanout.target_timeout_ms must be non-zero".into(),
            ));
        }
        if self.topology.depth == 0 && !self.topology.full_closure {
            return Err(Error::InvalidConfig(
                "topology.depth must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl FanoutConfig {
    pub fn target_timeout(&self) -> Option<Duration> {
        self.target_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.topology.depth, 2);
        assert!(!config.verify_primary_write);
        assert_eq!(config.connect_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
sentinel_config_file = "/tmp/sentinel.conf"
verify_primary_write = true

[fanout]
concurrent = false
target_timeout_ms = 750

[topology]
full_closure = true
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(
            config.sentinel_config_file,
            PathBuf::from("/tmp/sentinel.conf")
        );
        assert!(config.verify_primary_write);
        assert!(!config.fanout.concurrent);
        assert_eq!(
            config.fanout.target_timeout(),
            Some(Duration::from_millis(750))
        );
        assert!(config.topology.full_closure);
        // untouched keys keep their defaults
        assert_eq!(config.command_timeout_ms, 5_000);
        assert_eq!(config.topology.depth, 2);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = Config::default();
        config.command_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.topology.depth = 0;
        assert!(config.validate().is_err());
        config.topology.full_closure = true;
        assert!(config.validate().is_ok());
    }
}
