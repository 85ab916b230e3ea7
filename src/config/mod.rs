mod bgp;
mod file;
mod writer;

pub use bgp::{
    AsConfig, BfdConfig, BgpConfig, GracefulRestartConfig, LoggingConfig, NetworkConfig,
    PeerConfig, VrfConfig,
};
pub use writer::{ConfigTreeWriter, FileConfigWriter, WriteBehindQueue};

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read config: {0}")]
    Io(#[from] io::Error),
    #[error("Unable to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
    #[error("Config event at '{path}' has no {expected} value")]
    Mismatch { path: String, expected: String },
    #[error("No neighbor {0} configured")]
    UnknownPeer(IpAddr),
    #[error("No VRF with rd {0} configured")]
    UnknownVrf(String),
}

/// Parse a TOML config file and return a ServerConfig
pub fn from_file(path: &str) -> Result<ServerConfig, ConfigError> {
    let spec = file::ServerConfigSpec::from_file(path)?;
    ServerConfig::from_spec(spec)
}

/// Reconciler tunables, fixed for the lifetime of the process
#[derive(Clone, Debug)]
pub struct Settings {
    pub daemon_host: String,
    pub daemon_port: u16,
    pub rpc_timeout: Duration,
    pub retry_attempts: u32,
    pub grace_interval: Duration,
    pub default_stalepath_secs: u64,
    pub cleanup_batch_size: usize,
    pub history_capacity: usize,
    pub replay_results_capacity: usize,
    pub standalone_owner: bool,
    pub update_listen: SocketAddr,
    pub inspect_listen: SocketAddr,
    pub status_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_spec(file::ServerConfigSpec::default())
    }
}

impl Settings {
    fn from_spec(spec: file::ServerConfigSpec) -> Self {
        Self {
            daemon_host: spec.daemon.host,
            daemon_port: spec.daemon.port,
            rpc_timeout: Duration::from_millis(spec.daemon.rpc_timeout_ms),
            retry_attempts: spec.reconcile.retry_attempts,
            grace_interval: Duration::from_millis(spec.reconcile.grace_interval_ms),
            default_stalepath_secs: spec.reconcile.default_stalepath_secs,
            cleanup_batch_size: spec.reconcile.cleanup_batch_size,
            history_capacity: spec.reconcile.history_capacity,
            replay_results_capacity: spec.reconcile.replay_results_capacity,
            standalone_owner: spec.reconcile.standalone_owner,
            update_listen: spec.api.update_listen,
            inspect_listen: spec.api.inspect_listen,
            status_path: spec.api.status_path,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "reconcile.retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.cleanup_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "reconcile.cleanup_batch_size must be at least 1".to_string(),
            ));
        }
        if self.history_capacity == 0 || self.replay_results_capacity == 0 {
            return Err(ConfigError::Invalid(
                "reconcile history capacities must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct ServerConfig {
    pub settings: Settings,
    pub bgp: BgpConfig,
}

impl ServerConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        from_file(path)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Self::from_spec(file::ServerConfigSpec::from_toml(contents)?)
    }

    fn from_spec(mut spec: file::ServerConfigSpec) -> Result<Self, ConfigError> {
        let bgp_spec = std::mem::take(&mut spec.bgp);
        let settings = Settings::from_spec(spec);
        settings.validate()?;

        let bgp = BgpConfig {
            as_config: bgp_spec.as_config,
            graceful_restart: bgp_spec.graceful_restart,
            bfd: bgp_spec.bfd,
            logging: bgp_spec.logging,
            peers: bgp_spec
                .peers
                .into_iter()
                .map(|p| (p.address, p))
                .collect(),
            vrfs: bgp_spec
                .vrfs
                .into_iter()
                .map(|v| (v.rd.clone(), v))
                .collect(),
            networks: bgp_spec
                .networks
                .into_iter()
                .map(|n| ((n.rd.clone(), n.prefix), n))
                .collect(),
            multipath: bgp_spec.multipath,
        };
        for network in bgp.networks.values() {
            if !bgp.vrfs.contains_key(&network.rd) {
                return Err(ConfigError::UnknownVrf(network.rd.clone()));
            }
        }
        Ok(Self { settings, bgp })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_from_file() {
        let config = ServerConfig::from_file("./conf/reconciler.toml").unwrap();
        assert_eq!(config.settings.rpc_timeout, Duration::from_secs(2));
        assert_eq!(config.settings.grace_interval, Duration::from_secs(1));
        assert_eq!(config.bgp.peers.len(), 2);
        assert!(config.bgp.is_l2_vrf("100:2"));
        assert_eq!(config.bgp.vrfs["100:1"].max_paths, Some(4));
        assert_eq!(config.bgp.networks.len(), 1);
        // Neither stalepath time exceeds the default window
        assert_eq!(config.bgp.stalepath_secs(600), 600);
        assert_eq!(config.bgp.stalepath_secs(60), 360);
    }

    #[test]
    fn test_rejects_zero_retries() {
        let err = ServerConfig::from_toml("[reconcile]\nretry_attempts = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_network_without_vrf() {
        let toml = r#"
            [[bgp.networks]]
            rd = "100:9"
            prefix = "10.9.0.0/16"
            next_hop = "10.0.0.1"
        "#;
        let err = ServerConfig::from_toml(toml).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownVrf(rd) if rd == "100:9"));
    }
}
