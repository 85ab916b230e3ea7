use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::net::SocketAddr;

use serde::{self, Deserialize};

use super::bgp::{
    AsConfig, BfdConfig, GracefulRestartConfig, LoggingConfig, NetworkConfig, PeerConfig,
    VrfConfig,
};
use super::ConfigError;
use crate::models::AddressFamily;

struct Defaults {}

impl Defaults {
    fn daemon_host() -> String {
        "127.0.0.1".to_string()
    }

    fn daemon_port() -> u16 {
        7644
    }

    fn rpc_timeout_ms() -> u64 {
        2000
    }

    fn retry_attempts() -> u32 {
        3
    }

    fn grace_interval_ms() -> u64 {
        1000
    }

    fn default_stalepath_secs() -> u64 {
        600
    }

    fn cleanup_batch_size() -> usize {
        500
    }

    fn history_capacity() -> usize {
        1000
    }

    fn replay_results_capacity() -> usize {
        16
    }

    fn standalone_owner() -> bool {
        true
    }

    fn update_listen() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 7645))
    }

    fn inspect_listen() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 8080))
    }
}

/// Where the routing daemon's configuration RPC service listens
#[derive(Clone, Debug, Deserialize)]
pub(super) struct DaemonSpec {
    #[serde(default = "Defaults::daemon_host")]
    pub(super) host: String,
    #[serde(default = "Defaults::daemon_port")]
    pub(super) port: u16,
    // Per-call deadline, a call exceeding it counts as a failed attempt
    #[serde(default = "Defaults::rpc_timeout_ms")]
    pub(super) rpc_timeout_ms: u64,
}

impl Default for DaemonSpec {
    fn default() -> Self {
        Self {
            host: Defaults::daemon_host(),
            port: Defaults::daemon_port(),
            rpc_timeout_ms: Defaults::rpc_timeout_ms(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub(super) struct ReconcileSpec {
    // Attempts per replay category (one neighbor, start-session, end-of-rib, ...)
    #[serde(default = "Defaults::retry_attempts")]
    pub(super) retry_attempts: u32,
    // Pause after superseding a running replay, lets in-flight daemon calls unwind
    #[serde(default = "Defaults::grace_interval_ms")]
    pub(super) grace_interval_ms: u64,
    #[serde(default = "Defaults::default_stalepath_secs")]
    pub(super) default_stalepath_secs: u64,
    // Stale routes deleted between cancellation checks
    #[serde(default = "Defaults::cleanup_batch_size")]
    pub(super) cleanup_batch_size: usize,
    #[serde(default = "Defaults::history_capacity")]
    pub(super) history_capacity: usize,
    #[serde(default = "Defaults::replay_results_capacity")]
    pub(super) replay_results_capacity: usize,
    // Single-instance deployments own the daemon session unconditionally
    #[serde(default = "Defaults::standalone_owner")]
    pub(super) standalone_owner: bool,
}

impl Default for ReconcileSpec {
    fn default() -> Self {
        Self {
            retry_attempts: Defaults::retry_attempts(),
            grace_interval_ms: Defaults::grace_interval_ms(),
            default_stalepath_secs: Defaults::default_stalepath_secs(),
            cleanup_batch_size: Defaults::cleanup_batch_size(),
            history_capacity: Defaults::history_capacity(),
            replay_results_capacity: Defaults::replay_results_capacity(),
            standalone_owner: Defaults::standalone_owner(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub(super) struct ApiSpec {
    // Inbound route updates pushed by the daemon (leader only)
    #[serde(default = "Defaults::update_listen")]
    pub(super) update_listen: SocketAddr,
    // Operational inspection (replay results, history, stale routes)
    #[serde(default = "Defaults::inspect_listen")]
    pub(super) inspect_listen: SocketAddr,
    // Replay status written behind to this JSON file when set
    pub(super) status_path: Option<String>,
}

impl Default for ApiSpec {
    fn default() -> Self {
        Self {
            update_listen: Defaults::update_listen(),
            inspect_listen: Defaults::inspect_listen(),
            status_path: None,
        }
    }
}

/// Config (toml) representation of the initial configuration tree
#[derive(Clone, Debug, Default, Deserialize)]
pub(super) struct BgpSpec {
    pub(super) as_config: Option<AsConfig>,
    pub(super) graceful_restart: Option<GracefulRestartConfig>,
    pub(super) bfd: Option<BfdConfig>,
    pub(super) logging: Option<LoggingConfig>,
    #[serde(default = "Vec::new")]
    pub(super) peers: Vec<PeerConfig>,
    #[serde(default = "Vec::new")]
    pub(super) vrfs: Vec<VrfConfig>,
    #[serde(default = "Vec::new")]
    pub(super) networks: Vec<NetworkConfig>,
    #[serde(default = "BTreeMap::new")]
    pub(super) multipath: BTreeMap<AddressFamily, bool>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ServerConfigSpec {
    #[serde(default)]
    pub(super) daemon: DaemonSpec,
    #[serde(default)]
    pub(super) reconcile: ReconcileSpec,
    #[serde(default)]
    pub(super) api: ApiSpec,
    #[serde(default)]
    pub(super) bgp: BgpSpec,
}

impl ServerConfigSpec {
    pub(super) fn from_file(path: &str) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_toml(&contents)
    }

    pub(super) fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_parse_config() {
        let config = ServerConfigSpec::from_file("./conf/reconciler.toml").unwrap();
        assert_eq!(config.daemon.port, 7644);
        assert_eq!(config.reconcile.retry_attempts, 3);
        let as_config = config.bgp.as_config.unwrap();
        assert_eq!(as_config.asn, 65000);
        assert_eq!(as_config.router_id, IpAddr::from(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(config.bgp.peers.len(), 2);
        let v4_peer = config
            .bgp
            .peers
            .iter()
            .find(|p| p.address == IpAddr::from(Ipv4Addr::new(10, 0, 0, 2)))
            .unwrap();
        assert_eq!(v4_peer.multihop, Some(2));
        assert_eq!(
            v4_peer.families,
            vec![AddressFamily::Vpnv4, AddressFamily::L2vpnEvpn]
        );
        assert_eq!(config.bgp.vrfs.len(), 2);
        assert_eq!(config.bgp.multipath.get(&AddressFamily::Vpnv4), Some(&true));
    }

    #[test]
    fn test_empty_config_defaults() {
        let config = ServerConfigSpec::from_toml("").unwrap();
        assert_eq!(config.daemon.host, "127.0.0.1");
        assert_eq!(config.daemon.rpc_timeout_ms, 2000);
        assert_eq!(config.reconcile.default_stalepath_secs, 600);
        assert!(config.reconcile.standalone_owner);
        assert_eq!(config.api.inspect_listen.port(), 8080);
        assert!(config.bgp.as_config.is_none());
        assert!(config.bgp.peers.is_empty());
    }

    #[test]
    fn test_invalid_family() {
        let toml = r#"
            [[bgp.peers]]
            address = "10.0.0.2"
            remote_as = 65001
            families = ["ipv4 flow"]
        "#;
        assert!(ServerConfigSpec::from_toml(toml).is_err());
    }
}
