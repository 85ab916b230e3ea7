use std::collections::BTreeMap;
use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::models::{AddressFamily, VrfLayer};

struct Defaults {}

impl Defaults {
    fn keepalive() -> u16 {
        60
    }

    fn hold_time() -> u16 {
        180
    }

    fn enabled() -> bool {
        true
    }

    fn detect_multiplier() -> u8 {
        3
    }

    fn bfd_interval_ms() -> u32 {
        500
    }

    fn log_file() -> String {
        "/var/log/bgp_debug.log".to_string()
    }

    fn log_level() -> String {
        "errors".to_string()
    }
}

/// Local AS and router identity used to start the daemon's BGP instance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsConfig {
    pub asn: u32,
    pub router_id: IpAddr,
    #[serde(default = "Defaults::keepalive")]
    pub keepalive: u16,
    #[serde(default = "Defaults::hold_time")]
    pub hold_time: u16,
    // Seconds, 0 defers to graceful-restart or the reconciler default
    #[serde(default)]
    pub stalepath_time: u32,
    #[serde(default)]
    pub advertise_fbit: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GracefulRestartConfig {
    pub stalepath_time: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BfdConfig {
    #[serde(default = "Defaults::enabled")]
    pub enabled: bool,
    #[serde(default = "Defaults::detect_multiplier")]
    pub detect_multiplier: u8,
    #[serde(default = "Defaults::bfd_interval_ms")]
    pub min_rx_ms: u32,
    #[serde(default = "Defaults::bfd_interval_ms")]
    pub min_tx_ms: u32,
    #[serde(default)]
    pub multihop: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "Defaults::log_file")]
    pub file: String,
    #[serde(default = "Defaults::log_level")]
    pub level: String,
}

/// BGP neighbor as configured locally
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    pub address: IpAddr,
    pub remote_as: u32,
    #[serde(default)]
    pub update_source: Option<IpAddr>,
    // eBGP multihop TTL
    #[serde(default)]
    pub multihop: Option<u8>,
    #[serde(default = "Vec::new")]
    pub families: Vec<AddressFamily>,
}

impl PeerConfig {
    pub fn new(address: IpAddr, remote_as: u32) -> Self {
        Self {
            address,
            remote_as,
            update_source: None,
            multihop: None,
            families: vec![],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrfConfig {
    pub rd: String,
    #[serde(default = "Vec::new")]
    pub import_rts: Vec<String>,
    #[serde(default = "Vec::new")]
    pub export_rts: Vec<String>,
    #[serde(default = "Vec::new")]
    pub families: Vec<AddressFamily>,
    #[serde(default)]
    pub layer: VrfLayer,
    #[serde(default)]
    pub max_paths: Option<u32>,
}

impl VrfConfig {
    pub fn new(rd: &str, families: Vec<AddressFamily>) -> Self {
        Self {
            rd: rd.to_owned(),
            import_rts: vec![],
            export_rts: vec![],
            families,
            layer: VrfLayer::L3,
            max_paths: None,
        }
    }

    pub fn is_l2(&self) -> bool {
        self.layer == VrfLayer::L2
    }
}

/// Static network advertised into a VRF
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub rd: String,
    pub prefix: IpNetwork,
    pub next_hop: IpAddr,
    #[serde(default)]
    pub label: u32,
}

/// In-memory snapshot of the BGP configuration tree. The reconciler only
/// reads it to drive replay; handlers in `events` keep it current
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BgpConfig {
    pub as_config: Option<AsConfig>,
    pub graceful_restart: Option<GracefulRestartConfig>,
    pub bfd: Option<BfdConfig>,
    pub logging: Option<LoggingConfig>,
    pub peers: BTreeMap<IpAddr, PeerConfig>,
    pub vrfs: BTreeMap<String, VrfConfig>,
    pub networks: BTreeMap<(String, IpNetwork), NetworkConfig>,
    pub multipath: BTreeMap<AddressFamily, bool>,
}

impl BgpConfig {
    pub fn is_l2_vrf(&self, rd: &str) -> bool {
        self.vrfs.get(rd).map(VrfConfig::is_l2).unwrap_or(false)
    }

    /// Stale routes are held for the longest of the graceful-restart
    /// stalepath time, the AS stalepath time and `default_secs`
    pub fn stalepath_secs(&self, default_secs: u64) -> u64 {
        let graceful = self
            .graceful_restart
            .as_ref()
            .map_or(0, |gr| u64::from(gr.stalepath_time));
        let as_level = self
            .as_config
            .as_ref()
            .map_or(0, |asc| u64::from(asc.stalepath_time));
        graceful.max(as_level).max(default_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn as_config(stalepath_time: u32) -> AsConfig {
        AsConfig {
            asn: 65000,
            router_id: IpAddr::from(Ipv4Addr::new(1, 1, 1, 1)),
            keepalive: 60,
            hold_time: 180,
            stalepath_time,
            advertise_fbit: false,
        }
    }

    #[test]
    fn test_stalepath_is_longest_window() {
        let mut config = BgpConfig::default();
        assert_eq!(config.stalepath_secs(600), 600);

        config.graceful_restart = Some(GracefulRestartConfig { stalepath_time: 90 });
        assert_eq!(config.stalepath_secs(600), 600);

        config.as_config = Some(as_config(0));
        assert_eq!(config.stalepath_secs(600), 600);

        config.as_config = Some(as_config(900));
        assert_eq!(config.stalepath_secs(600), 900);

        config.graceful_restart = Some(GracefulRestartConfig { stalepath_time: 1200 });
        assert_eq!(config.stalepath_secs(600), 1200);
        assert_eq!(config.stalepath_secs(30), 1200);
    }

    #[test]
    fn test_l2_vrf_lookup() {
        let mut config = BgpConfig::default();
        let mut vrf = VrfConfig::new("100:2", vec![AddressFamily::L2vpnEvpn]);
        vrf.layer = VrfLayer::L2;
        config.vrfs.insert(vrf.rd.clone(), vrf);
        config.vrfs.insert(
            "100:1".to_string(),
            VrfConfig::new("100:1", vec![AddressFamily::Vpnv4]),
        );
        assert!(config.is_l2_vrf("100:2"));
        assert!(!config.is_l2_vrf("100:1"));
        assert!(!config.is_l2_vrf("100:9"));
    }
}
