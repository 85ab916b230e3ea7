use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use super::ProtocolType;

/// Route advertised by the routing daemon, either pushed live
/// or drained from a route-sync cursor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteAdvertisement {
    pub protocol: ProtocolType,
    pub rd: String,
    pub prefix: String,
    pub prefix_len: u8,
    pub next_hop: String,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub l3_label: u32,
    #[serde(default)]
    pub l2_label: u32,
    #[serde(default)]
    pub router_mac: Option<String>,
}

impl RouteAdvertisement {
    pub fn new(protocol: ProtocolType, rd: &str, prefix: IpNetwork, next_hop: IpAddr) -> Self {
        Self {
            protocol,
            rd: rd.to_owned(),
            prefix: prefix.ip().to_string(),
            prefix_len: prefix.prefix(),
            next_hop: next_hop.to_string(),
            mac: None,
            l3_label: 0,
            l2_label: 0,
            router_mac: None,
        }
    }

    pub fn with_label(mut self, label: u32) -> Self {
        self.l3_label = label;
        self
    }

    pub fn with_mac(mut self, mac: &str, l2_label: u32) -> Self {
        self.mac = Some(mac.to_owned());
        self.l2_label = l2_label;
        self
    }
}

/// Route withdrawn by the routing daemon. Without a next hop,
/// every path for the prefix is withdrawn
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteWithdrawal {
    pub protocol: ProtocolType,
    pub rd: String,
    pub prefix: String,
    pub prefix_len: u8,
    #[serde(default)]
    pub next_hop: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
}

impl RouteWithdrawal {
    pub fn new(protocol: ProtocolType, rd: &str, prefix: IpNetwork, next_hop: Option<IpAddr>) -> Self {
        Self {
            protocol,
            rd: rd.to_owned(),
            prefix: prefix.ip().to_string(),
            prefix_len: prefix.prefix(),
            next_hop: next_hop.map(|nh| nh.to_string()),
            mac: None,
        }
    }

    pub fn with_mac(mut self, mac: &str) -> Self {
        self.mac = Some(mac.to_owned());
        self
    }
}
