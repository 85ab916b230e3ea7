use std::fmt;
use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncapType {
    MplsGre,
    Vxlan,
}

impl fmt::Display for EncapType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EncapType::MplsGre => write!(f, "MPLS-GRE"),
            EncapType::Vxlan => write!(f, "VXLAN"),
        }
    }
}

/// Who put a route into the forwarding database
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteOrigin {
    Bgp,
    Local,
    Other,
}

impl fmt::Display for RouteOrigin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let display = match self {
            RouteOrigin::Bgp => "BGP",
            RouteOrigin::Local => "Local",
            RouteOrigin::Other => "Other",
        };
        write!(f, "{}", display)
    }
}

/// A prefix and one of its next hops, unique within a route distinguisher.
/// Displays as `prefix/len:nextHop`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrefixNextHop {
    pub prefix: IpNetwork,
    pub next_hop: IpAddr,
}

impl PrefixNextHop {
    pub fn new(prefix: IpNetwork, next_hop: IpAddr) -> Self {
        Self { prefix, next_hop }
    }
}

impl fmt::Display for PrefixNextHop {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.next_hop)
    }
}

/// Identifies one advertised route within one VRF
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteKey {
    rd: String,
    path: PrefixNextHop,
}

impl RouteKey {
    pub fn new(rd: &str, prefix: IpNetwork, next_hop: IpAddr) -> Self {
        Self {
            rd: rd.to_owned(),
            path: PrefixNextHop::new(prefix, next_hop),
        }
    }

    pub fn rd(&self) -> &str {
        &self.rd
    }

    pub fn prefix(&self) -> IpNetwork {
        self.path.prefix
    }

    pub fn next_hop(&self) -> IpAddr {
        self.path.next_hop
    }

    pub fn path(&self) -> PrefixNextHop {
        self.path
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] {}", self.rd, self.path)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub key: RouteKey,
    pub label: u32,
    pub l2vni: u32,
    pub l3vni: u32,
    pub mac: Option<String>,
    pub router_mac: Option<String>,
    pub encap: EncapType,
    pub origin: RouteOrigin,
}

impl RouteRecord {
    /// A BGP-learned route with only a label (L3VPN over MPLS)
    pub fn bgp(key: RouteKey, label: u32) -> Self {
        Self {
            key,
            label,
            l2vni: 0,
            l3vni: 0,
            mac: None,
            router_mac: None,
            encap: EncapType::MplsGre,
            origin: RouteOrigin::Bgp,
        }
    }
}

impl fmt::Display for RouteRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<Route {} label={} encap={} origin={}>",
            self.key, self.label, self.encap, self.origin
        )
    }
}

/// MAC entry learned through EVPN, reachable behind a tunnel endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacRoute {
    pub rd: String,
    pub mac: String,
    pub tunnel_endpoint: IpAddr,
    pub l2vni: u32,
    pub l3vni: u32,
    pub router_mac: Option<String>,
    pub origin: RouteOrigin,
}
