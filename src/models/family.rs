use std::fmt;
use std::str::FromStr;

use serde::{self, Deserialize, Deserializer, Serialize, Serializer};

/// AFI/SAFI combinations the routing daemon is configured with
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum AddressFamily {
    Ipv4Unicast,
    Ipv6Unicast,
    Vpnv4,
    Vpnv6,
    L2vpnEvpn,
}

impl AddressFamily {
    /// Families pulled explicitly from the daemon when it was already running
    /// at replay time (it will not resend its RIB on its own)
    pub const RESYNC: [AddressFamily; 3] = [
        AddressFamily::Vpnv4,
        AddressFamily::Vpnv6,
        AddressFamily::L2vpnEvpn,
    ];

    pub fn afi(self) -> u16 {
        use AddressFamily::*;
        match self {
            Ipv4Unicast | Vpnv4 => 1,
            Ipv6Unicast | Vpnv6 => 2,
            L2vpnEvpn => 25,
        }
    }

    pub fn safi(self) -> u8 {
        use AddressFamily::*;
        match self {
            Ipv4Unicast | Ipv6Unicast => 1,
            Vpnv4 | Vpnv6 => 128,
            L2vpnEvpn => 70,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use AddressFamily::*;
        let display = match self {
            Ipv4Unicast => "IPv4 Unicast",
            Ipv6Unicast => "IPv6 Unicast",
            Vpnv4 => "VPNv4",
            Vpnv6 => "VPNv6",
            L2vpnEvpn => "L2VPN EVPN",
        };
        write!(f, "{}", display)
    }
}

impl FromStr for AddressFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_lowercase().as_str() {
            "ipv4 unicast" | "ipv4" => Ok(AddressFamily::Ipv4Unicast),
            "ipv6 unicast" | "ipv6" => Ok(AddressFamily::Ipv6Unicast),
            "vpnv4" | "ipv4 vpn" => Ok(AddressFamily::Vpnv4),
            "vpnv6" | "ipv6 vpn" => Ok(AddressFamily::Vpnv6),
            "l2vpn evpn" | "evpn" => Ok(AddressFamily::L2vpnEvpn),
            _ => Err(format!("Unsupported address family: '{}'", s)),
        }
    }
}

impl Serialize for AddressFamily {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AddressFamily {
    fn deserialize<D>(deserializer: D) -> Result<AddressFamily, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Protocol an inbound route update was carried in
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolType {
    Ipv4,
    Ipv6,
    L3vpn,
    Lu,
    Evpn,
}

impl fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ProtocolType::*;
        let display = match self {
            Ipv4 => "IPv4",
            Ipv6 => "IPv6",
            L3vpn => "L3VPN",
            Lu => "LU",
            Evpn => "EVPN",
        };
        write!(f, "{}", display)
    }
}

/// Whether a VRF switches (L2, MAC/tunnel-endpoint routes) or routes (L3)
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VrfLayer {
    L2,
    L3,
}

impl Default for VrfLayer {
    fn default() -> Self {
        VrfLayer::L3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::value::{Error, StrDeserializer};
    use serde::de::IntoDeserializer;

    #[test]
    fn test_serialize_family() {
        assert_eq!(&AddressFamily::Ipv4Unicast.to_string(), "IPv4 Unicast");
        assert_eq!(&AddressFamily::L2vpnEvpn.to_string(), "L2VPN EVPN");
        assert_eq!(
            serde_json::to_string(&AddressFamily::Vpnv6).unwrap(),
            "\"VPNv6\""
        );
    }

    #[test]
    fn test_deserialize_family() {
        let deserializer: StrDeserializer<Error> = "ipv6 unicast".into_deserializer();
        let family = AddressFamily::deserialize(deserializer).unwrap();
        assert_eq!(family, AddressFamily::Ipv6Unicast);

        let deserializer: StrDeserializer<Error> = "L2VPN  EVPN".into_deserializer();
        let family = AddressFamily::deserialize(deserializer).unwrap();
        assert_eq!(family, AddressFamily::L2vpnEvpn);

        let deserializer: StrDeserializer<Error> = "ipv4 flow".into_deserializer();
        assert!(AddressFamily::deserialize(deserializer).is_err());
    }

    #[test]
    fn test_afi_safi() {
        assert_eq!(
            (AddressFamily::Vpnv4.afi(), AddressFamily::Vpnv4.safi()),
            (1, 128)
        );
        assert_eq!(
            (AddressFamily::L2vpnEvpn.afi(), AddressFamily::L2vpnEvpn.safi()),
            (25, 70)
        );
    }
}
