//! Configuration-tree change events and the handlers that apply them.
//!
//! Each handler updates the in-memory snapshot and returns the daemon
//! commands that mirror the change onto a connected daemon.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

use ipnetwork::IpNetwork;

use crate::config::{
    AsConfig, BfdConfig, BgpConfig, ConfigError, GracefulRestartConfig, LoggingConfig,
    NetworkConfig, PeerConfig, VrfConfig,
};
use crate::daemon::{DaemonResult, RoutingDaemonClient, SessionParams};
use crate::models::AddressFamily;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigKind {
    AsConfig,
    GracefulRestart,
    Bfd,
    Logging,
    Neighbor,
    UpdateSource,
    Multihop,
    AddressFamily,
    Vrf,
    Network,
    Multipath,
    MaxPaths,
}

impl ConfigKind {
    pub const ALL: [ConfigKind; 12] = [
        ConfigKind::AsConfig,
        ConfigKind::GracefulRestart,
        ConfigKind::Bfd,
        ConfigKind::Logging,
        ConfigKind::Neighbor,
        ConfigKind::UpdateSource,
        ConfigKind::Multihop,
        ConfigKind::AddressFamily,
        ConfigKind::Vrf,
        ConfigKind::Network,
        ConfigKind::Multipath,
        ConfigKind::MaxPaths,
    ];
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConfigValue {
    As(AsConfig),
    GracefulRestart(GracefulRestartConfig),
    Bfd(BfdConfig),
    Logging(LoggingConfig),
    Neighbor(PeerConfig),
    UpdateSource { peer: IpAddr, source: IpAddr },
    Multihop { peer: IpAddr, ttl: u8 },
    AddressFamily { peer: IpAddr, family: AddressFamily },
    Vrf(VrfConfig),
    Network(NetworkConfig),
    Multipath { family: AddressFamily, enabled: bool },
    MaxPaths { rd: String, max_paths: u32 },
}

/// One add, update or remove in the configuration tree
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigEvent {
    pub kind: ConfigKind,
    pub path: String,
    pub old: Option<ConfigValue>,
    pub new: Option<ConfigValue>,
}

impl ConfigEvent {
    pub fn added(kind: ConfigKind, path: &str, value: ConfigValue) -> Self {
        Self {
            kind,
            path: path.to_owned(),
            old: None,
            new: Some(value),
        }
    }

    pub fn updated(kind: ConfigKind, path: &str, old: ConfigValue, new: ConfigValue) -> Self {
        Self {
            kind,
            path: path.to_owned(),
            old: Some(old),
            new: Some(new),
        }
    }

    pub fn removed(kind: ConfigKind, path: &str, old: ConfigValue) -> Self {
        Self {
            kind,
            path: path.to_owned(),
            old: Some(old),
            new: None,
        }
    }

    fn mismatch(&self, expected: &str) -> ConfigError {
        ConfigError::Mismatch {
            path: self.path.clone(),
            expected: expected.to_owned(),
        }
    }
}

/// A single call that mirrors a configuration change onto the daemon
#[derive(Clone, Debug, PartialEq)]
pub enum DaemonCommand {
    StartSession(SessionParams),
    StopSession(u32),
    AddGracefulRestart(u32),
    DelGracefulRestart,
    AddBfd(BfdConfig),
    DelBfd,
    SetLogging(LoggingConfig),
    AddNeighbor { address: IpAddr, remote_as: u32 },
    DelNeighbor(IpAddr),
    AddUpdateSource { address: IpAddr, source: IpAddr },
    DelUpdateSource(IpAddr),
    AddMultihop { address: IpAddr, ttl: u8 },
    DelMultihop(IpAddr),
    AddAddressFamily { address: IpAddr, family: AddressFamily },
    DelAddressFamily { address: IpAddr, family: AddressFamily },
    AddVrf { vrf: VrfConfig, family: AddressFamily },
    DelVrf { rd: String, family: AddressFamily },
    AddPrefix(NetworkConfig),
    DelPrefix { rd: String, prefix: IpNetwork },
    EnableMultipath(AddressFamily),
    DisableMultipath(AddressFamily),
    SetMaxPaths { rd: String, max_paths: u32 },
}

impl DaemonCommand {
    /// "already active" and "peer exists" confirm the desired state
    pub async fn execute(&self, daemon: &dyn RoutingDaemonClient) -> DaemonResult<()> {
        use DaemonCommand::*;
        let result = match self {
            StartSession(params) => daemon.start_session(params).await,
            StopSession(asn) => daemon.stop_session(*asn).await,
            AddGracefulRestart(stalepath) => daemon.add_graceful_restart(*stalepath).await,
            DelGracefulRestart => daemon.del_graceful_restart().await,
            AddBfd(bfd) => daemon.add_bfd(bfd).await,
            DelBfd => daemon.del_bfd().await,
            SetLogging(logging) => daemon.set_logging(logging).await,
            AddNeighbor { address, remote_as } => daemon.add_neighbor(*address, *remote_as).await,
            DelNeighbor(address) => daemon.del_neighbor(*address).await,
            AddUpdateSource { address, source } => {
                daemon.add_update_source(*address, *source).await
            }
            DelUpdateSource(address) => daemon.del_update_source(*address).await,
            AddMultihop { address, ttl } => daemon.add_multihop(*address, *ttl).await,
            DelMultihop(address) => daemon.del_multihop(*address).await,
            AddAddressFamily { address, family } => {
                daemon.add_address_family(*address, *family).await
            }
            DelAddressFamily { address, family } => {
                daemon.del_address_family(*address, *family).await
            }
            AddVrf { vrf, family } => daemon.add_vrf(vrf, *family).await,
            DelVrf { rd, family } => daemon.del_vrf(rd, *family).await,
            AddPrefix(network) => daemon.add_prefix(network).await,
            DelPrefix { rd, prefix } => daemon.del_prefix(rd, *prefix).await,
            EnableMultipath(family) => daemon.enable_multipath(*family).await,
            DisableMultipath(family) => daemon.disable_multipath(*family).await,
            SetMaxPaths { rd, max_paths } => daemon.set_max_paths(rd, *max_paths).await,
        };
        match result {
            Err(err) if err.is_already_active() || err.is_peer_exists() => Ok(()),
            other => other,
        }
    }
}

impl fmt::Display for DaemonCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use DaemonCommand::*;
        match self {
            StartSession(params) => write!(f, "start-session AS{}", params.asn),
            StopSession(asn) => write!(f, "stop-session AS{}", asn),
            AddGracefulRestart(stalepath) => write!(f, "add-graceful-restart {}s", stalepath),
            DelGracefulRestart => write!(f, "del-graceful-restart"),
            AddBfd(_) => write!(f, "add-bfd"),
            DelBfd => write!(f, "del-bfd"),
            SetLogging(logging) => write!(f, "set-logging {}", logging.level),
            AddNeighbor { address, remote_as } => {
                write!(f, "add-neighbor {} AS{}", address, remote_as)
            }
            DelNeighbor(address) => write!(f, "del-neighbor {}", address),
            AddUpdateSource { address, source } => {
                write!(f, "add-update-source {} {}", address, source)
            }
            DelUpdateSource(address) => write!(f, "del-update-source {}", address),
            AddMultihop { address, ttl } => write!(f, "add-multihop {} ttl={}", address, ttl),
            DelMultihop(address) => write!(f, "del-multihop {}", address),
            AddAddressFamily { address, family } => {
                write!(f, "add-address-family {} {}", address, family)
            }
            DelAddressFamily { address, family } => {
                write!(f, "del-address-family {} {}", address, family)
            }
            AddVrf { vrf, family } => write!(f, "add-vrf {} {}", vrf.rd, family),
            DelVrf { rd, family } => write!(f, "del-vrf {} {}", rd, family),
            AddPrefix(network) => write!(f, "add-prefix [{}] {}", network.rd, network.prefix),
            DelPrefix { rd, prefix } => write!(f, "del-prefix [{}] {}", rd, prefix),
            EnableMultipath(family) => write!(f, "enable-multipath {}", family),
            DisableMultipath(family) => write!(f, "disable-multipath {}", family),
            SetMaxPaths { rd, max_paths } => write!(f, "set-max-paths {} {}", rd, max_paths),
        }
    }
}

pub type Commands = Result<Vec<DaemonCommand>, ConfigError>;

/// Applies one event to the snapshot, returning the commands to mirror it
pub type ConfigHandler = fn(&mut BgpConfig, &ConfigEvent) -> Commands;

/// Handler per configuration entity, built once at startup
pub fn handler_table() -> HashMap<ConfigKind, ConfigHandler> {
    let mut table: HashMap<ConfigKind, ConfigHandler> = HashMap::with_capacity(12);
    table.insert(ConfigKind::AsConfig, as_config);
    table.insert(ConfigKind::GracefulRestart, graceful_restart);
    table.insert(ConfigKind::Bfd, bfd);
    table.insert(ConfigKind::Logging, logging);
    table.insert(ConfigKind::Neighbor, neighbor);
    table.insert(ConfigKind::UpdateSource, update_source);
    table.insert(ConfigKind::Multihop, multihop);
    table.insert(ConfigKind::AddressFamily, address_family);
    table.insert(ConfigKind::Vrf, vrf);
    table.insert(ConfigKind::Network, network);
    table.insert(ConfigKind::Multipath, multipath);
    table.insert(ConfigKind::MaxPaths, max_paths);
    table
}

fn as_config(config: &mut BgpConfig, event: &ConfigEvent) -> Commands {
    let previous = config.as_config.take();
    let mut commands = vec![];
    match &event.new {
        Some(ConfigValue::As(new)) => {
            if let Some(previous) = previous {
                commands.push(DaemonCommand::StopSession(previous.asn));
            }
            commands.push(DaemonCommand::StartSession(SessionParams::from(new)));
            config.as_config = Some(new.clone());
        }
        Some(_) => {
            config.as_config = previous;
            return Err(event.mismatch("AS config"));
        }
        None => {
            // No AS means no BGP instance
            if let Some(previous) = previous {
                commands.push(DaemonCommand::StopSession(previous.asn));
            }
        }
    }
    Ok(commands)
}

fn graceful_restart(config: &mut BgpConfig, event: &ConfigEvent) -> Commands {
    match &event.new {
        Some(ConfigValue::GracefulRestart(gr)) => {
            config.graceful_restart = Some(gr.clone());
            Ok(vec![DaemonCommand::AddGracefulRestart(gr.stalepath_time)])
        }
        Some(_) => Err(event.mismatch("graceful-restart")),
        None => {
            config.graceful_restart = None;
            Ok(vec![DaemonCommand::DelGracefulRestart])
        }
    }
}

fn bfd(config: &mut BgpConfig, event: &ConfigEvent) -> Commands {
    match &event.new {
        Some(ConfigValue::Bfd(bfd)) => {
            config.bfd = Some(bfd.clone());
            if bfd.enabled {
                Ok(vec![DaemonCommand::AddBfd(bfd.clone())])
            } else {
                Ok(vec![DaemonCommand::DelBfd])
            }
        }
        Some(_) => Err(event.mismatch("BFD")),
        None => {
            config.bfd = None;
            Ok(vec![DaemonCommand::DelBfd])
        }
    }
}

fn logging(config: &mut BgpConfig, event: &ConfigEvent) -> Commands {
    match &event.new {
        Some(ConfigValue::Logging(logging)) => {
            config.logging = Some(logging.clone());
            Ok(vec![DaemonCommand::SetLogging(logging.clone())])
        }
        Some(_) => Err(event.mismatch("logging")),
        None => {
            // The daemon keeps its last logging settings
            config.logging = None;
            Ok(vec![])
        }
    }
}

fn add_neighbor_commands(peer: &PeerConfig) -> Vec<DaemonCommand> {
    let address = peer.address;
    let mut commands = vec![DaemonCommand::AddNeighbor {
        address,
        remote_as: peer.remote_as,
    }];
    if let Some(source) = peer.update_source {
        commands.push(DaemonCommand::AddUpdateSource { address, source });
    }
    if let Some(ttl) = peer.multihop {
        commands.push(DaemonCommand::AddMultihop { address, ttl });
    }
    commands.extend(
        peer.families
            .iter()
            .map(|family| DaemonCommand::AddAddressFamily {
                address,
                family: *family,
            }),
    );
    commands
}

fn neighbor(config: &mut BgpConfig, event: &ConfigEvent) -> Commands {
    match &event.new {
        Some(ConfigValue::Neighbor(new)) => {
            let previous = config.peers.insert(new.address, new.clone());
            let commands = match previous {
                Some(previous) if previous.remote_as == new.remote_as => {
                    neighbor_delta(&previous, new)
                }
                Some(previous) => {
                    let mut commands = vec![DaemonCommand::DelNeighbor(previous.address)];
                    commands.extend(add_neighbor_commands(new));
                    commands
                }
                None => add_neighbor_commands(new),
            };
            Ok(commands)
        }
        Some(_) => Err(event.mismatch("neighbor")),
        None => match &event.old {
            Some(ConfigValue::Neighbor(old)) => {
                config.peers.remove(&old.address);
                Ok(vec![DaemonCommand::DelNeighbor(old.address)])
            }
            _ => Err(event.mismatch("neighbor")),
        },
    }
}

// Same neighbor and AS, only sub-settings changed
fn neighbor_delta(old: &PeerConfig, new: &PeerConfig) -> Vec<DaemonCommand> {
    let address = new.address;
    let mut commands = vec![];
    if old.update_source != new.update_source {
        commands.push(match new.update_source {
            Some(source) => DaemonCommand::AddUpdateSource { address, source },
            None => DaemonCommand::DelUpdateSource(address),
        });
    }
    if old.multihop != new.multihop {
        commands.push(match new.multihop {
            Some(ttl) => DaemonCommand::AddMultihop { address, ttl },
            None => DaemonCommand::DelMultihop(address),
        });
    }
    for family in old.families.iter().filter(|f| !new.families.contains(f)) {
        commands.push(DaemonCommand::DelAddressFamily {
            address,
            family: *family,
        });
    }
    for family in new.families.iter().filter(|f| !old.families.contains(f)) {
        commands.push(DaemonCommand::AddAddressFamily {
            address,
            family: *family,
        });
    }
    commands
}

fn configured_peer<'a>(config: &'a mut BgpConfig, peer: IpAddr) -> Result<&'a mut PeerConfig, ConfigError> {
    config
        .peers
        .get_mut(&peer)
        .ok_or(ConfigError::UnknownPeer(peer))
}

fn update_source(config: &mut BgpConfig, event: &ConfigEvent) -> Commands {
    match (&event.old, &event.new) {
        (_, Some(ConfigValue::UpdateSource { peer, source })) => {
            configured_peer(config, *peer)?.update_source = Some(*source);
            Ok(vec![DaemonCommand::AddUpdateSource {
                address: *peer,
                source: *source,
            }])
        }
        (Some(ConfigValue::UpdateSource { peer, .. }), None) => {
            configured_peer(config, *peer)?.update_source = None;
            Ok(vec![DaemonCommand::DelUpdateSource(*peer)])
        }
        _ => Err(event.mismatch("update-source")),
    }
}

fn multihop(config: &mut BgpConfig, event: &ConfigEvent) -> Commands {
    match (&event.old, &event.new) {
        (_, Some(ConfigValue::Multihop { peer, ttl })) => {
            configured_peer(config, *peer)?.multihop = Some(*ttl);
            Ok(vec![DaemonCommand::AddMultihop {
                address: *peer,
                ttl: *ttl,
            }])
        }
        (Some(ConfigValue::Multihop { peer, .. }), None) => {
            configured_peer(config, *peer)?.multihop = None;
            Ok(vec![DaemonCommand::DelMultihop(*peer)])
        }
        _ => Err(event.mismatch("multihop")),
    }
}

fn address_family(config: &mut BgpConfig, event: &ConfigEvent) -> Commands {
    let mut commands = vec![];
    if let Some(ConfigValue::AddressFamily { peer, family }) = &event.old {
        configured_peer(config, *peer)?
            .families
            .retain(|f| f != family);
        commands.push(DaemonCommand::DelAddressFamily {
            address: *peer,
            family: *family,
        });
    }
    match &event.new {
        Some(ConfigValue::AddressFamily { peer, family }) => {
            let configured = configured_peer(config, *peer)?;
            if !configured.families.contains(family) {
                configured.families.push(*family);
            }
            commands.push(DaemonCommand::AddAddressFamily {
                address: *peer,
                family: *family,
            });
        }
        Some(_) => return Err(event.mismatch("address-family")),
        None if commands.is_empty() => return Err(event.mismatch("address-family")),
        None => (),
    }
    Ok(commands)
}

fn vrf(config: &mut BgpConfig, event: &ConfigEvent) -> Commands {
    match &event.new {
        Some(ConfigValue::Vrf(new)) => {
            let previous = config.vrfs.insert(new.rd.clone(), new.clone());
            let rd = new.rd.clone();
            let commands: Vec<DaemonCommand> = match previous {
                // Route targets only take effect when the VRF is re-added
                Some(old) if old.import_rts == new.import_rts && old.export_rts == new.export_rts => {
                    let removed = old
                        .families
                        .iter()
                        .filter(|f| !new.families.contains(f))
                        .map(|family| DaemonCommand::DelVrf {
                            rd: rd.clone(),
                            family: *family,
                        });
                    let added = new
                        .families
                        .iter()
                        .filter(|f| !old.families.contains(f))
                        .map(|family| DaemonCommand::AddVrf {
                            vrf: new.clone(),
                            family: *family,
                        });
                    removed.chain(added).collect()
                }
                Some(old) => {
                    let removed = old.families.iter().map(|family| DaemonCommand::DelVrf {
                        rd: rd.clone(),
                        family: *family,
                    });
                    let added = new.families.iter().map(|family| DaemonCommand::AddVrf {
                        vrf: new.clone(),
                        family: *family,
                    });
                    removed.chain(added).collect()
                }
                None => new
                    .families
                    .iter()
                    .map(|family| DaemonCommand::AddVrf {
                        vrf: new.clone(),
                        family: *family,
                    })
                    .collect(),
            };
            Ok(commands)
        }
        Some(_) => Err(event.mismatch("VRF")),
        None => match &event.old {
            Some(ConfigValue::Vrf(old)) => {
                config.vrfs.remove(&old.rd);
                Ok(old
                    .families
                    .iter()
                    .map(|family| DaemonCommand::DelVrf {
                        rd: old.rd.clone(),
                        family: *family,
                    })
                    .collect())
            }
            _ => Err(event.mismatch("VRF")),
        },
    }
}

fn network(config: &mut BgpConfig, event: &ConfigEvent) -> Commands {
    let mut commands = vec![];
    if let Some(ConfigValue::Network(old)) = &event.old {
        config.networks.remove(&(old.rd.clone(), old.prefix));
        let replaced = match &event.new {
            Some(ConfigValue::Network(new)) => new.rd == old.rd && new.prefix == old.prefix,
            _ => false,
        };
        if !replaced {
            commands.push(DaemonCommand::DelPrefix {
                rd: old.rd.clone(),
                prefix: old.prefix,
            });
        }
    }
    match &event.new {
        Some(ConfigValue::Network(new)) => {
            if !config.vrfs.contains_key(&new.rd) {
                return Err(ConfigError::UnknownVrf(new.rd.clone()));
            }
            config
                .networks
                .insert((new.rd.clone(), new.prefix), new.clone());
            commands.push(DaemonCommand::AddPrefix(new.clone()));
        }
        Some(_) => return Err(event.mismatch("network")),
        None if commands.is_empty() => return Err(event.mismatch("network")),
        None => (),
    }
    Ok(commands)
}

fn multipath(config: &mut BgpConfig, event: &ConfigEvent) -> Commands {
    match (&event.old, &event.new) {
        (_, Some(ConfigValue::Multipath { family, enabled })) => {
            config.multipath.insert(*family, *enabled);
            if *enabled {
                Ok(vec![DaemonCommand::EnableMultipath(*family)])
            } else {
                Ok(vec![DaemonCommand::DisableMultipath(*family)])
            }
        }
        (Some(ConfigValue::Multipath { family, .. }), None) => {
            config.multipath.remove(family);
            Ok(vec![DaemonCommand::DisableMultipath(*family)])
        }
        _ => Err(event.mismatch("multipath")),
    }
}

fn max_paths(config: &mut BgpConfig, event: &ConfigEvent) -> Commands {
    match (&event.old, &event.new) {
        (_, Some(ConfigValue::MaxPaths { rd, max_paths })) => {
            let vrf = config
                .vrfs
                .get_mut(rd)
                .ok_or_else(|| ConfigError::UnknownVrf(rd.clone()))?;
            vrf.max_paths = Some(*max_paths);
            Ok(vec![DaemonCommand::SetMaxPaths {
                rd: rd.clone(),
                max_paths: *max_paths,
            }])
        }
        (Some(ConfigValue::MaxPaths { rd, .. }), None) => {
            // VRF may already be gone with its max-paths
            match config.vrfs.get_mut(rd) {
                Some(vrf) => {
                    vrf.max_paths = None;
                    Ok(vec![DaemonCommand::SetMaxPaths {
                        rd: rd.clone(),
                        max_paths: 1,
                    }])
                }
                None => Ok(vec![]),
            }
        }
        _ => Err(event.mismatch("max-paths")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use test_log::test;

    fn addr(last: u8) -> IpAddr {
        IpAddr::from(Ipv4Addr::new(10, 0, 0, last))
    }

    fn apply(config: &mut BgpConfig, event: ConfigEvent) -> Commands {
        let table = handler_table();
        table[&event.kind](config, &event)
    }

    #[test]
    fn test_every_kind_has_handler() {
        let table = handler_table();
        for kind in ConfigKind::ALL.iter() {
            assert!(table.contains_key(kind), "{:?}", kind);
        }
    }

    #[test]
    fn test_neighbor_add_update_remove() {
        let mut config = BgpConfig::default();
        let mut peer = PeerConfig::new(addr(2), 65001);
        peer.families = vec![AddressFamily::Vpnv4];
        let commands = apply(
            &mut config,
            ConfigEvent::added(ConfigKind::Neighbor, "bgp/neighbors/10.0.0.2", ConfigValue::Neighbor(peer.clone())),
        )
        .unwrap();
        assert_eq!(
            commands,
            vec![
                DaemonCommand::AddNeighbor {
                    address: addr(2),
                    remote_as: 65001
                },
                DaemonCommand::AddAddressFamily {
                    address: addr(2),
                    family: AddressFamily::Vpnv4
                },
            ]
        );

        let mut updated = peer.clone();
        updated.families = vec![AddressFamily::L2vpnEvpn];
        updated.multihop = Some(2);
        let commands = apply(
            &mut config,
            ConfigEvent::updated(
                ConfigKind::Neighbor,
                "bgp/neighbors/10.0.0.2",
                ConfigValue::Neighbor(peer.clone()),
                ConfigValue::Neighbor(updated.clone()),
            ),
        )
        .unwrap();
        assert_eq!(
            commands,
            vec![
                DaemonCommand::AddMultihop {
                    address: addr(2),
                    ttl: 2
                },
                DaemonCommand::DelAddressFamily {
                    address: addr(2),
                    family: AddressFamily::Vpnv4
                },
                DaemonCommand::AddAddressFamily {
                    address: addr(2),
                    family: AddressFamily::L2vpnEvpn
                },
            ]
        );
        assert_eq!(config.peers[&addr(2)], updated);

        let commands = apply(
            &mut config,
            ConfigEvent::removed(ConfigKind::Neighbor, "bgp/neighbors/10.0.0.2", ConfigValue::Neighbor(updated)),
        )
        .unwrap();
        assert_eq!(commands, vec![DaemonCommand::DelNeighbor(addr(2))]);
        assert!(config.peers.is_empty());
    }

    #[test]
    fn test_as_removal_stops_session() {
        let mut config = BgpConfig::default();
        let as_config = AsConfig {
            asn: 65000,
            router_id: addr(1),
            keepalive: 60,
            hold_time: 180,
            stalepath_time: 0,
            advertise_fbit: false,
        };
        apply(
            &mut config,
            ConfigEvent::added(ConfigKind::AsConfig, "bgp/as", ConfigValue::As(as_config.clone())),
        )
        .unwrap();
        let commands = apply(
            &mut config,
            ConfigEvent::removed(ConfigKind::AsConfig, "bgp/as", ConfigValue::As(as_config)),
        )
        .unwrap();
        assert_eq!(commands, vec![DaemonCommand::StopSession(65000)]);
        assert!(config.as_config.is_none());
    }

    #[test]
    fn test_update_source_requires_peer() {
        let mut config = BgpConfig::default();
        let err = apply(
            &mut config,
            ConfigEvent::added(
                ConfigKind::UpdateSource,
                "bgp/neighbors/10.0.0.9/update-source",
                ConfigValue::UpdateSource {
                    peer: addr(9),
                    source: addr(1),
                },
            ),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPeer(p) if p == addr(9)));
    }

    #[test]
    fn test_kind_value_mismatch() {
        let mut config = BgpConfig::default();
        let err = apply(
            &mut config,
            ConfigEvent::added(
                ConfigKind::GracefulRestart,
                "bgp/graceful-restart",
                ConfigValue::Multipath {
                    family: AddressFamily::Vpnv4,
                    enabled: true,
                },
            ),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Mismatch { .. }));
        assert!(config.graceful_restart.is_none());
    }

    #[test]
    fn test_vrf_family_delta_and_network() {
        let mut config = BgpConfig::default();
        let vrf = VrfConfig::new("100:1", vec![AddressFamily::Vpnv4]);
        apply(&mut config, ConfigEvent::added(ConfigKind::Vrf, "bgp/vrfs/100:1", ConfigValue::Vrf(vrf.clone())))
            .unwrap();
        let mut dual = vrf.clone();
        dual.families.push(AddressFamily::Vpnv6);
        let commands = apply(
            &mut config,
            ConfigEvent::updated(ConfigKind::Vrf, "bgp/vrfs/100:1", ConfigValue::Vrf(vrf), ConfigValue::Vrf(dual.clone())),
        )
        .unwrap();
        assert_eq!(
            commands,
            vec![DaemonCommand::AddVrf {
                vrf: dual,
                family: AddressFamily::Vpnv6
            }]
        );

        let network = NetworkConfig {
            rd: "100:1".into(),
            prefix: "192.168.1.0/24".parse().unwrap(),
            next_hop: addr(1),
            label: 0,
        };
        let commands = apply(
            &mut config,
            ConfigEvent::added(ConfigKind::Network, "bgp/networks", ConfigValue::Network(network.clone())),
        )
        .unwrap();
        assert_eq!(commands, vec![DaemonCommand::AddPrefix(network)]);
        assert_eq!(config.networks.len(), 1);
    }
}
