use std::collections::{HashMap, HashSet};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use log::{trace, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Context, StaleMatch};
use crate::fib::FibError;
use crate::models::{
    EncapType, MacRoute, ProtocolType, RouteAdvertisement, RouteKey, RouteOrigin, RouteRecord,
    RouteWithdrawal,
};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Invalid prefix {0}")]
    InvalidPrefix(String),
    #[error("Invalid next hop {0}")]
    InvalidNextHop(String),
    #[error("Prefix {prefix} does not belong to {protocol}")]
    FamilyMismatch {
        protocol: ProtocolType,
        prefix: IpNetwork,
    },
    #[error(transparent)]
    Fib(#[from] FibError),
}

/// What applying one inbound update did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A route was written to the forwarding database
    Written,
    /// Route already present with identical attributes
    Unchanged,
    /// EVPN MAC/endpoint advertisement indexed
    EndpointLearned { new_endpoint: bool },
    /// Route or path removed from the forwarding database
    Withdrawn,
    /// EVPN MAC/endpoint withdrawal indexed
    EndpointWithdrawn { last_reference: bool },
    /// Nothing known about the withdrawn route
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateAction {
    Advertise,
    Withdraw,
}

impl fmt::Display for UpdateAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UpdateAction::Advertise => write!(f, "Advertise"),
            UpdateAction::Withdraw => write!(f, "Withdraw"),
        }
    }
}

/// Diagnostic history entry for one inbound update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub received: DateTime<Utc>,
    pub action: UpdateAction,
    pub protocol: ProtocolType,
    pub rd: String,
    pub prefix: String,
    pub next_hop: Option<String>,
    pub label: u32,
    pub mac: Option<String>,
}

impl From<&RouteAdvertisement> for UpdateRecord {
    fn from(adv: &RouteAdvertisement) -> Self {
        Self {
            received: Utc::now(),
            action: UpdateAction::Advertise,
            protocol: adv.protocol,
            rd: adv.rd.clone(),
            prefix: format!("{}/{}", adv.prefix, adv.prefix_len),
            next_hop: Some(adv.next_hop.clone()),
            label: adv.l3_label,
            mac: adv.mac.clone(),
        }
    }
}

impl From<&RouteWithdrawal> for UpdateRecord {
    fn from(wd: &RouteWithdrawal) -> Self {
        Self {
            received: Utc::now(),
            action: UpdateAction::Withdraw,
            protocol: wd.protocol,
            rd: wd.rd.clone(),
            prefix: format!("{}/{}", wd.prefix, wd.prefix_len),
            next_hop: wd.next_hop.clone(),
            label: 0,
            mac: wd.mac.clone(),
        }
    }
}

/// Remote tunnel endpoints per (rd, endpoint), with the MACs behind each.
/// `None` stands for an endpoint advertised without a MAC.
#[derive(Debug, Default)]
pub(crate) struct EndpointIndex {
    endpoints: HashMap<(String, IpAddr), HashSet<Option<String>>>,
    macs: HashMap<(String, String), IpAddr>,
}

impl EndpointIndex {
    /// Returns true when the endpoint was not referenced before.
    /// A MAC seen behind another endpoint is moved; the old endpoint is
    /// returned if that left it unreferenced.
    fn learn(&mut self, rd: &str, endpoint: IpAddr, mac: Option<&str>) -> (bool, Option<IpAddr>) {
        let mut orphaned = None;
        if let Some(mac) = mac {
            let previous = self
                .macs
                .insert((rd.to_owned(), mac.to_owned()), endpoint);
            if let Some(previous) = previous.filter(|p| *p != endpoint) {
                if self.release(rd, previous, Some(mac)) {
                    orphaned = Some(previous);
                }
            }
        }
        let refs = self
            .endpoints
            .entry((rd.to_owned(), endpoint))
            .or_insert_with(HashSet::new);
        let new_endpoint = refs.is_empty();
        refs.insert(mac.map(str::to_owned));
        (new_endpoint, orphaned)
    }

    /// Returns the endpoint and whether this was its last reference,
    /// or None when nothing matched
    fn forget(
        &mut self,
        rd: &str,
        endpoint: Option<IpAddr>,
        mac: Option<&str>,
    ) -> Option<(IpAddr, bool)> {
        let endpoint = match (endpoint, mac) {
            (Some(endpoint), _) => endpoint,
            (None, Some(mac)) => *self.macs.get(&(rd.to_owned(), mac.to_owned()))?,
            (None, None) => return None,
        };
        let refs = self.endpoints.get(&(rd.to_owned(), endpoint))?;
        if !refs.contains(&mac.map(str::to_owned)) {
            return None;
        }
        if let Some(mac) = mac {
            self.macs.remove(&(rd.to_owned(), mac.to_owned()));
        }
        Some((endpoint, self.release(rd, endpoint, mac)))
    }

    fn release(&mut self, rd: &str, endpoint: IpAddr, mac: Option<&str>) -> bool {
        let key = (rd.to_owned(), endpoint);
        let last = match self.endpoints.get_mut(&key) {
            Some(refs) => {
                refs.remove(&mac.map(str::to_owned));
                refs.is_empty()
            }
            None => false,
        };
        if last {
            self.endpoints.remove(&key);
        }
        last
    }

    pub(crate) fn len(&self) -> usize {
        self.endpoints.len()
    }
}

fn parse_prefix(protocol: ProtocolType, prefix: &str, len: u8) -> Result<IpNetwork, IngestError> {
    let invalid = || IngestError::InvalidPrefix(format!("{}/{}", prefix, len));
    let addr: IpAddr = prefix.parse().map_err(|_| invalid())?;
    let network = IpNetwork::new(addr, len).map_err(|_| invalid())?;
    let mismatched = match protocol {
        ProtocolType::Ipv4 => !network.is_ipv4(),
        ProtocolType::Ipv6 => !network.is_ipv6(),
        _ => false,
    };
    if mismatched {
        return Err(IngestError::FamilyMismatch {
            protocol,
            prefix: network,
        });
    }
    Ok(network)
}

fn parse_next_hop(next_hop: &str) -> Result<IpAddr, IngestError> {
    next_hop
        .parse()
        .map_err(|_| IngestError::InvalidNextHop(next_hop.to_owned()))
}

fn to_record(adv: &RouteAdvertisement, key: RouteKey) -> RouteRecord {
    let evpn = adv.protocol == ProtocolType::Evpn;
    RouteRecord {
        key,
        label: adv.l3_label,
        l2vni: adv.l2_label,
        l3vni: if evpn { adv.l3_label } else { 0 },
        mac: adv.mac.clone(),
        router_mac: adv.router_mac.clone(),
        encap: if evpn {
            EncapType::Vxlan
        } else {
            EncapType::MplsGre
        },
        origin: RouteOrigin::Bgp,
    }
}

/// Applies route advertisements and withdrawals from the daemon,
/// both live and while draining a route-sync cursor
#[derive(Clone)]
pub struct RouteIngestPipeline {
    ctx: Arc<Context>,
}

impl RouteIngestPipeline {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub async fn on_advertise(&self, adv: &RouteAdvertisement) -> Result<IngestOutcome, IngestError> {
        self.ctx.record_update(UpdateRecord::from(adv));
        let result = self.advertise(adv).await;
        if let Err(err) = &result {
            warn!("Dropping advertisement [{}] {}/{}: {}", adv.rd, adv.prefix, adv.prefix_len, err);
        }
        result
    }

    pub async fn on_withdraw(&self, wd: &RouteWithdrawal) -> Result<IngestOutcome, IngestError> {
        self.ctx.record_update(UpdateRecord::from(wd));
        let result = self.withdraw(wd).await;
        if let Err(err) = &result {
            warn!("Dropping withdrawal [{}] {}/{}: {}", wd.rd, wd.prefix, wd.prefix_len, err);
        }
        result
    }

    async fn advertise(&self, adv: &RouteAdvertisement) -> Result<IngestOutcome, IngestError> {
        let prefix = parse_prefix(adv.protocol, &adv.prefix, adv.prefix_len)?;
        let next_hop = parse_next_hop(&adv.next_hop)?;

        let mut state = self.ctx.lock().await;
        if adv.protocol == ProtocolType::Evpn && state.config.is_l2_vrf(&adv.rd) {
            let (new_endpoint, orphaned) =
                state
                    .endpoints
                    .learn(&adv.rd, next_hop, adv.mac.as_deref());
            drop(state);
            return self.apply_endpoint(adv, next_hop, new_endpoint, orphaned);
        }

        let key = RouteKey::new(&adv.rd, prefix, next_hop);
        let record = to_record(adv, key.clone());
        let write = match state.stale.reconcile(&adv.rd, &key.path(), adv.l3_label) {
            StaleMatch::Unchanged => false,
            StaleMatch::Changed { previous } => {
                trace!("{} label changed {} -> {}", key, previous, adv.l3_label);
                true
            }
            StaleMatch::Absent => state.routes.get(&key) != Some(&record),
        };
        state.routes.insert(key.clone(), record.clone());
        drop(state);

        if !write {
            trace!("{} unchanged", key);
            return Ok(IngestOutcome::Unchanged);
        }
        if let Err(err) = self.ctx.fib.write_route(&record) {
            self.ctx.lock().await.routes.remove(&key);
            return Err(err.into());
        }
        trace!("Wrote {}", record);
        Ok(IngestOutcome::Written)
    }

    fn apply_endpoint(
        &self,
        adv: &RouteAdvertisement,
        endpoint: IpAddr,
        new_endpoint: bool,
        orphaned: Option<IpAddr>,
    ) -> Result<IngestOutcome, IngestError> {
        if let Some(orphaned) = orphaned {
            self.ctx.overlay.remove_remote_endpoint(&adv.rd, orphaned);
        }
        if new_endpoint {
            trace!("New remote endpoint [{}] {}", adv.rd, endpoint);
            self.ctx.overlay.add_remote_endpoint(&adv.rd, endpoint);
        }
        if let Some(mac) = &adv.mac {
            self.ctx.fib.write_mac_route(&MacRoute {
                rd: adv.rd.clone(),
                mac: mac.clone(),
                tunnel_endpoint: endpoint,
                l2vni: adv.l2_label,
                l3vni: adv.l3_label,
                router_mac: adv.router_mac.clone(),
                origin: RouteOrigin::Bgp,
            })?;
        }
        Ok(IngestOutcome::EndpointLearned { new_endpoint })
    }

    async fn withdraw(&self, wd: &RouteWithdrawal) -> Result<IngestOutcome, IngestError> {
        let prefix = parse_prefix(wd.protocol, &wd.prefix, wd.prefix_len)?;
        let next_hop = wd.next_hop.as_deref().map(parse_next_hop).transpose()?;

        let mut state = self.ctx.lock().await;
        if wd.protocol == ProtocolType::Evpn && state.config.is_l2_vrf(&wd.rd) {
            let forgotten = state
                .endpoints
                .forget(&wd.rd, next_hop, wd.mac.as_deref());
            drop(state);
            let (endpoint, last_reference) = match forgotten {
                Some(forgotten) => forgotten,
                None => return Ok(IngestOutcome::Ignored),
            };
            if let Some(mac) = &wd.mac {
                self.ctx.fib.delete_mac_route(&wd.rd, mac)?;
            }
            if last_reference {
                trace!("Last reference to endpoint [{}] {} withdrawn", wd.rd, endpoint);
                self.ctx.overlay.remove_remote_endpoint(&wd.rd, endpoint);
            }
            return Ok(IngestOutcome::EndpointWithdrawn { last_reference });
        }

        match next_hop {
            Some(next_hop) => {
                let key = RouteKey::new(&wd.rd, prefix, next_hop);
                let known = state.routes.remove(&key).is_some();
                let stale = state.stale.remove(&wd.rd, &key.path()).is_some();
                drop(state);
                if !(known || stale)
                    && !self.ctx.fib.contains_route(&wd.rd, &prefix, Some(&next_hop))?
                {
                    trace!("Withdraw for unknown route {}", key);
                    return Ok(IngestOutcome::Ignored);
                }
                self.ctx.fib.delete_route_path(&wd.rd, &prefix, &next_hop)?;
            }
            None => {
                let before = state.routes.len();
                state
                    .routes
                    .retain(|key, _| !(key.rd() == wd.rd && key.prefix() == prefix));
                let known = before - state.routes.len();
                let stale = state.stale.remove_prefix(&wd.rd, &prefix);
                drop(state);
                if known + stale == 0 && !self.ctx.fib.contains_route(&wd.rd, &prefix, None)? {
                    trace!("Withdraw for unknown prefix [{}] {}", wd.rd, prefix);
                    return Ok(IngestOutcome::Ignored);
                }
                self.ctx.fib.delete_route(&wd.rd, &prefix)?;
            }
        }
        Ok(IngestOutcome::Withdrawn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BgpConfig, Settings, VrfConfig};
    use crate::fib::{FibWriter, MemoryFib};
    use crate::models::{AddressFamily, PrefixNextHop, VrfLayer};
    use crate::reconcile::testing::NoDaemon;

    fn pipeline() -> (RouteIngestPipeline, Arc<Context>, Arc<MemoryFib>) {
        pipeline_with(MemoryFib::new())
    }

    fn pipeline_with(fib: MemoryFib) -> (RouteIngestPipeline, Arc<Context>, Arc<MemoryFib>) {
        let mut config = BgpConfig::default();
        let mut l2 = VrfConfig::new("100:2", vec![AddressFamily::L2vpnEvpn]);
        l2.layer = VrfLayer::L2;
        config.vrfs.insert("100:2".into(), l2);
        config.vrfs.insert(
            "100:1".into(),
            VrfConfig::new("100:1", vec![AddressFamily::Vpnv4]),
        );
        let fib = Arc::new(fib);
        let ctx = Arc::new(Context::new(
            Settings::default(),
            config,
            Arc::new(NoDaemon),
            fib.clone(),
            fib.clone(),
        ));
        (RouteIngestPipeline::new(ctx.clone()), ctx, fib)
    }

    fn l3(label: u32) -> RouteAdvertisement {
        RouteAdvertisement::new(
            ProtocolType::L3vpn,
            "100:1",
            "10.0.0.0/24".parse().unwrap(),
            "1.1.1.1".parse().unwrap(),
        )
        .with_label(label)
    }

    fn mac(mac: &str, tep: &str) -> RouteAdvertisement {
        RouteAdvertisement::new(
            ProtocolType::Evpn,
            "100:2",
            "0.0.0.0/0".parse().unwrap(),
            tep.parse().unwrap(),
        )
        .with_mac(mac, 5001)
    }

    fn stale_path() -> PrefixNextHop {
        PrefixNextHop::new("10.0.0.0/24".parse().unwrap(), "1.1.1.1".parse().unwrap())
    }

    #[tokio::test]
    async fn test_readvertise_writes_once() {
        let (pipeline, ctx, fib) = pipeline();
        assert_eq!(pipeline.on_advertise(&l3(5)).await.unwrap(), IngestOutcome::Written);
        assert_eq!(pipeline.on_advertise(&l3(5)).await.unwrap(), IngestOutcome::Unchanged);
        assert_eq!(pipeline.on_advertise(&l3(6)).await.unwrap(), IngestOutcome::Written);
        assert_eq!(fib.routes().unwrap()[0].label, 6);
        assert_eq!(ctx.history().len(), 3);
    }

    #[tokio::test]
    async fn test_stale_match_suppresses_write() {
        let (pipeline, ctx, fib) = pipeline();
        ctx.lock().await.stale.insert("100:1", stale_path(), 5);
        assert_eq!(pipeline.on_advertise(&l3(5)).await.unwrap(), IngestOutcome::Unchanged);
        assert!(ctx.lock().await.stale.is_empty());
        assert!(fib.routes().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_label_change_writes() {
        let (pipeline, ctx, fib) = pipeline();
        ctx.lock().await.stale.insert("100:1", stale_path(), 5);
        assert_eq!(pipeline.on_advertise(&l3(7)).await.unwrap(), IngestOutcome::Written);
        assert!(ctx.lock().await.stale.is_empty());
        let routes = fib.routes().unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].label, 7);
    }

    #[tokio::test]
    async fn test_withdraw_unknown_is_noop() {
        let (pipeline, _, _) = pipeline();
        let wd = RouteWithdrawal::new(
            ProtocolType::L3vpn,
            "100:1",
            "10.5.0.0/16".parse().unwrap(),
            Some("1.1.1.1".parse().unwrap()),
        );
        assert_eq!(pipeline.on_withdraw(&wd).await.unwrap(), IngestOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_withdraw_deletes_route_programmed_before_start() {
        let seeded = |nh: &str| {
            RouteRecord::bgp(
                RouteKey::new("100:1", "10.0.0.0/24".parse().unwrap(), nh.parse().unwrap()),
                5,
            )
        };
        let (pipeline, _, fib) =
            pipeline_with(MemoryFib::with_routes(vec![seeded("1.1.1.1"), seeded("2.2.2.2")]));

        let path = RouteWithdrawal::new(
            ProtocolType::L3vpn,
            "100:1",
            "10.0.0.0/24".parse().unwrap(),
            Some("1.1.1.1".parse().unwrap()),
        );
        assert_eq!(pipeline.on_withdraw(&path).await.unwrap(), IngestOutcome::Withdrawn);
        assert_eq!(fib.routes().unwrap().len(), 1);

        let prefix = RouteWithdrawal::new(
            ProtocolType::L3vpn,
            "100:1",
            "10.0.0.0/24".parse().unwrap(),
            None,
        );
        assert_eq!(pipeline.on_withdraw(&prefix).await.unwrap(), IngestOutcome::Withdrawn);
        assert!(fib.routes().unwrap().is_empty());
        assert_eq!(pipeline.on_withdraw(&prefix).await.unwrap(), IngestOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_withdraw_without_next_hop_removes_prefix() {
        let (pipeline, _, fib) = pipeline();
        pipeline.on_advertise(&l3(5)).await.unwrap();
        let wd = RouteWithdrawal::new(
            ProtocolType::L3vpn,
            "100:1",
            "10.0.0.0/24".parse().unwrap(),
            None,
        );
        assert_eq!(pipeline.on_withdraw(&wd).await.unwrap(), IngestOutcome::Withdrawn);
        assert!(fib.routes().unwrap().is_empty());
        // a second advertise is a fresh write again
        assert_eq!(pipeline.on_advertise(&l3(5)).await.unwrap(), IngestOutcome::Written);
    }

    #[tokio::test]
    async fn test_endpoint_removed_with_last_mac() {
        let (pipeline, ctx, fib) = pipeline();
        let tep: IpAddr = "10.1.1.1".parse().unwrap();
        assert_eq!(
            pipeline.on_advertise(&mac("aa:bb:cc:00:00:01", "10.1.1.1")).await.unwrap(),
            IngestOutcome::EndpointLearned { new_endpoint: true }
        );
        assert_eq!(
            pipeline.on_advertise(&mac("aa:bb:cc:00:00:02", "10.1.1.1")).await.unwrap(),
            IngestOutcome::EndpointLearned { new_endpoint: false }
        );
        assert_eq!(fib.mac_routes().len(), 2);
        assert!(fib.routes().unwrap().is_empty());
        assert_eq!(ctx.lock().await.endpoints.len(), 1);

        let withdraw = |m: &str| {
            RouteWithdrawal::new(ProtocolType::Evpn, "100:2", "0.0.0.0/0".parse().unwrap(), None)
                .with_mac(m)
        };
        assert_eq!(
            pipeline.on_withdraw(&withdraw("aa:bb:cc:00:00:01")).await.unwrap(),
            IngestOutcome::EndpointWithdrawn { last_reference: false }
        );
        assert_eq!(fib.remote_endpoints(), vec![("100:2".to_string(), tep)]);
        assert_eq!(
            pipeline.on_withdraw(&withdraw("aa:bb:cc:00:00:02")).await.unwrap(),
            IngestOutcome::EndpointWithdrawn { last_reference: true }
        );
        assert!(fib.remote_endpoints().is_empty());
        assert!(fib.mac_routes().is_empty());
        assert_eq!(
            pipeline.on_withdraw(&withdraw("aa:bb:cc:00:00:02")).await.unwrap(),
            IngestOutcome::Ignored
        );
    }

    #[tokio::test]
    async fn test_mac_move_releases_old_endpoint() {
        let (pipeline, _, fib) = pipeline();
        pipeline.on_advertise(&mac("aa:bb:cc:00:00:01", "10.1.1.1")).await.unwrap();
        pipeline.on_advertise(&mac("aa:bb:cc:00:00:01", "10.1.1.2")).await.unwrap();
        assert_eq!(
            fib.remote_endpoints(),
            vec![("100:2".to_string(), "10.1.1.2".parse().unwrap())]
        );
    }

    #[tokio::test]
    async fn test_malformed_update_dropped() {
        let (pipeline, ctx, fib) = pipeline();
        let mut adv = l3(5);
        adv.next_hop = "not-an-ip".into();
        assert!(matches!(
            pipeline.on_advertise(&adv).await,
            Err(IngestError::InvalidNextHop(_))
        ));
        let v6 = RouteAdvertisement::new(
            ProtocolType::Ipv4,
            "100:1",
            "2001:db8::/64".parse().unwrap(),
            "1.1.1.1".parse().unwrap(),
        );
        assert!(matches!(
            pipeline.on_advertise(&v6).await,
            Err(IngestError::FamilyMismatch { .. })
        ));
        assert!(fib.routes().unwrap().is_empty());
        // still recorded for inspection
        assert_eq!(ctx.history().len(), 2);
    }
}
