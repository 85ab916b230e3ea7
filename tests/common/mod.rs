#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ipnetwork::IpNetwork;
use tokio::time::{sleep, timeout};

use bgp_reconciler::config::{
    BfdConfig, BgpConfig, LoggingConfig, NetworkConfig, PeerConfig, Settings, VrfConfig,
};
use bgp_reconciler::daemon::{
    DaemonError, DaemonResult, RouteBatch, RoutingDaemonClient, SessionParams, ERR_ACTIVE,
    ERR_FAILED,
};
use bgp_reconciler::fib::MemoryFib;
use bgp_reconciler::models::{AddressFamily, RouteAdvertisement};
use bgp_reconciler::ownership::StaticOwnership;
use bgp_reconciler::{Collaborators, ReconciliationEngine};

/// Routing daemon that records every call and fails on request
#[derive(Default)]
pub struct RecordingDaemon {
    calls: Mutex<Vec<String>>,
    // Remaining failures per call, keyed like the recorded call
    failures: Mutex<HashMap<String, u32>>,
    refuse_connect: AtomicBool,
    already_active: AtomicBool,
    batches: Mutex<HashMap<AddressFamily, Vec<RouteAdvertisement>>>,
    // Calls that hang once, until the per-call timeout gives up on them
    stalls: Mutex<HashSet<String>>,
}

impl RecordingDaemon {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn fail(&self, call: &str, times: u32) {
        self.failures
            .lock()
            .unwrap()
            .insert(call.to_string(), times);
    }

    pub fn refuse_connect(&self) {
        self.refuse_connect.store(true, Ordering::SeqCst);
    }

    /// Reject start-session as if the BGP instance survived the restart
    pub fn already_active(&self) {
        self.already_active.store(true, Ordering::SeqCst);
    }

    pub fn hold_routes(&self, family: AddressFamily, routes: Vec<RouteAdvertisement>) {
        self.batches.lock().unwrap().insert(family, routes);
    }

    /// Hang the next matching call
    pub fn stall(&self, call: &str) {
        self.stalls.lock().unwrap().insert(call.to_string());
    }

    async fn record(&self, call: String) -> DaemonResult<()> {
        self.calls.lock().unwrap().push(call.clone());
        let stalled = self.stalls.lock().unwrap().remove(&call);
        if stalled {
            sleep(Duration::from_secs(3600)).await;
        }
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(&call) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(DaemonError::rejected(ERR_FAILED))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl RoutingDaemonClient for RecordingDaemon {
    async fn connect(&self, _host: &str, _port: u16) -> bool {
        self.calls.lock().unwrap().push("connect".to_string());
        !self.refuse_connect.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) {
        self.calls.lock().unwrap().push("disconnect".to_string());
    }

    async fn start_session(&self, params: &SessionParams) -> DaemonResult<()> {
        self.record(format!("start_session {}", params.asn)).await?;
        if self.already_active.load(Ordering::SeqCst) {
            return Err(DaemonError::rejected(ERR_ACTIVE));
        }
        Ok(())
    }

    async fn stop_session(&self, asn: u32) -> DaemonResult<()> {
        self.record(format!("stop_session {}", asn)).await
    }

    async fn add_neighbor(&self, address: IpAddr, remote_as: u32) -> DaemonResult<()> {
        self.record(format!("add_neighbor {} {}", address, remote_as)).await
    }

    async fn del_neighbor(&self, address: IpAddr) -> DaemonResult<()> {
        self.record(format!("del_neighbor {}", address)).await
    }

    async fn add_update_source(&self, address: IpAddr, source: IpAddr) -> DaemonResult<()> {
        self.record(format!("add_update_source {} {}", address, source)).await
    }

    async fn del_update_source(&self, address: IpAddr) -> DaemonResult<()> {
        self.record(format!("del_update_source {}", address)).await
    }

    async fn add_multihop(&self, address: IpAddr, ttl: u8) -> DaemonResult<()> {
        self.record(format!("add_multihop {} {}", address, ttl)).await
    }

    async fn del_multihop(&self, address: IpAddr) -> DaemonResult<()> {
        self.record(format!("del_multihop {}", address)).await
    }

    async fn add_address_family(&self, address: IpAddr, family: AddressFamily) -> DaemonResult<()> {
        self.record(format!("add_address_family {} {}", address, family)).await
    }

    async fn del_address_family(&self, address: IpAddr, family: AddressFamily) -> DaemonResult<()> {
        self.record(format!("del_address_family {} {}", address, family)).await
    }

    async fn add_vrf(&self, vrf: &VrfConfig, family: AddressFamily) -> DaemonResult<()> {
        self.record(format!("add_vrf {} {}", vrf.rd, family)).await
    }

    async fn del_vrf(&self, rd: &str, family: AddressFamily) -> DaemonResult<()> {
        self.record(format!("del_vrf {} {}", rd, family)).await
    }

    async fn add_prefix(&self, network: &NetworkConfig) -> DaemonResult<()> {
        self.record(format!("add_prefix {} {}", network.rd, network.prefix)).await
    }

    async fn del_prefix(&self, rd: &str, prefix: IpNetwork) -> DaemonResult<()> {
        self.record(format!("del_prefix {} {}", rd, prefix)).await
    }

    async fn enable_multipath(&self, family: AddressFamily) -> DaemonResult<()> {
        self.record(format!("enable_multipath {}", family)).await
    }

    async fn disable_multipath(&self, family: AddressFamily) -> DaemonResult<()> {
        self.record(format!("disable_multipath {}", family)).await
    }

    async fn set_max_paths(&self, rd: &str, max_paths: u32) -> DaemonResult<()> {
        self.record(format!("set_max_paths {} {}", rd, max_paths)).await
    }

    async fn add_graceful_restart(&self, stalepath_time: u32) -> DaemonResult<()> {
        self.record(format!("add_graceful_restart {}", stalepath_time)).await
    }

    async fn del_graceful_restart(&self) -> DaemonResult<()> {
        self.record("del_graceful_restart".to_string()).await
    }

    async fn set_logging(&self, logging: &LoggingConfig) -> DaemonResult<()> {
        self.record(format!("set_logging {}", logging.level)).await
    }

    async fn add_bfd(&self, _bfd: &BfdConfig) -> DaemonResult<()> {
        self.record("add_bfd".to_string()).await
    }

    async fn del_bfd(&self) -> DaemonResult<()> {
        self.record("del_bfd".to_string()).await
    }

    async fn send_end_of_rib(&self) -> DaemonResult<()> {
        self.record("send_end_of_rib".to_string()).await
    }

    async fn open_route_sync(&self, family: AddressFamily) -> DaemonResult<()> {
        self.record(format!("open_route_sync {}", family)).await
    }

    async fn next_route_batch(&self, family: AddressFamily) -> DaemonResult<RouteBatch> {
        self.record(format!("next_route_batch {}", family)).await?;
        let routes = self
            .batches
            .lock()
            .unwrap()
            .remove(&family)
            .unwrap_or_default();
        Ok(RouteBatch { routes, done: true })
    }

    async fn close_route_sync(&self, family: AddressFamily) -> DaemonResult<()> {
        self.record(format!("close_route_sync {}", family)).await
    }
}

pub fn settings() -> Settings {
    Settings {
        rpc_timeout: Duration::from_secs(1),
        retry_attempts: 3,
        grace_interval: Duration::from_millis(100),
        default_stalepath_secs: 30,
        ..Settings::default()
    }
}

pub fn peer(address: &str, remote_as: u32) -> PeerConfig {
    PeerConfig::new(address.parse().unwrap(), remote_as)
}

pub fn config_with_peers(peers: Vec<PeerConfig>) -> BgpConfig {
    let mut config = BgpConfig::default();
    for peer in peers {
        config.peers.insert(peer.address, peer);
    }
    config
}

pub struct Harness {
    pub engine: Arc<ReconciliationEngine>,
    pub daemon: Arc<RecordingDaemon>,
    pub fib: Arc<MemoryFib>,
    pub ownership: Arc<StaticOwnership>,
}

impl Harness {
    pub fn new(config: BgpConfig, fib: MemoryFib) -> Self {
        let daemon = RecordingDaemon::new();
        let fib = Arc::new(fib);
        let ownership = Arc::new(StaticOwnership::new(true));
        let engine = ReconciliationEngine::new(
            settings(),
            config,
            Collaborators {
                daemon: daemon.clone(),
                fib: fib.clone(),
                overlay: fib.clone(),
                ownership: ownership.clone(),
                config_writer: None,
            },
        );
        Self {
            engine: Arc::new(engine),
            daemon,
            fib,
            ownership,
        }
    }

    /// Wait until `count` replays have been recorded
    pub async fn replays_recorded(&self, count: usize) {
        let engine = &self.engine;
        timeout(Duration::from_secs(3600), async {
            while engine.replay_results().len() < count {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("replays were not recorded in time");
    }

    /// Wait until a finished replay has armed its stale sweep
    pub async fn cleanup_armed(&self) {
        let engine = &self.engine;
        timeout(Duration::from_secs(5), async {
            while !engine.cleanup_pending() {
                sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("stale cleanup was not armed in time");
    }
}
