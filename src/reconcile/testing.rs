use std::net::IpAddr;

use async_trait::async_trait;
use ipnetwork::IpNetwork;

use crate::config::{BfdConfig, LoggingConfig, NetworkConfig, VrfConfig};
use crate::daemon::{DaemonResult, RouteBatch, RoutingDaemonClient, SessionParams};
use crate::models::AddressFamily;

/// Daemon for tests of code paths that never call it
pub(crate) struct NoDaemon;

#[async_trait]
#[rustfmt::skip]
impl RoutingDaemonClient for NoDaemon {
    async fn connect(&self, _: &str, _: u16) -> bool { false }
    async fn disconnect(&self) {}
    async fn start_session(&self, _: &SessionParams) -> DaemonResult<()> { unreachable!() }
    async fn stop_session(&self, _: u32) -> DaemonResult<()> { unreachable!() }
    async fn add_neighbor(&self, _: IpAddr, _: u32) -> DaemonResult<()> { unreachable!() }
    async fn del_neighbor(&self, _: IpAddr) -> DaemonResult<()> { unreachable!() }
    async fn add_update_source(&self, _: IpAddr, _: IpAddr) -> DaemonResult<()> { unreachable!() }
    async fn del_update_source(&self, _: IpAddr) -> DaemonResult<()> { unreachable!() }
    async fn add_multihop(&self, _: IpAddr, _: u8) -> DaemonResult<()> { unreachable!() }
    async fn del_multihop(&self, _: IpAddr) -> DaemonResult<()> { unreachable!() }
    async fn add_address_family(&self, _: IpAddr, _: AddressFamily) -> DaemonResult<()> { unreachable!() }
    async fn del_address_family(&self, _: IpAddr, _: AddressFamily) -> DaemonResult<()> { unreachable!() }
    async fn add_vrf(&self, _: &VrfConfig, _: AddressFamily) -> DaemonResult<()> { unreachable!() }
    async fn del_vrf(&self, _: &str, _: AddressFamily) -> DaemonResult<()> { unreachable!() }
    async fn add_prefix(&self, _: &NetworkConfig) -> DaemonResult<()> { unreachable!() }
    async fn del_prefix(&self, _: &str, _: IpNetwork) -> DaemonResult<()> { unreachable!() }
    async fn enable_multipath(&self, _: AddressFamily) -> DaemonResult<()> { unreachable!() }
    async fn disable_multipath(&self, _: AddressFamily) -> DaemonResult<()> { unreachable!() }
    async fn set_max_paths(&self, _: &str, _: u32) -> DaemonResult<()> { unreachable!() }
    async fn add_graceful_restart(&self, _: u32) -> DaemonResult<()> { unreachable!() }
    async fn del_graceful_restart(&self) -> DaemonResult<()> { unreachable!() }
    async fn set_logging(&self, _: &LoggingConfig) -> DaemonResult<()> { unreachable!() }
    async fn add_bfd(&self, _: &BfdConfig) -> DaemonResult<()> { unreachable!() }
    async fn del_bfd(&self) -> DaemonResult<()> { unreachable!() }
    async fn send_end_of_rib(&self) -> DaemonResult<()> { unreachable!() }
    async fn open_route_sync(&self, _: AddressFamily) -> DaemonResult<()> { unreachable!() }
    async fn next_route_batch(&self, _: AddressFamily) -> DaemonResult<RouteBatch> { unreachable!() }
    async fn close_route_sync(&self, _: AddressFamily) -> DaemonResult<()> { unreachable!() }
}

