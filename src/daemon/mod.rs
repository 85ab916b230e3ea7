mod rpc;

pub use rpc::{DaemonRpcClient, JsonRpcDaemonClient};

use std::net::IpAddr;

use async_trait::async_trait;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{AsConfig, BfdConfig, LoggingConfig, NetworkConfig, VrfConfig};
use crate::models::{AddressFamily, RouteAdvertisement};

/// Generic failure
pub const ERR_FAILED: i32 = 1;
/// BGP instance is already running
pub const ERR_ACTIVE: i32 = 10;
/// BGP instance is not running
pub const ERR_INACTIVE: i32 = 11;
/// Route-sync cursor is not open
pub const ERR_NOT_ITER: i32 = 15;
/// Neighbor is already configured
pub const ERR_PEER_EXISTS: i32 = 16;
/// Invalid parameter
pub const ERR_PARAM: i32 = 100;

pub type DaemonResult<T> = Result<T, DaemonError>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DaemonError {
    #[error("Routing daemon is not connected")]
    NotConnected,
    #[error("Routing daemon call timed out")]
    Timeout,
    #[error("Transport error [{0}]")]
    Transport(String),
    #[error("Routing daemon rejected call with code {code}: {message}")]
    Rejected { code: i32, message: String },
}

impl DaemonError {
    pub fn rejected(code: i32) -> Self {
        DaemonError::Rejected {
            code,
            message: String::new(),
        }
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            DaemonError::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Starting a session that is already running confirms the desired state
    pub fn is_already_active(&self) -> bool {
        self.code() == Some(ERR_ACTIVE)
    }

    /// Adding a neighbor that already exists confirms the desired state
    pub fn is_peer_exists(&self) -> bool {
        self.code() == Some(ERR_PEER_EXISTS)
    }
}

/// Arguments for starting the daemon's BGP instance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionParams {
    pub asn: u32,
    pub router_id: IpAddr,
    pub keepalive: u16,
    pub hold_time: u16,
    pub stalepath_time: u32,
    pub advertise_fbit: bool,
}

impl From<&AsConfig> for SessionParams {
    fn from(config: &AsConfig) -> Self {
        Self {
            asn: config.asn,
            router_id: config.router_id,
            keepalive: config.keepalive,
            hold_time: config.hold_time,
            stalepath_time: config.stalepath_time,
            advertise_fbit: config.advertise_fbit,
        }
    }
}

/// One page of a route-sync cursor
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteBatch {
    pub routes: Vec<RouteAdvertisement>,
    // No more routes after this batch
    pub done: bool,
}

/// Configuration RPC surface of the external routing daemon.
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait RoutingDaemonClient: Send + Sync {
    async fn connect(&self, host: &str, port: u16) -> bool;
    async fn disconnect(&self);

    async fn start_session(&self, params: &SessionParams) -> DaemonResult<()>;
    async fn stop_session(&self, asn: u32) -> DaemonResult<()>;

    async fn add_neighbor(&self, address: IpAddr, remote_as: u32) -> DaemonResult<()>;
    async fn del_neighbor(&self, address: IpAddr) -> DaemonResult<()>;
    async fn add_update_source(&self, address: IpAddr, source: IpAddr) -> DaemonResult<()>;
    async fn del_update_source(&self, address: IpAddr) -> DaemonResult<()>;
    async fn add_multihop(&self, address: IpAddr, ttl: u8) -> DaemonResult<()>;
    async fn del_multihop(&self, address: IpAddr) -> DaemonResult<()>;
    async fn add_address_family(&self, address: IpAddr, family: AddressFamily)
        -> DaemonResult<()>;
    async fn del_address_family(&self, address: IpAddr, family: AddressFamily)
        -> DaemonResult<()>;

    async fn add_vrf(&self, vrf: &VrfConfig, family: AddressFamily) -> DaemonResult<()>;
    async fn del_vrf(&self, rd: &str, family: AddressFamily) -> DaemonResult<()>;
    async fn add_prefix(&self, network: &NetworkConfig) -> DaemonResult<()>;
    async fn del_prefix(&self, rd: &str, prefix: IpNetwork) -> DaemonResult<()>;

    async fn enable_multipath(&self, family: AddressFamily) -> DaemonResult<()>;
    async fn disable_multipath(&self, family: AddressFamily) -> DaemonResult<()>;
    async fn set_max_paths(&self, rd: &str, max_paths: u32) -> DaemonResult<()>;

    async fn add_graceful_restart(&self, stalepath_time: u32) -> DaemonResult<()>;
    async fn del_graceful_restart(&self) -> DaemonResult<()>;
    async fn set_logging(&self, logging: &LoggingConfig) -> DaemonResult<()>;
    async fn add_bfd(&self, bfd: &BfdConfig) -> DaemonResult<()>;
    async fn del_bfd(&self) -> DaemonResult<()>;

    async fn send_end_of_rib(&self) -> DaemonResult<()>;

    async fn open_route_sync(&self, family: AddressFamily) -> DaemonResult<()>;
    async fn next_route_batch(&self, family: AddressFamily) -> DaemonResult<RouteBatch>;
    async fn close_route_sync(&self, family: AddressFamily) -> DaemonResult<()>;
}
