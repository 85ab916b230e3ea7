use std::net::IpAddr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use ipnetwork::IpNetwork;
use jsonrpsee::core::{Error as RpcError, RpcResult};
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::error::CallError;
use log::{debug, info, warn};

use super::{DaemonError, DaemonResult, RouteBatch, RoutingDaemonClient, SessionParams};
use crate::config::{BfdConfig, LoggingConfig, NetworkConfig, VrfConfig};
use crate::models::AddressFamily;

/// JSON-RPC methods exposed by the routing daemon's configuration service
#[rpc(client, namespace = "bgp")]
pub trait DaemonRpc {
    #[method(name = "ping")]
    async fn ping(&self) -> RpcResult<bool>;
    #[method(name = "start_session")]
    async fn start_session(&self, params: SessionParams) -> RpcResult<()>;
    #[method(name = "stop_session")]
    async fn stop_session(&self, asn: u32) -> RpcResult<()>;
    #[method(name = "add_neighbor")]
    async fn add_neighbor(&self, address: IpAddr, remote_as: u32) -> RpcResult<()>;
    #[method(name = "del_neighbor")]
    async fn del_neighbor(&self, address: IpAddr) -> RpcResult<()>;
    #[method(name = "add_update_source")]
    async fn add_update_source(&self, address: IpAddr, source: IpAddr) -> RpcResult<()>;
    #[method(name = "del_update_source")]
    async fn del_update_source(&self, address: IpAddr) -> RpcResult<()>;
    #[method(name = "add_multihop")]
    async fn add_multihop(&self, address: IpAddr, ttl: u8) -> RpcResult<()>;
    #[method(name = "del_multihop")]
    async fn del_multihop(&self, address: IpAddr) -> RpcResult<()>;
    #[method(name = "add_address_family")]
    async fn add_address_family(&self, address: IpAddr, family: AddressFamily) -> RpcResult<()>;
    #[method(name = "del_address_family")]
    async fn del_address_family(&self, address: IpAddr, family: AddressFamily) -> RpcResult<()>;
    #[method(name = "add_vrf")]
    async fn add_vrf(&self, vrf: VrfConfig, family: AddressFamily) -> RpcResult<()>;
    #[method(name = "del_vrf")]
    async fn del_vrf(&self, rd: String, family: AddressFamily) -> RpcResult<()>;
    #[method(name = "add_prefix")]
    async fn add_prefix(&self, network: NetworkConfig) -> RpcResult<()>;
    #[method(name = "del_prefix")]
    async fn del_prefix(&self, rd: String, prefix: IpNetwork) -> RpcResult<()>;
    #[method(name = "enable_multipath")]
    async fn enable_multipath(&self, family: AddressFamily) -> RpcResult<()>;
    #[method(name = "disable_multipath")]
    async fn disable_multipath(&self, family: AddressFamily) -> RpcResult<()>;
    #[method(name = "set_max_paths")]
    async fn set_max_paths(&self, rd: String, max_paths: u32) -> RpcResult<()>;
    #[method(name = "add_graceful_restart")]
    async fn add_graceful_restart(&self, stalepath_time: u32) -> RpcResult<()>;
    #[method(name = "del_graceful_restart")]
    async fn del_graceful_restart(&self) -> RpcResult<()>;
    #[method(name = "set_logging")]
    async fn set_logging(&self, logging: LoggingConfig) -> RpcResult<()>;
    #[method(name = "add_bfd")]
    async fn add_bfd(&self, bfd: BfdConfig) -> RpcResult<()>;
    #[method(name = "del_bfd")]
    async fn del_bfd(&self) -> RpcResult<()>;
    #[method(name = "send_end_of_rib")]
    async fn send_end_of_rib(&self) -> RpcResult<()>;
    #[method(name = "open_route_sync")]
    async fn open_route_sync(&self, family: AddressFamily) -> RpcResult<()>;
    #[method(name = "next_route_batch")]
    async fn next_route_batch(&self, family: AddressFamily) -> RpcResult<RouteBatch>;
    #[method(name = "close_route_sync")]
    async fn close_route_sync(&self, family: AddressFamily) -> RpcResult<()>;
}

fn to_daemon_error(err: RpcError) -> DaemonError {
    match err {
        RpcError::RequestTimeout => DaemonError::Timeout,
        RpcError::Call(CallError::Custom(object)) => DaemonError::Rejected {
            code: object.code(),
            message: object.message().to_string(),
        },
        other => DaemonError::Transport(other.to_string()),
    }
}

/// `RoutingDaemonClient` speaking JSON-RPC over HTTP to the daemon
pub struct JsonRpcDaemonClient {
    request_timeout: Duration,
    client: RwLock<Option<Arc<HttpClient>>>,
}

impl JsonRpcDaemonClient {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            request_timeout,
            client: RwLock::new(None),
        }
    }

    fn client(&self) -> DaemonResult<Arc<HttpClient>> {
        self.client
            .read()
            .ok()
            .and_then(|client| client.clone())
            .ok_or(DaemonError::NotConnected)
    }
}

#[async_trait]
impl RoutingDaemonClient for JsonRpcDaemonClient {
    async fn connect(&self, host: &str, port: u16) -> bool {
        let base = format!("http://{}:{}", host, port);
        let client = match HttpClientBuilder::default()
            .request_timeout(self.request_timeout)
            .build(&base)
        {
            Ok(client) => client,
            Err(err) => {
                warn!("Invalid routing daemon endpoint {}: {}", base, err);
                return false;
            }
        };
        match DaemonRpcClient::ping(&client).await {
            Ok(_) => {
                info!("Connected to routing daemon at {}", base);
                if let Ok(mut slot) = self.client.write() {
                    *slot = Some(Arc::new(client));
                }
                true
            }
            Err(err) => {
                debug!("Routing daemon at {} unreachable: {}", base, err);
                false
            }
        }
    }

    async fn disconnect(&self) {
        if let Ok(mut slot) = self.client.write() {
            if slot.take().is_some() {
                info!("Disconnected from routing daemon");
            }
        }
    }

    async fn start_session(&self, params: &SessionParams) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::start_session(&*client, params.clone())
            .await
            .map_err(to_daemon_error)
    }

    async fn stop_session(&self, asn: u32) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::stop_session(&*client, asn)
            .await
            .map_err(to_daemon_error)
    }

    async fn add_neighbor(&self, address: IpAddr, remote_as: u32) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::add_neighbor(&*client, address, remote_as)
            .await
            .map_err(to_daemon_error)
    }

    async fn del_neighbor(&self, address: IpAddr) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::del_neighbor(&*client, address)
            .await
            .map_err(to_daemon_error)
    }

    async fn add_update_source(&self, address: IpAddr, source: IpAddr) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::add_update_source(&*client, address, source)
            .await
            .map_err(to_daemon_error)
    }

    async fn del_update_source(&self, address: IpAddr) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::del_update_source(&*client, address)
            .await
            .map_err(to_daemon_error)
    }

    async fn add_multihop(&self, address: IpAddr, ttl: u8) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::add_multihop(&*client, address, ttl)
            .await
            .map_err(to_daemon_error)
    }

    async fn del_multihop(&self, address: IpAddr) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::del_multihop(&*client, address)
            .await
            .map_err(to_daemon_error)
    }

    async fn add_address_family(
        &self,
        address: IpAddr,
        family: AddressFamily,
    ) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::add_address_family(&*client, address, family)
            .await
            .map_err(to_daemon_error)
    }

    async fn del_address_family(
        &self,
        address: IpAddr,
        family: AddressFamily,
    ) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::del_address_family(&*client, address, family)
            .await
            .map_err(to_daemon_error)
    }

    async fn add_vrf(&self, vrf: &VrfConfig, family: AddressFamily) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::add_vrf(&*client, vrf.clone(), family)
            .await
            .map_err(to_daemon_error)
    }

    async fn del_vrf(&self, rd: &str, family: AddressFamily) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::del_vrf(&*client, rd.to_owned(), family)
            .await
            .map_err(to_daemon_error)
    }

    async fn add_prefix(&self, network: &NetworkConfig) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::add_prefix(&*client, network.clone())
            .await
            .map_err(to_daemon_error)
    }

    async fn del_prefix(&self, rd: &str, prefix: IpNetwork) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::del_prefix(&*client, rd.to_owned(), prefix)
            .await
            .map_err(to_daemon_error)
    }

    async fn enable_multipath(&self, family: AddressFamily) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::enable_multipath(&*client, family)
            .await
            .map_err(to_daemon_error)
    }

    async fn disable_multipath(&self, family: AddressFamily) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::disable_multipath(&*client, family)
            .await
            .map_err(to_daemon_error)
    }

    async fn set_max_paths(&self, rd: &str, max_paths: u32) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::set_max_paths(&*client, rd.to_owned(), max_paths)
            .await
            .map_err(to_daemon_error)
    }

    async fn add_graceful_restart(&self, stalepath_time: u32) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::add_graceful_restart(&*client, stalepath_time)
            .await
            .map_err(to_daemon_error)
    }

    async fn del_graceful_restart(&self) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::del_graceful_restart(&*client)
            .await
            .map_err(to_daemon_error)
    }

    async fn set_logging(&self, logging: &LoggingConfig) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::set_logging(&*client, logging.clone())
            .await
            .map_err(to_daemon_error)
    }

    async fn add_bfd(&self, bfd: &BfdConfig) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::add_bfd(&*client, bfd.clone())
            .await
            .map_err(to_daemon_error)
    }

    async fn del_bfd(&self) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::del_bfd(&*client)
            .await
            .map_err(to_daemon_error)
    }

    async fn send_end_of_rib(&self) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::send_end_of_rib(&*client)
            .await
            .map_err(to_daemon_error)
    }

    async fn open_route_sync(&self, family: AddressFamily) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::open_route_sync(&*client, family)
            .await
            .map_err(to_daemon_error)
    }

    async fn next_route_batch(&self, family: AddressFamily) -> DaemonResult<RouteBatch> {
        let client = self.client()?;
        DaemonRpcClient::next_route_batch(&*client, family)
            .await
            .map_err(to_daemon_error)
    }

    async fn close_route_sync(&self, family: AddressFamily) -> DaemonResult<()> {
        let client = self.client()?;
        DaemonRpcClient::close_route_sync(&*client, family)
            .await
            .map_err(to_daemon_error)
    }
}
