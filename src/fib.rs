//! Forwarding database and overlay-membership seams.
//!
//! The reconciler owns route records; implementations of these traits only
//! see write and delete commands.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::sync::RwLock;

use ipnetwork::IpNetwork;
use log::trace;
use thiserror::Error;

use crate::models::{MacRoute, RouteKey, RouteRecord};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FibError {
    #[error("Forwarding database unavailable: {0}")]
    Unavailable(String),
}

pub type FibResult<T> = Result<T, FibError>;

pub trait FibWriter: Send + Sync {
    /// Snapshot of every route currently programmed
    fn routes(&self) -> FibResult<Vec<RouteRecord>>;
    /// Whether a path is programmed, or any path for the prefix when
    /// `next_hop` is None
    fn contains_route(
        &self,
        rd: &str,
        prefix: &IpNetwork,
        next_hop: Option<&IpAddr>,
    ) -> FibResult<bool>;
    fn write_route(&self, route: &RouteRecord) -> FibResult<()>;
    /// Remove every path for a prefix
    fn delete_route(&self, rd: &str, prefix: &IpNetwork) -> FibResult<()>;
    fn delete_route_path(&self, rd: &str, prefix: &IpNetwork, next_hop: &IpAddr) -> FibResult<()>;
    fn write_mac_route(&self, route: &MacRoute) -> FibResult<()>;
    fn delete_mac_route(&self, rd: &str, mac: &str) -> FibResult<()>;
}

/// Tracks which remote tunnel endpoints take part in an L2 overlay
pub trait OverlayMembership: Send + Sync {
    fn add_remote_endpoint(&self, rd: &str, endpoint: IpAddr);
    fn remove_remote_endpoint(&self, rd: &str, endpoint: IpAddr);
}

fn poisoned() -> FibError {
    FibError::Unavailable("lock poisoned".to_string())
}

/// Process-local forwarding database
#[derive(Debug, Default)]
pub struct MemoryFib {
    routes: RwLock<BTreeMap<RouteKey, RouteRecord>>,
    macs: RwLock<BTreeMap<(String, String), MacRoute>>,
    endpoints: RwLock<BTreeSet<(String, IpAddr)>>,
}

impl MemoryFib {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with routes already programmed before the reconciler started
    pub fn with_routes(routes: Vec<RouteRecord>) -> Self {
        let fib = Self::default();
        if let Ok(mut table) = fib.routes.write() {
            table.extend(routes.into_iter().map(|r| (r.key.clone(), r)));
        }
        fib
    }

    pub fn mac_routes(&self) -> Vec<MacRoute> {
        self.macs
            .read()
            .map(|macs| macs.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn remote_endpoints(&self) -> Vec<(String, IpAddr)> {
        self.endpoints
            .read()
            .map(|eps| eps.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl FibWriter for MemoryFib {
    fn routes(&self) -> FibResult<Vec<RouteRecord>> {
        let routes = self.routes.read().map_err(|_| poisoned())?;
        Ok(routes.values().cloned().collect())
    }

    fn contains_route(
        &self,
        rd: &str,
        prefix: &IpNetwork,
        next_hop: Option<&IpAddr>,
    ) -> FibResult<bool> {
        let routes = self.routes.read().map_err(|_| poisoned())?;
        let found = match next_hop {
            Some(next_hop) => routes.contains_key(&RouteKey::new(rd, *prefix, *next_hop)),
            None => routes
                .keys()
                .any(|key| key.rd() == rd && key.prefix() == *prefix),
        };
        Ok(found)
    }

    fn write_route(&self, route: &RouteRecord) -> FibResult<()> {
        trace!("FIB write {}", route);
        let mut routes = self.routes.write().map_err(|_| poisoned())?;
        routes.insert(route.key.clone(), route.clone());
        Ok(())
    }

    fn delete_route(&self, rd: &str, prefix: &IpNetwork) -> FibResult<()> {
        trace!("FIB delete [{}] {}", rd, prefix);
        let mut routes = self.routes.write().map_err(|_| poisoned())?;
        routes.retain(|key, _| !(key.rd() == rd && key.prefix() == *prefix));
        Ok(())
    }

    fn delete_route_path(&self, rd: &str, prefix: &IpNetwork, next_hop: &IpAddr) -> FibResult<()> {
        trace!("FIB delete [{}] {}:{}", rd, prefix, next_hop);
        let mut routes = self.routes.write().map_err(|_| poisoned())?;
        routes.remove(&RouteKey::new(rd, *prefix, *next_hop));
        Ok(())
    }

    fn write_mac_route(&self, route: &MacRoute) -> FibResult<()> {
        trace!("FIB write MAC [{}] {} via {}", route.rd, route.mac, route.tunnel_endpoint);
        let mut macs = self.macs.write().map_err(|_| poisoned())?;
        macs.insert((route.rd.clone(), route.mac.clone()), route.clone());
        Ok(())
    }

    fn delete_mac_route(&self, rd: &str, mac: &str) -> FibResult<()> {
        trace!("FIB delete MAC [{}] {}", rd, mac);
        let mut macs = self.macs.write().map_err(|_| poisoned())?;
        macs.remove(&(rd.to_owned(), mac.to_owned()));
        Ok(())
    }
}

impl OverlayMembership for MemoryFib {
    fn add_remote_endpoint(&self, rd: &str, endpoint: IpAddr) {
        if let Ok(mut eps) = self.endpoints.write() {
            eps.insert((rd.to_owned(), endpoint));
        }
    }

    fn remove_remote_endpoint(&self, rd: &str, endpoint: IpAddr) {
        if let Ok(mut eps) = self.endpoints.write() {
            eps.remove(&(rd.to_owned(), endpoint));
        }
    }
}
