mod family;
mod route;
mod update;

pub use family::{AddressFamily, ProtocolType, VrfLayer};
pub use route::{EncapType, MacRoute, PrefixNextHop, RouteKey, RouteOrigin, RouteRecord};
pub use update::{RouteAdvertisement, RouteWithdrawal};
