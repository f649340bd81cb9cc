//! `rtnl_sync` — the netlink protocol engine for mirroring a routing
//! daemon's RIB into the Linux kernel's main IPv4 FIB.
//!
//! This crate owns nothing but the wire: frame transport, the TLV attribute
//! codec, the request/reply engine, the link/address/route translators, and
//! the asynchronous multicast dispatcher. The RIB, the interface table and
//! the neighbor cache are external collaborators, expressed as the traits
//! in [`contracts`]. Everything here talks `NETLINK_ROUTE` over a raw
//! socket and nothing else; there is no CLI, no config file, and no event
//! loop beyond the suspension points [`sync::Synchronizer`] exposes.

pub mod addr;
pub mod attr;
pub mod contracts;
pub mod dispatch;
pub mod error;
pub mod iface;
pub mod message;
pub mod model;
pub mod reply;
pub mod route;
pub mod sync;
pub mod transport;

pub use contracts::{InterfaceTable, NeighborTable, Neighbor, RibSink};
pub use error::{NetlinkError, Result};
pub use model::{AddressBinding, Interface, InterfaceFlags, Route, RouteDest, RouteKey, RouteSource};
pub use sync::Synchronizer;
