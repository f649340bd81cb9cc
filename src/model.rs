//! Abstract records the translators produce and the route emitter consumes.
//! These are the crate's boundary types: independent of wire layout, kept
//! deliberately small enough to hand to an external RIB/interface table.

use std::net::Ipv4Addr;

use bitflags::bitflags;

bitflags! {
    /// Abstract interface state, derived from `ifi_flags` by the link
    /// translator. Bit meanings are the crate's own, not the kernel's.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InterfaceFlags: u32 {
        const LINK_UP        = 0x01;
        const ADMIN_DOWN     = 0x02;
        const LOOPBACK       = 0x04;
        const BROADCAST      = 0x08;
        const MULTICAST      = 0x10;
        const UNNUMBERED     = 0x20;
        /// Interface should not be published to the RIB/interface table at
        /// all (set alongside LOOPBACK, per the link translator's mapping).
        const IGNORE         = 0x40;
    }
}

#[derive(Debug, Clone)]
pub struct Interface {
    pub index: u32,
    pub name: String,
    pub mtu: u32,
    pub flags: InterfaceFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteKey(pub Ipv4Addr, pub u8);

#[derive(Debug, Clone)]
pub struct AddressBinding {
    pub iface_index: u32,
    pub address: Ipv4Addr,
    pub prefix_len: u8,
    /// The peer address of a point-to-point/unnumbered link, or the
    /// broadcast address of a broadcast-capable one; `None` for neither.
    pub opposite: Option<Ipv4Addr>,
}

impl AddressBinding {
    /// `address & netmask(prefix_len)`, derived rather than stored — the
    /// one case a prefix length of 0 legitimately yields `0.0.0.0/0`.
    pub fn prefix(&self) -> Ipv4Addr {
        let mask: u32 = if self.prefix_len == 0 { 0 } else { !0u32 << (32 - self.prefix_len as u32) };
        Ipv4Addr::from(u32::from(self.address) & mask)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSource {
    Kernel,
    Redirect,
    /// Originated by this daemon's own previous netlink writes.
    SelfOriginated,
    Other(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDest {
    /// Unicast via a next-hop gateway, plus the outgoing interface adopted
    /// from the neighbor table (or, failing that, the temporary-interface
    /// cache on `RTA_OIF`).
    Router(Ipv4Addr, u32),
    /// Unicast directly out an interface (on-link / device route).
    Device(u32),
    Blackhole,
    Unreachable,
    Prohibit,
}

#[derive(Debug, Clone)]
pub struct Route {
    pub key: RouteKey,
    pub dest: RouteDest,
    pub source: RouteSource,
    pub table: u8,
}
