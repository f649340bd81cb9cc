//! Link translator: turns `RTM_NEWLINK`/`RTM_DELLINK` records into
//! [`Interface`] values, and the temporary-interface cache that lets the
//! route translator resolve a device route's interface before the real
//! interface table has seen that index (breaking the scan-order cycle
//! between links and routes within a single cold scan).

use std::collections::HashMap;

use crate::attr::AttrTable;
use crate::contracts::InterfaceTable;
use crate::message::{
    IfInfoMsg, IFF_BROADCAST, IFF_LOOPBACK, IFF_POINTOPOINT, IFF_UP, IFLA_IFNAME, IFLA_MAX,
    IFLA_MTU, RTM_DELLINK, RTM_NEWLINK,
};
use crate::model::{Interface, InterfaceFlags};

/// Translates one `ifinfomsg` + attribute table into an abstract
/// [`Interface`]. Returns `None` if the mandatory `IFLA_IFNAME` (at least 2
/// bytes, NUL included) or `IFLA_MTU` (exactly 4 bytes) attribute is absent
/// or malformed — such a record cannot be published and the caller should
/// log and drop it, never synthesize a name or a default MTU.
pub fn parse_link(header: &IfInfoMsg, attrs: &AttrTable) -> Option<Interface> {
    let name_attr = attrs.get(IFLA_IFNAME)?;
    if name_attr.as_bytes().len() < 2 {
        return None;
    }
    let name = name_attr.as_cstr()?.to_string();

    let mtu_attr = attrs.get(IFLA_MTU)?;
    if mtu_attr.as_bytes().len() != 4 {
        return None;
    }
    let mtu = mtu_attr.as_u32()?;

    let mut flags = InterfaceFlags::empty();
    if header.ifi_flags & IFF_UP != 0 {
        flags |= InterfaceFlags::LINK_UP;
    } else {
        flags |= InterfaceFlags::ADMIN_DOWN;
    }
    if header.ifi_flags & IFF_LOOPBACK != 0 {
        flags |= InterfaceFlags::LOOPBACK | InterfaceFlags::IGNORE;
    }
    if header.ifi_flags & IFF_BROADCAST != 0 {
        flags |= InterfaceFlags::BROADCAST | InterfaceFlags::MULTICAST;
    }
    if header.ifi_flags & IFF_POINTOPOINT != 0 {
        flags |= InterfaceFlags::UNNUMBERED | InterfaceFlags::MULTICAST;
    }

    Some(Interface { index: header.ifi_index as u32, name, mtu, flags })
}

pub const ATTR_TABLE_SIZE: u16 = IFLA_MAX;

/// Handles one link record in either scan or async context. `scan` selects
/// between cold-scan semantics (a `DELLINK` seen mid-scan is a kernel
/// artifact of interface churn during enumeration, not a real removal, and
/// is ignored) and async semantics (a `DELLINK` is a live removal).
/// Publishing is the only write this module performs on the interface
/// table; removal is the interface table's own business (spec non-goal).
pub fn handle_link_message(
    msg_type: u16,
    scan: bool,
    header: &IfInfoMsg,
    attrs: &AttrTable,
    table: &mut impl InterfaceTable,
) {
    match msg_type {
        RTM_NEWLINK => match parse_link(header, attrs) {
            Some(iface) => table.publish(iface),
            None => log::warn!("netlink: link record index {} missing mandatory attributes, dropped", header.ifi_index),
        },
        RTM_DELLINK => {
            if scan {
                log::debug!("netlink: ignoring DELLINK during scan (index {})", header.ifi_index);
            } else {
                let index = header.ifi_index as u32;
                match table.by_index(index) {
                    Some(mut iface) => {
                        iface.flags.remove(InterfaceFlags::LINK_UP);
                        iface.flags.insert(InterfaceFlags::ADMIN_DOWN);
                        table.publish(iface);
                    }
                    None => log::debug!("netlink: DELLINK for unknown interface {index}, ignored"),
                }
            }
        }
        other => log::debug!("netlink: unhandled link message type {other}"),
    }
}

/// Append-only cache of interfaces seen so far during the current scan,
/// keyed by kernel index. Exists purely to let a route resolve its
/// outgoing interface when the link dump for that index hasn't been
/// processed yet by the real interface table (kernel dump ordering between
/// link and route tables is not guaranteed). Cleared at the start of every
/// scan by its owner.
#[derive(Default)]
pub struct TempIfaceCache {
    entries: HashMap<u32, Interface>,
}

impl TempIfaceCache {
    pub fn insert(&mut self, iface: Interface) {
        self.entries.insert(iface.index, iface);
    }

    pub fn get(&self, index: u32) -> Option<&Interface> {
        self.entries.get(&index)
    }

    /// Returns the entry for `index`, creating a bare stand-in (no name, no
    /// MTU, no flags) if one isn't cached yet. Mirrors the original's
    /// `krt_temp_iface`, which always hands back a usable interface pointer
    /// for a route's outgoing index rather than failing the route when the
    /// link dump hasn't reached that index yet.
    pub fn get_or_create(&mut self, index: u32) -> &Interface {
        self.entries.entry(index).or_insert_with(|| Interface {
            index,
            name: String::new(),
            mtu: 0,
            flags: InterfaceFlags::empty(),
        })
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
