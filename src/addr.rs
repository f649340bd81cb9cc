//! Address translator: turns `RTM_NEWADDR`/`RTM_DELADDR` records into
//! [`AddressBinding`] values. IPv6 and secondary addresses are filtered out
//! here (non-goals); everything else about the surrounding interface comes
//! from whatever `InterfaceTable` the caller already has.

use std::net::Ipv4Addr;

use crate::attr::AttrTable;
use crate::contracts::InterfaceTable;
use crate::message::{
    IfAddrMsg, AF_INET, IFA_ADDRESS, IFA_BROADCAST, IFA_F_SECONDARY, IFA_LOCAL, RTM_DELADDR,
    RTM_NEWADDR,
};
use crate::model::{AddressBinding, InterfaceFlags};

/// Every prefix length in [0,32] except 31 is valid; an unnumbered
/// (point-to-point) interface additionally requires exactly 32.
fn prefix_len_valid(prefix_len: u8, unnumbered: bool) -> bool {
    if prefix_len == 31 || prefix_len > 32 {
        return false;
    }
    !unnumbered || prefix_len == 32
}

fn deleted_binding(iface_index: u32) -> AddressBinding {
    AddressBinding { iface_index, address: Ipv4Addr::UNSPECIFIED, prefix_len: 0, opposite: None }
}

pub fn parse_addr(header: &IfAddrMsg, attrs: &AttrTable, iface_table: &impl InterfaceTable) -> Option<AddressBinding> {
    if header.ifa_family != AF_INET {
        return None;
    }
    if header.ifa_flags & IFA_F_SECONDARY != 0 {
        log::debug!("netlink: ignoring secondary address on interface {}", header.ifa_index);
        return None;
    }

    let local = attrs.get(IFA_LOCAL).and_then(|a| a.as_ipv4());
    let peer = attrs.get(IFA_ADDRESS).and_then(|a| a.as_ipv4());
    let (local, peer) = match (local, peer) {
        (Some(l), Some(p)) => (l, p),
        _ => {
            log::error!("netlink: address on interface {} missing mandatory ADDRESS/LOCAL TLV", header.ifa_index);
            return None;
        }
    };

    let iface = match iface_table.by_index(header.ifa_index) {
        Some(iface) => iface,
        None => {
            log::error!("netlink: address on unknown interface {}, dropped", header.ifa_index);
            return None;
        }
    };

    let unnumbered = iface.flags.contains(InterfaceFlags::UNNUMBERED);
    if !prefix_len_valid(header.ifa_prefixlen, unnumbered) {
        log::warn!(
            "netlink: address on interface {} has invalid prefix length {}, treating as deletion",
            header.ifa_index,
            header.ifa_prefixlen
        );
        return Some(deleted_binding(header.ifa_index));
    }

    let opposite = if unnumbered {
        Some(peer)
    } else if iface.flags.contains(InterfaceFlags::BROADCAST) {
        attrs.get(IFA_BROADCAST).and_then(|a| a.as_ipv4())
    } else {
        None
    };

    Some(AddressBinding { iface_index: header.ifa_index, address: local, prefix_len: header.ifa_prefixlen, opposite })
}

#[derive(Debug, Clone)]
pub enum AddrEvent {
    Bound(AddressBinding),
    Unbound { iface_index: u32, address: Ipv4Addr, prefix_len: u8 },
}

pub fn handle_addr_message(
    msg_type: u16,
    header: &IfAddrMsg,
    attrs: &AttrTable,
    iface_table: &impl InterfaceTable,
) -> Option<AddrEvent> {
    match msg_type {
        RTM_NEWADDR => parse_addr(header, attrs, iface_table).map(AddrEvent::Bound),
        RTM_DELADDR => {
            let address = attrs
                .get(IFA_LOCAL)
                .and_then(|a| a.as_ipv4())
                .or_else(|| attrs.get(IFA_ADDRESS).and_then(|a| a.as_ipv4()))?;
            Some(AddrEvent::Unbound { iface_index: header.ifa_index, address, prefix_len: header.ifa_prefixlen })
        }
        other => {
            log::debug!("netlink: unhandled address message type {other}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::AttrWriter;
    use crate::contracts::testutil::FakeInterfaceTable;
    use crate::message::IFA_MAX;
    use crate::model::Interface;

    fn header(prefixlen: u8, flags: u8) -> IfAddrMsg {
        IfAddrMsg { ifa_family: AF_INET, ifa_prefixlen: prefixlen, ifa_flags: flags, ifa_scope: 0, ifa_index: 1 }
    }

    fn broadcast_buf() -> Vec<u8> {
        let mut buf = Vec::new();
        let mut w = AttrWriter::new(&mut buf);
        w.push_ipv4(IFA_LOCAL, Ipv4Addr::new(192, 0, 2, 1));
        w.push_ipv4(IFA_ADDRESS, Ipv4Addr::new(192, 0, 2, 1));
        w.push_ipv4(IFA_BROADCAST, Ipv4Addr::new(192, 0, 2, 255));
        buf
    }

    fn table_with(iface: Interface) -> FakeInterfaceTable {
        let mut table = FakeInterfaceTable::default();
        table.by_index.insert(iface.index, iface);
        table
    }

    #[test]
    fn prefix_length_zero_and_thirty_two_are_accepted_on_a_broadcast_link() {
        for len in [0u8, 32] {
            let buf = broadcast_buf();
            let attrs = AttrTable::parse(&buf, IFA_MAX);
            let table = table_with(Interface { index: 1, name: "eth0".into(), mtu: 1500, flags: InterfaceFlags::BROADCAST });
            let binding = parse_addr(&header(len, 0), &attrs, &table).unwrap();
            assert_eq!(binding.prefix_len, len, "prefix len {len} should be accepted");
        }
    }

    #[test]
    fn prefix_length_thirty_one_is_treated_as_deletion() {
        let buf = broadcast_buf();
        let attrs = AttrTable::parse(&buf, IFA_MAX);
        let table = table_with(Interface { index: 1, name: "eth0".into(), mtu: 1500, flags: InterfaceFlags::BROADCAST });
        let binding = parse_addr(&header(31, 0), &attrs, &table).unwrap();
        assert_eq!(binding.prefix_len, 0);
        assert_eq!(binding.opposite, None);
    }

    #[test]
    fn prefix_length_above_32_is_treated_as_deletion() {
        let buf = broadcast_buf();
        let attrs = AttrTable::parse(&buf, IFA_MAX);
        let table = table_with(Interface { index: 1, name: "eth0".into(), mtu: 1500, flags: InterfaceFlags::BROADCAST });
        let binding = parse_addr(&header(33, 0), &attrs, &table).unwrap();
        assert_eq!(binding.prefix_len, 0);
    }

    #[test]
    fn unnumbered_interface_with_prefix_len_other_than_32_is_treated_as_deletion() {
        let mut buf = Vec::new();
        {
            let mut w = AttrWriter::new(&mut buf);
            w.push_ipv4(IFA_LOCAL, Ipv4Addr::new(10, 0, 0, 1));
            w.push_ipv4(IFA_ADDRESS, Ipv4Addr::new(10, 0, 0, 2));
        }
        let attrs = AttrTable::parse(&buf, IFA_MAX);
        let table = table_with(Interface { index: 1, name: "tun0".into(), mtu: 1400, flags: InterfaceFlags::UNNUMBERED });
        let binding = parse_addr(&header(24, 0), &attrs, &table).unwrap();
        assert_eq!(binding.prefix_len, 0);
        assert_eq!(binding.opposite, None);
    }

    #[test]
    fn missing_mandatory_tlv_is_dropped() {
        let mut buf = Vec::new();
        AttrWriter::new(&mut buf).push_ipv4(IFA_LOCAL, Ipv4Addr::new(10, 0, 0, 1));
        let attrs = AttrTable::parse(&buf, IFA_MAX);
        let table = table_with(Interface { index: 1, name: "eth0".into(), mtu: 1500, flags: InterfaceFlags::BROADCAST });
        assert!(parse_addr(&header(24, 0), &attrs, &table).is_none());
    }

    #[test]
    fn unknown_parent_interface_is_dropped() {
        let buf = broadcast_buf();
        let attrs = AttrTable::parse(&buf, IFA_MAX);
        let table = FakeInterfaceTable::default();
        assert!(parse_addr(&header(24, 0), &attrs, &table).is_none());
    }

    #[test]
    fn secondary_address_is_dropped() {
        let buf = broadcast_buf();
        let attrs = AttrTable::parse(&buf, IFA_MAX);
        let table = table_with(Interface { index: 1, name: "eth0".into(), mtu: 1500, flags: InterfaceFlags::BROADCAST });
        assert!(parse_addr(&header(24, IFA_F_SECONDARY), &attrs, &table).is_none());
    }

    #[test]
    fn broadcast_interface_uses_broadcast_attr_as_opposite() {
        let buf = broadcast_buf();
        let attrs = AttrTable::parse(&buf, IFA_MAX);
        let table = table_with(Interface { index: 1, name: "eth0".into(), mtu: 1500, flags: InterfaceFlags::BROADCAST });
        let binding = parse_addr(&header(24, 0), &attrs, &table).unwrap();
        assert_eq!(binding.address, Ipv4Addr::new(192, 0, 2, 1));
        assert_eq!(binding.opposite, Some(Ipv4Addr::new(192, 0, 2, 255)));
    }

    #[test]
    fn address_bind_scenario_derives_slash_24_prefix() {
        let mut buf = Vec::new();
        {
            let mut w = AttrWriter::new(&mut buf);
            w.push_ipv4(IFA_LOCAL, Ipv4Addr::new(10, 0, 0, 1));
            w.push_ipv4(IFA_ADDRESS, Ipv4Addr::new(10, 0, 0, 1));
            w.push_ipv4(IFA_BROADCAST, Ipv4Addr::new(10, 0, 0, 255));
        }
        let attrs = AttrTable::parse(&buf, IFA_MAX);
        let header = IfAddrMsg { ifa_family: AF_INET, ifa_prefixlen: 24, ifa_flags: 0, ifa_scope: 0, ifa_index: 2 };
        let table = table_with(Interface { index: 2, name: "eth0".into(), mtu: 1500, flags: InterfaceFlags::BROADCAST });
        let binding = parse_addr(&header, &attrs, &table).unwrap();
        assert_eq!(binding.prefix(), Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(binding.opposite, Some(Ipv4Addr::new(10, 0, 0, 255)));
    }

    #[test]
    fn unnumbered_interface_uses_peer_address_as_opposite() {
        let mut buf = Vec::new();
        {
            let mut w = AttrWriter::new(&mut buf);
            w.push_ipv4(IFA_LOCAL, Ipv4Addr::new(10, 0, 0, 1));
            w.push_ipv4(IFA_ADDRESS, Ipv4Addr::new(10, 0, 0, 2));
        }
        let attrs = AttrTable::parse(&buf, IFA_MAX);
        let table = table_with(Interface { index: 1, name: "tun0".into(), mtu: 1400, flags: InterfaceFlags::UNNUMBERED });
        let binding = parse_addr(&header(32, 0), &attrs, &table).unwrap();
        assert_eq!(binding.address, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(binding.opposite, Some(Ipv4Addr::new(10, 0, 0, 2)));
    }
}
