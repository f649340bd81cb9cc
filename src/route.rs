//! Route translator and route emitter: the pair that keeps the daemon's RIB
//! and the kernel's main IPv4 FIB in sync. Non-main tables, nonzero TOS and
//! IPv6 are filtered out at the door — they remain this crate's non-goals.

use std::net::Ipv4Addr;

use crate::attr::{AttrTable, AttrWriter};
use crate::contracts::{InterfaceTable, NeighborTable};
use crate::error::Result;
use crate::iface::TempIfaceCache;
use crate::message::{
    as_bytes, AF_INET, RTA_DST, RTA_GATEWAY, RTA_MAX, RTA_OIF, RTM_DELROUTE, RTM_NEWROUTE,
    RTN_BLACKHOLE, RTN_PROHIBIT, RTN_UNICAST, RTN_UNREACHABLE, RTPROT_KERNEL, RTPROT_REDIRECT,
    RTPROT_SELF, RT_SCOPE_UNIVERSE, RT_TABLE_MAIN, RtMsg,
};
use crate::model::{Route, RouteDest, RouteKey, RouteSource};
use crate::reply::exchange;
use crate::transport::NetlinkSocket;

pub const ATTR_TABLE_SIZE: u16 = RTA_MAX;

/// Translates one `rtmsg` + attribute table into an abstract [`Route`].
/// Returns `None` whenever the record falls outside this crate's scope
/// (wrong family, non-main table, nonzero TOS, a route type we don't carry
/// to the RIB) or can't be resolved into a usable destination.
pub fn parse_route(
    header: &RtMsg,
    attrs: &AttrTable,
    msg_type: u16,
    scan: bool,
    neighbors: &impl NeighborTable,
    temp_cache: &mut TempIfaceCache,
) -> Option<Route> {
    if header.rtm_family != AF_INET {
        return None;
    }
    if header.rtm_table != RT_TABLE_MAIN {
        log::debug!("netlink: ignoring route in non-main table {}", header.rtm_table);
        return None;
    }
    if header.rtm_tos != 0 {
        log::debug!("netlink: ignoring route with nonzero TOS {}", header.rtm_tos);
        return None;
    }
    if msg_type == RTM_DELROUTE && scan {
        log::debug!("netlink: ignoring DELROUTE seen during a scan dump");
        return None;
    }

    if header.rtm_protocol == RTPROT_KERNEL {
        log::debug!("netlink: ignoring kernel-installed route (attached network route)");
        return None;
    }
    if header.rtm_protocol == RTPROT_SELF && !scan {
        log::debug!("netlink: ignoring async echo of a self-originated route");
        return None;
    }

    let dst = attrs.get(RTA_DST).and_then(|a| a.as_ipv4()).unwrap_or(Ipv4Addr::UNSPECIFIED);
    let key = RouteKey(dst, header.rtm_dst_len);

    let source = match header.rtm_protocol {
        RTPROT_REDIRECT => RouteSource::Redirect,
        RTPROT_SELF => RouteSource::SelfOriginated,
        other => RouteSource::Other(other),
    };

    let dest = match header.rtm_type {
        RTN_UNICAST => {
            let gateway = attrs.get(RTA_GATEWAY).and_then(|a| a.as_ipv4());
            let oif = match attrs.get(RTA_OIF).and_then(|a| a.as_u32()) {
                Some(oif) => oif,
                None => {
                    log::error!("netlink: unicast route {key:?} has no outgoing interface, dropped");
                    return None;
                }
            };
            match gateway {
                Some(gw) => match neighbors.find(gw) {
                    Some(neighbor) => RouteDest::Router(gw, neighbor.iface_index),
                    None => {
                        log::warn!("netlink: gateway {gw} for route {key:?} is not a known neighbor, falling back to interface");
                        RouteDest::Router(gw, temp_cache.get_or_create(oif).index)
                    }
                },
                None => RouteDest::Device(temp_cache.get_or_create(oif).index),
            }
        }
        RTN_BLACKHOLE => RouteDest::Blackhole,
        RTN_UNREACHABLE => RouteDest::Unreachable,
        RTN_PROHIBIT => RouteDest::Prohibit,
        other => {
            log::debug!("netlink: ignoring route type {other} (throw/multicast/nat/xresolve are out of scope)");
            return None;
        }
    };

    Some(Route { key, dest, source, table: header.rtm_table })
}

/// Whether a route's destination can be expressed back to the kernel at
/// all. Every variant [`RouteDest`] carries today is emittable; the check
/// exists as the single choke point a future destination kind (multipath,
/// a routing-table cross-reference) would have to pass before reaching
/// `build_route_body`.
pub fn is_emittable(route: &Route) -> bool {
    matches!(
        route.dest,
        RouteDest::Router(_, _) | RouteDest::Device(_) | RouteDest::Blackhole | RouteDest::Unreachable | RouteDest::Prohibit
    )
}

fn route_type(dest: &RouteDest) -> u8 {
    match dest {
        RouteDest::Router(_, _) | RouteDest::Device(_) => RTN_UNICAST,
        RouteDest::Blackhole => RTN_BLACKHOLE,
        RouteDest::Unreachable => RTN_UNREACHABLE,
        RouteDest::Prohibit => RTN_PROHIBIT,
    }
}

/// Whether the kernel has already purged `route` on its own (its outgoing
/// interface went down or disappeared), per spec.md §4.7's "unless its
/// interface has already gone down" withdrawal clause. Destinations with no
/// interface of their own (blackhole/unreachable/prohibit) are never
/// auto-purged this way, so they always need an explicit delete.
fn route_iface_already_gone(route: &Route, iface_table: &impl InterfaceTable) -> bool {
    let index = match route.dest {
        RouteDest::Router(_, index) | RouteDest::Device(index) => index,
        RouteDest::Blackhole | RouteDest::Unreachable | RouteDest::Prohibit => return false,
    };
    match iface_table.by_index(index) {
        Some(iface) => iface.flags.contains(crate::model::InterfaceFlags::ADMIN_DOWN),
        None => true,
    }
}

pub fn build_route_body(route: &Route) -> Vec<u8> {
    let header = RtMsg {
        rtm_family: AF_INET,
        rtm_dst_len: route.key.1,
        rtm_src_len: 0,
        rtm_tos: 0,
        rtm_table: route.table,
        rtm_protocol: RTPROT_SELF,
        rtm_scope: RT_SCOPE_UNIVERSE,
        rtm_type: route_type(&route.dest),
        rtm_flags: 0,
    };

    let mut body = Vec::new();
    body.extend_from_slice(unsafe { as_bytes(&header) });

    let mut writer = AttrWriter::new(&mut body);
    if route.key.1 > 0 {
        writer.push_ipv4(RTA_DST, route.key.0);
    }
    match route.dest {
        RouteDest::Router(gw, _) => writer.push_ipv4(RTA_GATEWAY, gw),
        RouteDest::Device(idx) => writer.push_u32(RTA_OIF, idx),
        RouteDest::Blackhole | RouteDest::Unreachable | RouteDest::Prohibit => {}
    }
    body
}

/// Installs or atomically replaces `route` in the kernel FIB.
/// `replace_existing` selects `NLM_F_REPLACE` (update in place) over
/// `NLM_F_EXCL` (fail if something is already there) — callers doing a
/// fresh install of a route they know is new should pass `false`.
pub fn install_route(sock: &mut NetlinkSocket, buf: &mut [u8], route: &Route, replace_existing: bool) -> Result<()> {
    if !is_emittable(route) {
        log::error!("netlink: route {:?} has a non-emittable destination, not installed", route.key);
        return Ok(());
    }
    let flags = crate::message::NLM_F_CREATE | if replace_existing { crate::message::NLM_F_REPLACE } else { crate::message::NLM_F_EXCL };
    let body = build_route_body(route);
    exchange(sock, buf, RTM_NEWROUTE, flags, &body)
}

pub fn delete_route(sock: &mut NetlinkSocket, buf: &mut [u8], route: &Route) -> Result<()> {
    let body = build_route_body(route);
    exchange(sock, buf, RTM_DELROUTE, 0, &body)
}

/// Device-sourced routes (attached network routes — a unicast route with no
/// gateway, straight out an interface) are never emitted: the kernel owns
/// those on its own, independent of anything the RIB decides. Mirrors the
/// original's `krt_set_notify`, which nulls out both `old` and `new` before
/// choosing install-vs-delete whenever they're device routes.
fn is_device_sourced(route: &Route) -> bool {
    matches!(route.dest, RouteDest::Device(_))
}

/// Reconciles a RIB-side route change with the kernel, per spec.md §4.7's
/// update-in-place logic. When both `old` and `new` exist, within this
/// crate's scope (single table, TOS always zero) they are always comparable
/// on those axes, so the change is a single atomic `CREATE|REPLACE` install
/// of `new` — the original falls back to delete-then-install only when TOS
/// or table differ, a case this crate's non-goals (non-main tables,
/// TOS/priority) rule out. When only `old` exists (a route withdrawn with no
/// replacement), it is explicitly deleted unless its interface has already
/// gone down, in which case the kernel purged it on its own. When only `new`
/// exists, it is installed. `(None, None)` is a no-op, as is a change whose
/// `old`/`new` are both device-sourced once that filter is applied.
pub fn notify_route_change(
    sock: &mut NetlinkSocket,
    buf: &mut [u8],
    old: Option<&Route>,
    new: Option<&Route>,
    iface_table: &impl InterfaceTable,
) -> Result<()> {
    let old = old.filter(|r| !is_device_sourced(r));
    let new = new.filter(|r| !is_device_sourced(r));

    match (old, new) {
        (_, Some(new)) => install_route(sock, buf, new, true),
        (Some(old), None) => {
            if route_iface_already_gone(old, iface_table) {
                log::debug!("netlink: route {:?} already purged by kernel (interface down), skipping delete", old.key);
                Ok(())
            } else {
                delete_route(sock, buf, old)
            }
        }
        (None, None) => Ok(()),
    }
}
