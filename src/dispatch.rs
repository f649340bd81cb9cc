//! Asynchronous multicast dispatcher: a second rtnetlink endpoint,
//! subscribed to link/address/route change groups, that feeds the same
//! translators used by the cold scan whenever the kernel announces a
//! change on its own initiative.

use std::os::unix::io::RawFd;

use crate::addr::{handle_addr_message, AddrEvent};
use crate::attr::AttrTable;
use crate::contracts::{InterfaceTable, NeighborTable, RibSink};
use crate::error::Result;
use crate::iface::{handle_link_message, TempIfaceCache};
use crate::message::{
    from_bytes, IfAddrMsg, IfInfoMsg, RtMsg, RTMGRP_IPV4_IFADDR, RTMGRP_IPV4_ROUTE, RTMGRP_LINK,
    RTM_DELADDR, RTM_DELLINK, RTM_DELROUTE, RTM_NEWADDR, RTM_NEWLINK, RTM_NEWROUTE,
};
use crate::route::parse_route;
use crate::transport::{FrameIter, NetlinkSocket, RX_BUFFER_SIZE};
use crate::{iface, route};

/// Owns the multicast-subscribed socket and its dedicated receive buffer.
/// This buffer is never shared with the synchronous request/reply path
/// (each has its own), so there is no cross-path state to clear between a
/// scan and an async notification the way a socket shared between both
/// paths would require.
pub struct AsyncDispatcher {
    sock: NetlinkSocket,
    buf: Vec<u8>,
}

impl AsyncDispatcher {
    pub const GROUPS: u32 = RTMGRP_LINK | RTMGRP_IPV4_IFADDR | RTMGRP_IPV4_ROUTE;

    pub fn open() -> Result<Self> {
        Ok(Self { sock: NetlinkSocket::open(Self::GROUPS)?, buf: vec![0; RX_BUFFER_SIZE] })
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.sock.as_raw_fd()
    }

    /// Performs one `recvmsg` worth of dispatch work and returns. Callers
    /// own the suspension point (poll/select/epoll on [`as_raw_fd`]) and
    /// call this once the socket is reported readable — the dispatcher
    /// itself never blocks waiting for the next notification.
    pub fn poll(
        &mut self,
        iface_table: &mut impl InterfaceTable,
        neighbors: &impl NeighborTable,
        temp_cache: &mut TempIfaceCache,
        on_addr: &mut impl FnMut(AddrEvent),
        sink: &mut impl RibSink,
    ) -> Result<()> {
        let n = match self.sock.recv(&mut self.buf) {
            Ok(Some(n)) => n,
            Ok(None) => return Ok(()),
            Err(crate::error::NetlinkError::Truncated) => {
                log::warn!("netlink: multicast notification truncated, dropped");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        for (header, payload) in FrameIter::new(&self.buf[..n]) {
            match header.nlmsg_type {
                RTM_NEWLINK | RTM_DELLINK => {
                    if payload.len() < IfInfoMsg::SIZE {
                        log::warn!("netlink: async link record shorter than ifinfomsg, dropped");
                        continue;
                    }
                    let body = unsafe { from_bytes::<IfInfoMsg>(payload) };
                    let attrs = AttrTable::parse(&payload[IfInfoMsg::SIZE..], iface::ATTR_TABLE_SIZE);
                    handle_link_message(header.nlmsg_type, false, body, &attrs, iface_table);
                }
                RTM_NEWADDR | RTM_DELADDR => {
                    if payload.len() < IfAddrMsg::SIZE {
                        log::warn!("netlink: async address record shorter than ifaddrmsg, dropped");
                        continue;
                    }
                    let body = unsafe { from_bytes::<IfAddrMsg>(payload) };
                    let attrs = AttrTable::parse(&payload[IfAddrMsg::SIZE..], crate::message::IFA_MAX);
                    if let Some(event) = handle_addr_message(header.nlmsg_type, body, &attrs, iface_table) {
                        on_addr(event);
                    }
                }
                RTM_NEWROUTE | RTM_DELROUTE => {
                    if payload.len() < RtMsg::SIZE {
                        log::warn!("netlink: async route record shorter than rtmsg, dropped");
                        continue;
                    }
                    let body = unsafe { from_bytes::<RtMsg>(payload) };
                    let attrs = AttrTable::parse(&payload[RtMsg::SIZE..], route::ATTR_TABLE_SIZE);
                    if let Some(route) = parse_route(body, &attrs, header.nlmsg_type, false, neighbors, temp_cache) {
                        sink.async_accept(route, header.nlmsg_type == RTM_NEWROUTE);
                    }
                }
                other => log::debug!("netlink: async dispatcher ignoring message type {other}"),
            }
        }
        Ok(())
    }
}
