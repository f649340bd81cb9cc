//! The `Synchronizer`: the one owner object for every piece of state this
//! crate needs (spec-level "no process-wide singletons" — everything here
//! is instantiated once per caller and passed around explicitly, never
//! hidden behind a `static`).

use crate::addr::{handle_addr_message, AddrEvent};
use crate::attr::AttrTable;
use crate::contracts::{InterfaceTable, NeighborTable, RibSink};
use crate::dispatch::AsyncDispatcher;
use crate::error::Result;
use crate::iface::{handle_link_message, TempIfaceCache};
use crate::message::{
    from_bytes, IfAddrMsg, IfInfoMsg, RtMsg, AF_INET, RTM_GETADDR, RTM_GETLINK, RTM_GETROUTE,
    RTM_NEWLINK,
};
use crate::model::Route;
use crate::reply::run_dump;
use crate::route::parse_route;
use crate::transport::{NetlinkSocket, RX_BUFFER_SIZE};
use crate::{iface, route};

pub struct Synchronizer {
    sync_sock: NetlinkSocket,
    sync_buf: Vec<u8>,
    temp_cache: TempIfaceCache,
    async_dispatcher: Option<AsyncDispatcher>,
}

impl Synchronizer {
    /// Opens the synchronous request/reply endpoint. The multicast endpoint
    /// is opened lazily by [`start_async`] only if `async_enabled` is true —
    /// a caller that only ever does cold scans has no reason to hold a
    /// second socket open.
    pub fn new(async_enabled: bool) -> Result<Self> {
        let mut this = Self {
            sync_sock: NetlinkSocket::open(0)?,
            sync_buf: vec![0; RX_BUFFER_SIZE],
            temp_cache: TempIfaceCache::default(),
            async_dispatcher: None,
        };
        if async_enabled {
            this.start_async()?;
        }
        Ok(this)
    }

    pub fn start_async(&mut self) -> Result<()> {
        if self.async_dispatcher.is_none() {
            self.async_dispatcher = Some(AsyncDispatcher::open()?);
        }
        Ok(())
    }

    pub fn shutdown(&mut self) {
        self.async_dispatcher = None;
    }

    /// Dumps links then addresses, publishing every interface to
    /// `iface_table` and reporting every address binding through `on_addr`.
    /// Also repopulates the temporary-interface cache the route scan relies
    /// on to resolve device routes ahead of the real interface table.
    pub fn scan_interfaces(&mut self, iface_table: &mut impl InterfaceTable, on_addr: &mut impl FnMut(AddrEvent)) -> Result<()> {
        self.temp_cache.clear();
        iface_table.begin_scan();

        let seq = self.sync_sock.next_seq();
        let request = crate::reply::build_dump_request(RTM_GETLINK, crate::message::NLM_F_DUMP, seq, AF_INET);
        self.sync_sock.send(&request)?;
        run_dump(&self.sync_sock, &mut self.sync_buf, seq, |header, payload| {
            if payload.len() < IfInfoMsg::SIZE {
                log::warn!("netlink: link dump record shorter than ifinfomsg, dropped");
                return;
            }
            let body = unsafe { from_bytes::<IfInfoMsg>(payload) };
            let attrs = AttrTable::parse(&payload[IfInfoMsg::SIZE..], iface::ATTR_TABLE_SIZE);
            handle_link_message(header.nlmsg_type, true, body, &attrs, iface_table);
            if header.nlmsg_type == RTM_NEWLINK {
                if let Some(parsed) = crate::iface::parse_link(body, &attrs) {
                    self.temp_cache.insert(parsed);
                }
            }
        })?;

        iface_table.end_scan();

        let seq = self.sync_sock.next_seq();
        let request = crate::reply::build_dump_request(RTM_GETADDR, crate::message::NLM_F_DUMP, seq, AF_INET);
        self.sync_sock.send(&request)?;
        run_dump(&self.sync_sock, &mut self.sync_buf, seq, |header, payload| {
            if payload.len() < IfAddrMsg::SIZE {
                log::warn!("netlink: address dump record shorter than ifaddrmsg, dropped");
                return;
            }
            let body = unsafe { from_bytes::<IfAddrMsg>(payload) };
            let attrs = AttrTable::parse(&payload[IfAddrMsg::SIZE..], crate::message::IFA_MAX);
            if let Some(event) = handle_addr_message(header.nlmsg_type, body, &attrs, iface_table) {
                on_addr(event);
            }
        })?;

        Ok(())
    }

    /// Dumps the kernel's main IPv4 route table, handing every resolvable
    /// route to `sink`. Must run after [`scan_interfaces`] in the same cold
    /// scan so the temporary-interface cache is populated.
    pub fn scan_routes(&mut self, neighbors: &impl NeighborTable, sink: &mut impl RibSink) -> Result<()> {
        let seq = self.sync_sock.next_seq();
        let request = crate::reply::build_dump_request(RTM_GETROUTE, crate::message::NLM_F_DUMP, seq, AF_INET);
        self.sync_sock.send(&request)?;
        let temp_cache = &mut self.temp_cache;
        run_dump(&self.sync_sock, &mut self.sync_buf, seq, |header, payload| {
            if payload.len() < RtMsg::SIZE {
                log::warn!("netlink: route dump record shorter than rtmsg, dropped");
                return;
            }
            let body = unsafe { from_bytes::<RtMsg>(payload) };
            let attrs = AttrTable::parse(&payload[RtMsg::SIZE..], route::ATTR_TABLE_SIZE);
            if let Some(route) = parse_route(body, &attrs, header.nlmsg_type, true, neighbors, temp_cache) {
                sink.scan_accept(route);
            }
        })?;
        Ok(())
    }

    /// Installs `new`, deletes `old`, or both, depending on which are
    /// present — see [`route::notify_route_change`]. `iface_table` is
    /// consulted only for the old-route-withdrawn case, to tell a real
    /// deletion apart from a route the kernel already purged when its
    /// interface went down.
    pub fn notify_route_change(
        &mut self,
        old: Option<&Route>,
        new: Option<&Route>,
        iface_table: &impl InterfaceTable,
    ) -> Result<()> {
        route::notify_route_change(&mut self.sync_sock, &mut self.sync_buf, old, new, iface_table)
    }

    /// Services one pending notification on the async endpoint. No-op
    /// (returns `Ok(())` immediately) if [`start_async`] was never called.
    pub fn poll_async(
        &mut self,
        iface_table: &mut impl InterfaceTable,
        neighbors: &impl NeighborTable,
        on_addr: &mut impl FnMut(AddrEvent),
        sink: &mut impl RibSink,
    ) -> Result<()> {
        match &mut self.async_dispatcher {
            Some(dispatcher) => dispatcher.poll(iface_table, neighbors, &mut self.temp_cache, on_addr, sink),
            None => Ok(()),
        }
    }

    pub fn async_fd(&self) -> Option<std::os::unix::io::RawFd> {
        self.async_dispatcher.as_ref().map(|d| d.as_raw_fd())
    }
}
