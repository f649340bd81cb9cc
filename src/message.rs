//! Wire-format constants and header layouts for `NETLINK_ROUTE`.
//!
//! Every struct here is `#[repr(C)]` and mirrors the kernel ABI exactly
//! (`linux/netlink.h`, `linux/rtnetlink.h`, `linux/if_link.h`,
//! `linux/if_addr.h`) — no field is reinterpreted. Constants are defined
//! locally rather than pulled from a binding crate: the ABI is small, stable
//! across kernel versions, and keeping it inline makes the frame layout the
//! codec depends on auditable in one place.

use std::mem::size_of;

pub const NLMSG_ALIGNTO: usize = 4;

pub const fn align4(len: usize) -> usize {
    (len + NLMSG_ALIGNTO - 1) & !(NLMSG_ALIGNTO - 1)
}

// --- nlmsghdr.nlmsg_type --------------------------------------------------

pub const NLMSG_NOOP: u16 = 1;
pub const NLMSG_ERROR: u16 = 2;
pub const NLMSG_DONE: u16 = 3;
pub const NLMSG_OVERRUN: u16 = 4;

pub const RTM_NEWLINK: u16 = 16;
pub const RTM_DELLINK: u16 = 17;
pub const RTM_GETLINK: u16 = 18;

pub const RTM_NEWADDR: u16 = 20;
pub const RTM_DELADDR: u16 = 21;
pub const RTM_GETADDR: u16 = 22;

pub const RTM_NEWROUTE: u16 = 24;
pub const RTM_DELROUTE: u16 = 25;
pub const RTM_GETROUTE: u16 = 26;

// --- nlmsghdr.nlmsg_flags --------------------------------------------------

pub const NLM_F_REQUEST: u16 = 0x0001;
pub const NLM_F_MULTI: u16 = 0x0002;
pub const NLM_F_ACK: u16 = 0x0004;
pub const NLM_F_ROOT: u16 = 0x0100;
pub const NLM_F_MATCH: u16 = 0x0200;
pub const NLM_F_DUMP: u16 = NLM_F_ROOT | NLM_F_MATCH;
pub const NLM_F_REPLACE: u16 = 0x0100;
pub const NLM_F_EXCL: u16 = 0x0200;
pub const NLM_F_CREATE: u16 = 0x0400;

// --- multicast groups (sockaddr_nl.nl_groups bitmask) ----------------------

pub const RTMGRP_LINK: u32 = 0x0001;
pub const RTMGRP_IPV4_IFADDR: u32 = 0x0010;
pub const RTMGRP_IPV4_ROUTE: u32 = 0x0040;

// --- address families -------------------------------------------------------

pub const AF_INET: u8 = 2;

// --- IFF_* device flags (ifinfomsg.ifi_flags) ------------------------------

pub const IFF_UP: u32 = 0x1;
pub const IFF_BROADCAST: u32 = 0x2;
pub const IFF_LOOPBACK: u32 = 0x8;
pub const IFF_POINTOPOINT: u32 = 0x10;

// --- IFLA_* link attribute codes --------------------------------------------

pub const IFLA_ADDRESS: u16 = 1;
pub const IFLA_BROADCAST: u16 = 2;
pub const IFLA_IFNAME: u16 = 3;
pub const IFLA_MTU: u16 = 4;
pub const IFLA_MAX: u16 = 16;

// --- IFA_* address attribute codes ------------------------------------------

pub const IFA_ADDRESS: u16 = 1;
pub const IFA_LOCAL: u16 = 2;
pub const IFA_BROADCAST: u16 = 4;
pub const IFA_FLAGS: u16 = 8;
pub const IFA_MAX: u16 = 10;

pub const IFA_F_SECONDARY: u8 = 0x01;

// --- RTA_* route attribute codes ---------------------------------------------

pub const RTA_DST: u16 = 1;
pub const RTA_OIF: u16 = 4;
pub const RTA_GATEWAY: u16 = 5;
pub const RTA_MAX: u16 = 13;

// --- RTN_* route types (rtmsg.rtm_type) --------------------------------------

pub const RTN_UNICAST: u8 = 1;
pub const RTN_BLACKHOLE: u8 = 6;
pub const RTN_UNREACHABLE: u8 = 7;
pub const RTN_PROHIBIT: u8 = 8;

// --- RTPROT_* route source (rtmsg.rtm_protocol) ------------------------------

pub const RTPROT_UNSPEC: u8 = 0;
pub const RTPROT_REDIRECT: u8 = 1;
pub const RTPROT_KERNEL: u8 = 2;
/// This daemon's own originating protocol id. Upstream kernels reserve 13
/// for the BIRD routing daemon; any caller mirroring BIRD's netlink syncer
/// uses the same number so its self-originated routes are recognizable.
pub const RTPROT_SELF: u8 = 13;

// --- RT_SCOPE_* (rtmsg.rtm_scope) --------------------------------------------

pub const RT_SCOPE_UNIVERSE: u8 = 0;

// --- RT_TABLE_* (rtmsg.rtm_table) --------------------------------------------

pub const RT_TABLE_MAIN: u8 = 254;

// --- Headers -----------------------------------------------------------------

/// 16-byte fixed netlink frame header. `nlmsg_len` is the raw (unaligned)
/// length including this header; callers align to the next frame boundary
/// with [`align4`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NlMsgHdr {
    pub nlmsg_len: u32,
    pub nlmsg_type: u16,
    pub nlmsg_flags: u16,
    pub nlmsg_seq: u32,
    pub nlmsg_pid: u32,
}

impl NlMsgHdr {
    pub const SIZE: usize = size_of::<NlMsgHdr>();

    pub fn payload_len(&self) -> usize {
        (self.nlmsg_len as usize).saturating_sub(Self::SIZE)
    }
}

/// Generic dump request body (`struct rtgenmsg`): just an address family.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RtGenMsg {
    pub rtgen_family: u8,
    pub pad: [u8; 3],
}

impl RtGenMsg {
    pub const SIZE: usize = size_of::<RtGenMsg>();

    pub fn new(family: u8) -> Self {
        Self { rtgen_family: family, pad: [0; 3] }
    }
}

/// `struct nlmsgerr`: an `i32` errno followed by the offending request
/// header. Only the errno is used here.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NlMsgErr {
    pub error: i32,
    pub msg: NlMsgHdr,
}

impl NlMsgErr {
    pub const SIZE: usize = size_of::<NlMsgErr>();
}

/// `struct ifinfomsg`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct IfInfoMsg {
    pub ifi_family: u8,
    pub pad: u8,
    pub ifi_type: u16,
    pub ifi_index: i32,
    pub ifi_flags: u32,
    pub ifi_change: u32,
}

impl IfInfoMsg {
    pub const SIZE: usize = size_of::<IfInfoMsg>();
}

/// `struct ifaddrmsg`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct IfAddrMsg {
    pub ifa_family: u8,
    pub ifa_prefixlen: u8,
    pub ifa_flags: u8,
    pub ifa_scope: u8,
    pub ifa_index: u32,
}

impl IfAddrMsg {
    pub const SIZE: usize = size_of::<IfAddrMsg>();
}

/// `struct rtmsg`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct RtMsg {
    pub rtm_family: u8,
    pub rtm_dst_len: u8,
    pub rtm_src_len: u8,
    pub rtm_tos: u8,
    pub rtm_table: u8,
    pub rtm_protocol: u8,
    pub rtm_scope: u8,
    pub rtm_type: u8,
    pub rtm_flags: u32,
}

impl RtMsg {
    pub const SIZE: usize = size_of::<RtMsg>();
}

/// `struct rtattr` (also used verbatim as `ifla`/`ifa` attribute headers).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RtAttr {
    pub rta_len: u16,
    pub rta_type: u16,
}

impl RtAttr {
    pub const SIZE: usize = size_of::<RtAttr>();
}

/// Reinterpret a `#[repr(C)]` value as its raw byte representation, in
/// native endianness, for appending to a send buffer.
///
/// # Safety
/// `T` must be `#[repr(C)]`, contain no padding that matters, and outlive
/// the returned slice (callers immediately copy it into a `Vec`).
pub unsafe fn as_bytes<T>(value: &T) -> &[u8] {
    std::slice::from_raw_parts(value as *const T as *const u8, size_of::<T>())
}

/// Reinterpret a byte slice as a `#[repr(C)]` header reference.
///
/// # Safety
/// `input` must contain at least `size_of::<T>()` bytes and be sufficiently
/// aligned (netlink guarantees 4-byte alignment; all headers here require
/// at most 4-byte alignment).
pub unsafe fn from_bytes<T>(input: &[u8]) -> &T {
    &*(input.as_ptr() as *const T)
}
