//! Frame transport: the raw `NETLINK_ROUTE` socket, framing-level send/recv,
//! and a cursor over a receive buffer that may hold several frames back to
//! back (the kernel coalesces dump replies into as few datagrams as fit).

use std::io;
use std::mem;
use std::os::unix::io::RawFd;

use crate::error::{NetlinkError, Result};
use crate::message::{align4, NlMsgHdr};

/// Matches `NL_RX_SIZE` in the original implementation this crate mirrors.
pub const RX_BUFFER_SIZE: usize = 2048;

/// A bound `NETLINK_ROUTE` socket. `groups == 0` gives a plain request/reply
/// endpoint; a nonzero bitmask additionally subscribes to multicast groups
/// (used for the async dispatcher's endpoint).
pub struct NetlinkSocket {
    fd: RawFd,
    seq: u32,
}

impl NetlinkSocket {
    pub fn open(groups: u32) -> Result<Self> {
        unsafe {
            let fd = libc::socket(libc::AF_NETLINK, libc::SOCK_RAW | libc::SOCK_CLOEXEC, libc::NETLINK_ROUTE);
            if fd < 0 {
                return Err(NetlinkError::Init(io::Error::last_os_error()));
            }

            let mut addr: libc::sockaddr_nl = mem::zeroed();
            addr.nl_family = libc::AF_NETLINK as u16;
            addr.nl_pid = 0;
            addr.nl_groups = groups;

            let rc = libc::bind(
                fd,
                &addr as *const libc::sockaddr_nl as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_nl>() as u32,
            );
            if rc < 0 {
                let err = io::Error::last_os_error();
                libc::close(fd);
                return Err(NetlinkError::Init(err));
            }

            Ok(Self { fd, seq: 0 })
        }
    }

    /// Next sequence number for a request. Starts at 1; the original seeds
    /// this from the daemon's current time tick, this crate from a plain
    /// monotonic counter (see DESIGN.md).
    pub fn next_seq(&mut self) -> u32 {
        self.seq += 1;
        self.seq
    }

    pub fn send(&self, buf: &[u8]) -> Result<()> {
        unsafe {
            let mut addr: libc::sockaddr_nl = mem::zeroed();
            addr.nl_family = libc::AF_NETLINK as u16;

            let rc = libc::sendto(
                self.fd,
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
                0,
                &addr as *const libc::sockaddr_nl as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_nl>() as u32,
            );
            if rc < 0 {
                return Err(NetlinkError::Io(io::Error::last_os_error()));
            }
        }
        Ok(())
    }

    /// Reads one datagram into `buf`. Returns `Ok(None)` if the sender was
    /// not the kernel (nonzero `nl_pid`) — such frames are discarded, never
    /// surfaced to a caller. A truncated datagram (the kernel had more to
    /// say than `buf` could hold) is fatal, matching spec-level policy: the
    /// receive buffer size is fixed and not meant to be exceeded.
    pub fn recv(&self, buf: &mut [u8]) -> Result<Option<usize>> {
        unsafe {
            let mut addr: libc::sockaddr_nl = mem::zeroed();
            let mut iov = libc::iovec { iov_base: buf.as_mut_ptr() as *mut libc::c_void, iov_len: buf.len() };
            let mut msg: libc::msghdr = mem::zeroed();
            msg.msg_name = &mut addr as *mut libc::sockaddr_nl as *mut libc::c_void;
            msg.msg_namelen = mem::size_of::<libc::sockaddr_nl>() as u32;
            msg.msg_iov = &mut iov;
            msg.msg_iovlen = 1;

            let n = libc::recvmsg(self.fd, &mut msg, 0);
            if n < 0 {
                return Err(NetlinkError::Io(io::Error::last_os_error()));
            }
            if msg.msg_flags & libc::MSG_TRUNC != 0 {
                return Err(NetlinkError::Truncated);
            }
            if addr.nl_pid != 0 {
                log::debug!("netlink: discarding frame from non-kernel port {}", addr.nl_pid);
                return Ok(None);
            }

            Ok(Some(n as usize))
        }
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for NetlinkSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

/// Iterates the possibly-multiple frames packed into one receive buffer.
/// Stops at the first frame whose declared length would run past the end of
/// `buf`, or that doesn't leave enough bytes for a full header — that
/// cannot happen for a well-formed kernel reply, but a hand-built test
/// buffer might do it deliberately. Logs a "packet remnant" warning iff
/// bytes are left over that don't form a complete frame; consuming the
/// buffer exactly to its end is not a remnant and is silent.
pub struct FrameIter<'a> {
    buf: &'a [u8],
    off: usize,
}

impl<'a> FrameIter<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, off: 0 }
    }

    fn remnant(&mut self) -> Option<(&'a NlMsgHdr, &'a [u8])> {
        log::warn!("netlink: found packet remnant of size {}", self.buf.len() - self.off);
        self.off = self.buf.len();
        None
    }
}

impl<'a> Iterator for FrameIter<'a> {
    type Item = (&'a NlMsgHdr, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.off == self.buf.len() {
            return None;
        }
        if self.off + NlMsgHdr::SIZE > self.buf.len() {
            return self.remnant();
        }
        let header = unsafe { crate::message::from_bytes::<NlMsgHdr>(&self.buf[self.off..]) };
        let total = header.nlmsg_len as usize;
        if total < NlMsgHdr::SIZE || self.off + total > self.buf.len() {
            return self.remnant();
        }
        let payload = &self.buf[self.off + NlMsgHdr::SIZE..self.off + total];
        self.off += align4(total);
        Some((header, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RTM_NEWLINK;

    fn frame(seq: u32, body: &[u8]) -> Vec<u8> {
        let header = NlMsgHdr {
            nlmsg_len: (NlMsgHdr::SIZE + body.len()) as u32,
            nlmsg_type: RTM_NEWLINK,
            nlmsg_flags: 0,
            nlmsg_seq: seq,
            nlmsg_pid: 0,
        };
        let mut buf = Vec::new();
        buf.extend_from_slice(unsafe { crate::message::as_bytes(&header) });
        buf.extend_from_slice(body);
        buf
    }

    #[test]
    fn exact_end_of_buffer_is_not_a_remnant() {
        let buf = frame(1, b"xxxx");
        let frames: Vec<_> = FrameIter::new(&buf).collect();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn incomplete_trailing_frame_is_a_remnant_and_stops_iteration() {
        let mut buf = frame(1, b"xxxx");
        buf.extend_from_slice(b"short"); // fewer bytes than a full NlMsgHdr
        let frames: Vec<_> = FrameIter::new(&buf).collect();
        assert_eq!(frames.len(), 1, "the complete leading frame is still yielded");
    }

    #[test]
    fn header_claiming_more_than_is_present_is_a_remnant() {
        let mut buf = frame(1, b"xxxx");
        let mut bogus = frame(2, b"xxxxxxxx");
        bogus.truncate(bogus.len() - 4); // header's nlmsg_len now overruns the buffer
        buf.extend_from_slice(&bogus);
        let frames: Vec<_> = FrameIter::new(&buf).collect();
        assert_eq!(frames.len(), 1);
    }
}
