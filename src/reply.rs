//! Request/reply engine: building request frames, and driving both a
//! multi-frame dump reply and a single synchronous ACK exchange.

use crate::error::{NetlinkError, Result};
use crate::message::{
    as_bytes, from_bytes, NlMsgErr, NlMsgHdr, RtGenMsg, NLMSG_DONE, NLMSG_ERROR, NLM_F_ACK,
    NLM_F_REQUEST,
};
use crate::transport::{FrameIter, NetlinkSocket};

/// Assembles a complete frame: header followed by `body`, with `nlmsg_len`
/// set to the unaligned total (the kernel, and our own `FrameIter`, align
/// forward from there).
pub fn build_frame(msg_type: u16, flags: u16, seq: u32, body: &[u8]) -> Vec<u8> {
    let header = NlMsgHdr {
        nlmsg_len: (NlMsgHdr::SIZE + body.len()) as u32,
        nlmsg_type: msg_type,
        nlmsg_flags: flags,
        nlmsg_seq: seq,
        nlmsg_pid: 0,
    };
    let mut frame = Vec::with_capacity(header.nlmsg_len as usize);
    frame.extend_from_slice(unsafe { as_bytes(&header) });
    frame.extend_from_slice(body);
    frame
}

/// Builds a `REQUEST|DUMP` frame whose body is nothing but an address
/// family, as used by `RTM_GETLINK`/`RTM_GETADDR`/`RTM_GETROUTE`.
pub fn build_dump_request(msg_type: u16, flags: u16, seq: u32, family: u8) -> Vec<u8> {
    let body = RtGenMsg::new(family);
    build_frame(msg_type, flags | NLM_F_REQUEST, seq, unsafe { as_bytes(&body) })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpState {
    InFlight,
    TerminatedOk,
    TerminatedErr(i32),
}

/// Tracks one outstanding dump request across however many `recvmsg` calls
/// it takes for the kernel to finish replying. A session is fed one
/// already-received buffer at a time; it stops consuming frames from that
/// buffer as soon as it terminates (remaining bytes, if any, belong to
/// whatever the caller reads next).
pub struct DumpSession {
    seq: u32,
    state: DumpState,
}

impl DumpSession {
    pub fn new(seq: u32) -> Self {
        Self { seq, state: DumpState::InFlight }
    }

    pub fn state(&self) -> DumpState {
        self.state
    }

    pub fn is_in_flight(&self) -> bool {
        self.state == DumpState::InFlight
    }

    /// Consumes frames out of `buf`, handing every record frame (anything
    /// that isn't `DONE`/`ERROR`) to `on_record`. Frames whose sequence
    /// doesn't match this session's are logged and skipped without
    /// affecting state — the socket may have older traffic queued.
    pub fn feed(&mut self, buf: &[u8], mut on_record: impl FnMut(&NlMsgHdr, &[u8])) {
        if !self.is_in_flight() {
            return;
        }
        for (header, payload) in FrameIter::new(buf) {
            if header.nlmsg_seq != self.seq {
                log::warn!(
                    "netlink: dropping reply with sequence {} during dump (want {})",
                    header.nlmsg_seq,
                    self.seq
                );
                continue;
            }
            match header.nlmsg_type {
                NLMSG_DONE => {
                    self.state = DumpState::TerminatedOk;
                    return;
                }
                NLMSG_ERROR => {
                    let err = unsafe { from_bytes::<NlMsgErr>(payload) };
                    if err.error == 0 {
                        self.state = DumpState::TerminatedOk;
                    } else {
                        log::warn!("netlink: kernel returned error {} terminating dump seq {}", err.error, self.seq);
                        self.state = DumpState::TerminatedErr(err.error);
                    }
                    return;
                }
                _ => on_record(header, payload),
            }
        }
    }
}

/// Drives a dump request to completion, repeatedly calling `recv` until the
/// session terminates. `on_record` is invoked once per non-terminal frame.
pub fn run_dump(
    sock: &NetlinkSocket,
    buf: &mut [u8],
    seq: u32,
    mut on_record: impl FnMut(&NlMsgHdr, &[u8]),
) -> Result<DumpState> {
    let mut session = DumpSession::new(seq);
    while session.is_in_flight() {
        let n = match sock.recv(buf)? {
            Some(n) => n,
            None => continue,
        };
        session.feed(&buf[..n], &mut on_record);
    }
    Ok(session.state())
}

/// Sends `body` as a `REQUEST|ACK` frame of `msg_type` with the given extra
/// flags, then blocks for the matching ACK. Intervening frames with a
/// different sequence number (late dump replies, async chatter sharing the
/// same socket) are logged and tolerated, not treated as errors.
pub fn exchange(sock: &mut NetlinkSocket, buf: &mut [u8], msg_type: u16, flags: u16, body: &[u8]) -> Result<()> {
    let seq = sock.next_seq();
    let frame = build_frame(msg_type, flags | NLM_F_REQUEST | NLM_F_ACK, seq, body);
    sock.send(&frame)?;

    loop {
        let n = match sock.recv(buf)? {
            Some(n) => n,
            None => continue,
        };
        for (header, payload) in FrameIter::new(&buf[..n]) {
            if header.nlmsg_seq != seq {
                log::warn!("netlink: dropping frame with sequence {} during exchange (want {})", header.nlmsg_seq, seq);
                continue;
            }
            if header.nlmsg_type != NLMSG_ERROR {
                log::warn!("netlink: expected ACK for seq {}, got message type {}", seq, header.nlmsg_type);
                continue;
            }
            let err = unsafe { from_bytes::<NlMsgErr>(payload) };
            return if err.error == 0 { Ok(()) } else { Err(NetlinkError::Ack(err.error)) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::NLM_F_MULTI;

    fn done_frame(seq: u32) -> Vec<u8> {
        build_frame(NLMSG_DONE, NLM_F_MULTI, seq, &[])
    }

    fn error_frame(seq: u32, errno: i32) -> Vec<u8> {
        let err = NlMsgErr { error: errno, msg: NlMsgHdr { nlmsg_len: 0, nlmsg_type: 0, nlmsg_flags: 0, nlmsg_seq: seq, nlmsg_pid: 0 } };
        build_frame(NLMSG_ERROR, 0, seq, unsafe { as_bytes(&err) })
    }

    #[test]
    fn dump_session_terminates_ok_on_done() {
        let mut session = DumpSession::new(7);
        let mut seen = 0;
        session.feed(&done_frame(7), |_, _| seen += 1);
        assert_eq!(session.state(), DumpState::TerminatedOk);
        assert_eq!(seen, 0);
    }

    #[test]
    fn dump_session_terminates_err_on_nonzero_ack() {
        let mut session = DumpSession::new(3);
        session.feed(&error_frame(3, -1), |_, _| {});
        assert_eq!(session.state(), DumpState::TerminatedErr(-1));
    }

    #[test]
    fn dump_session_drops_stale_sequence() {
        let mut session = DumpSession::new(5);
        let mut seen = 0;
        session.feed(&done_frame(999), |_, _| seen += 1);
        assert_eq!(session.state(), DumpState::InFlight);
        assert_eq!(seen, 0);
    }

    #[test]
    fn stale_reply_is_dropped_but_the_session_still_terminates_on_its_own_sequence() {
        let mut session = DumpSession::new(5);
        let mut records = Vec::new();
        let mut buf = done_frame(4);
        buf.extend(build_frame(crate::message::RTM_NEWLINK, NLM_F_MULTI, 5, b"xxxx"));
        buf.extend(done_frame(5));
        session.feed(&buf, |_, payload| records.push(payload.to_vec()));
        assert_eq!(session.state(), DumpState::TerminatedOk);
        assert_eq!(records, vec![b"xxxx".to_vec()]);
    }

    #[test]
    fn dump_session_passes_record_frames_through() {
        let mut session = DumpSession::new(1);
        let record = build_frame(crate::message::RTM_NEWLINK, NLM_F_MULTI, 1, b"payload");
        let mut seen = Vec::new();
        session.feed(&record, |_, payload| seen.push(payload.to_vec()));
        assert_eq!(session.state(), DumpState::InFlight);
        assert_eq!(seen, vec![b"payload".to_vec()]);
    }
}
