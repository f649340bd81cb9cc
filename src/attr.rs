//! TLV attribute codec: parsing a message's attribute region into a dense,
//! type-indexed table, and emitting attributes into a bounded send buffer.

use std::net::Ipv4Addr;

use crate::message::{align4, RtAttr};

/// A single parsed attribute: a view into the original receive buffer.
#[derive(Debug, Clone, Copy)]
pub struct AttrView<'a> {
    pub kind: u16,
    pub payload: &'a [u8],
}

impl<'a> AttrView<'a> {
    pub fn as_u32(&self) -> Option<u32> {
        let b: [u8; 4] = self.payload.get(..4)?.try_into().ok()?;
        Some(u32::from_ne_bytes(b))
    }

    pub fn as_u8(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    pub fn as_ipv4(&self) -> Option<Ipv4Addr> {
        let b: [u8; 4] = self.payload.get(..4)?.try_into().ok()?;
        Some(Ipv4Addr::from(b))
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.payload
    }

    /// Interprets the payload as a NUL-terminated (or unterminated)
    /// C string, as `IFLA_IFNAME` arrives.
    pub fn as_cstr(&self) -> Option<&'a str> {
        let bytes = match self.payload.iter().position(|&b| b == 0) {
            Some(pos) => &self.payload[..pos],
            None => self.payload,
        };
        std::str::from_utf8(bytes).ok()
    }
}

/// A dense, bounded table of attributes indexed by type code, mirroring the
/// original's fixed-size `struct rtattr *a[N]` array: attribute codes at or
/// above `MAX` are silently dropped rather than causing a parse failure,
/// since the kernel may add new attribute types a translator doesn't know
/// about yet.
pub struct AttrTable<'a> {
    slots: Vec<Option<AttrView<'a>>>,
}

impl<'a> AttrTable<'a> {
    /// Parses the 4-byte-aligned TLV region in `buf`. Any truncated trailing
    /// attribute (header or payload running past the end of `buf`) ends
    /// parsing early without returning an error — the table simply omits
    /// whatever attributes would have followed, and callers treat this the
    /// same as those attributes being absent. `buf` must not be over-read
    /// past its own length.
    pub fn parse(buf: &'a [u8], max: u16) -> Self {
        let mut slots = vec![None; max as usize];
        let mut off = 0usize;

        while off + RtAttr::SIZE <= buf.len() {
            let header = unsafe { crate::message::from_bytes::<RtAttr>(&buf[off..]) };
            let rta_len = header.rta_len as usize;
            let rta_type = header.rta_type;

            if rta_len < RtAttr::SIZE {
                log::warn!("netlink: attribute at offset {off} has len {rta_len} shorter than header, stopping parse");
                break;
            }
            if off + rta_len > buf.len() {
                log::warn!(
                    "netlink: attribute at offset {off} claims len {rta_len}, overruns {}-byte buffer, stopping parse",
                    buf.len()
                );
                break;
            }

            let payload = &buf[off + RtAttr::SIZE..off + rta_len];
            if (rta_type as usize) < slots.len() {
                slots[rta_type as usize] = Some(AttrView { kind: rta_type, payload });
            }

            off += align4(rta_len);
        }

        Self { slots }
    }

    pub fn get(&self, kind: u16) -> Option<AttrView<'a>> {
        self.slots.get(kind as usize).copied().flatten()
    }
}

/// Bounded attribute emitter appending TLVs directly into a `Vec<u8>` message
/// buffer. Every push grows the buffer; there is no fixed capacity to
/// overflow, but callers building within a single fixed-size frame should
/// check `buf.len()` against the frame budget themselves (the original
/// bounds its static buffer and treats overflow as a fatal bug — this crate
/// has no such static buffer, so the condition cannot occur here).
pub struct AttrWriter<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> AttrWriter<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        Self { buf }
    }

    fn push_header(&mut self, kind: u16, payload_len: usize) -> usize {
        let rta_len = RtAttr::SIZE + payload_len;
        let header = RtAttr { rta_len: rta_len as u16, rta_type: kind };
        self.buf.extend_from_slice(unsafe { crate::message::as_bytes(&header) });
        rta_len
    }

    fn pad_to_alignment(&mut self, rta_len: usize) {
        let padded = align4(rta_len);
        self.buf.resize(self.buf.len() + (padded - rta_len), 0);
    }

    pub fn push_bytes(&mut self, kind: u16, payload: &[u8]) {
        let rta_len = self.push_header(kind, payload.len());
        self.buf.extend_from_slice(payload);
        self.pad_to_alignment(rta_len);
    }

    pub fn push_u32(&mut self, kind: u16, value: u32) {
        self.push_bytes(kind, &value.to_ne_bytes());
    }

    pub fn push_ipv4(&mut self, kind: u16, addr: Ipv4Addr) {
        self.push_bytes(kind, &addr.octets());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{IFA_ADDRESS, IFA_LOCAL, IFA_MAX};

    #[test]
    fn round_trip_u32_and_ipv4() {
        let mut buf = Vec::new();
        {
            let mut w = AttrWriter::new(&mut buf);
            w.push_ipv4(IFA_ADDRESS, Ipv4Addr::new(192, 0, 2, 1));
            w.push_u32(IFA_LOCAL, 42);
        }
        let table = AttrTable::parse(&buf, IFA_MAX);
        assert_eq!(table.get(IFA_ADDRESS).unwrap().as_ipv4(), Some(Ipv4Addr::new(192, 0, 2, 1)));
        assert_eq!(table.get(IFA_LOCAL).unwrap().as_u32(), Some(42));
    }

    #[test]
    fn attribute_code_at_or_above_max_is_dropped_not_fatal() {
        let mut buf = Vec::new();
        AttrWriter::new(&mut buf).push_u32(IFA_MAX, 7);
        let table = AttrTable::parse(&buf, IFA_MAX);
        assert!(table.get(IFA_MAX).is_none());
    }

    #[test]
    fn truncated_trailing_attribute_stops_parse_without_over_read() {
        let mut buf = Vec::new();
        AttrWriter::new(&mut buf).push_u32(IFA_ADDRESS, 1);
        buf.truncate(buf.len() - 1);
        let table = AttrTable::parse(&buf, IFA_MAX);
        assert!(table.get(IFA_ADDRESS).is_none());
    }

    #[test]
    fn cstr_accepts_nul_terminated_and_bare_payload() {
        let mut buf = Vec::new();
        AttrWriter::new(&mut buf).push_bytes(crate::message::IFLA_IFNAME, b"eth0\0");
        let table = AttrTable::parse(&buf, crate::message::IFLA_MAX);
        assert_eq!(table.get(crate::message::IFLA_IFNAME).unwrap().as_cstr(), Some("eth0"));
    }
}
