//! Crate error type.
//!
//! Only the two fatal categories of the error policy (initialization and
//! protocol-level I/O failure) and the kernel ACK error path surface as
//! `Err`. Everything else (malformed frames, stale sequence numbers,
//! non-kernel senders, semantic anomalies, unsupported records) is handled
//! where it is found: logged and dropped, never propagated here.

use std::io;

pub type Result<T> = std::result::Result<T, NetlinkError>;

#[derive(Debug, thiserror::Error)]
pub enum NetlinkError {
    #[error("failed to open rtnetlink socket: {0}")]
    Init(#[source] io::Error),

    #[error("rtnetlink socket I/O failed: {0}")]
    Io(#[source] io::Error),

    #[error("kernel rejected request with errno {0}")]
    Ack(i32),

    #[error("receive buffer too small for kernel message (truncated)")]
    Truncated,
}

impl From<io::Error> for NetlinkError {
    fn from(e: io::Error) -> Self {
        NetlinkError::Io(e)
    }
}
