use std::time::Duration;

use thiserror::Error;

use crate::sma::address::BtAddress;
use crate::sma::catalog::Category;

/// Frame-level protocol disagreement. Never fatal to the link session:
/// the offending frame is discarded and the receive loop keeps listening.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame too short ({0} bytes)")]
    TooShort(usize),

    #[error("bad start delimiter {0:#04x}")]
    BadDelimiter(u8),

    #[error("declared frame length {0} out of range")]
    BadLength(u16),

    #[error("header checksum mismatch (got {got:#04x}, want {want:#04x})")]
    HeaderChecksum { got: u8, want: u8 },

    #[error("frame checksum mismatch (got {got:#06x}, want {want:#06x})")]
    Checksum { got: u16, want: u16 },

    #[error("unexpected sender {0}")]
    WrongSender(BtAddress),

    #[error("embedded record signature missing")]
    NoSignature,

    #[error("embedded record truncated ({0} bytes)")]
    Truncated(usize),

    #[error("stale packet id {got:#06x} (expected {want:#06x})")]
    StalePacketId { got: u16, want: u16 },

    #[error("device reported error {0:#06x}")]
    Rejected(u16),
}

/// Error taxonomy of the link and query layers. Callers distinguish
/// "close and give up" from "discard and keep listening" by kind, not by
/// message text.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Stream open/read/write failure or short read. Fatal to the session.
    #[error("transport: {0}")]
    Transport(#[from] std::io::Error),

    /// The deadline elapsed with no bytes received. Fatal to the session;
    /// the transport is in an indeterminate state and must be closed.
    #[error("no data received within {0:?}")]
    Timeout(Duration),

    /// Operation attempted on a session that is closed (or was closed as a
    /// precaution after a transport fault).
    #[error("link session is closed")]
    Closed,

    /// Discarded frame; the receive loop retries until its own timeout.
    #[error("frame: {0}")]
    Frame(#[from] FrameError),

    /// Byte-stuffed payload exceeded the reassembly bound. Fatal to the
    /// current request, not to the session.
    #[error("reassembly buffer overflow at {0} bytes")]
    Reassembly(usize),

    /// Authentication not acknowledged. Fatal to the session.
    #[error("authentication rejected (result {0:#06x})")]
    Auth(u16),

    /// Retry budget for one category exhausted; that category is simply
    /// missing from the snapshot.
    #[error("category {0:?} failed after {1} attempts")]
    CategoryFetch(Category, u32),
}

impl ProtocolError {
    /// True for errors that end the session; the caller must close the
    /// transport and may retry with a fresh open.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::Transport(_)
                | ProtocolError::Timeout(_)
                | ProtocolError::Closed
                | ProtocolError::Auth(_)
        )
    }
}
