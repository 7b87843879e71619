use std::io;
use std::time::Duration;

use bytes::BytesMut;

use crate::error::{FrameError, ProtocolError};
use crate::prelude::*;
use crate::sma::address::BtAddress;
use crate::sma::frame::{command, FrameHeader, HEADER_LEN};
use crate::sma::record;
use crate::sma::stuffing::{Unstuffer, DELIMITER};
use crate::sma::transport::ByteTransport;

/// Receiving zero bytes for this long is a timeout, not a slow frame.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the transport stream and speaks the outer frame layer: send one
/// encoded frame, or receive and reassemble the frames making up one
/// logical response. Exactly one link session owns the transport at a
/// time; the handle is moved in at open and dropped at close.
pub struct LinkSession {
    transport: Option<Box<dyn ByteTransport>>,
    local: BtAddress,
    peer: BtAddress,
    timeout: Duration,
}

impl LinkSession {
    /// Takes ownership of an established transport. The session starts
    /// open; it closes on `close()` or as a precaution after a transport
    /// fault.
    pub fn open(transport: Box<dyn ByteTransport>, local: BtAddress, peer: BtAddress) -> Self {
        Self {
            transport: Some(transport),
            local,
            peer,
            timeout: RECEIVE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn local(&self) -> BtAddress {
        self.local
    }

    pub fn peer(&self) -> BtAddress {
        self.peer
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Releases the transport. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                debug!("error closing transport: {}", e);
            }
        }
    }

    /// Writes one fully encoded frame. A stream error here leaves the
    /// session open; the caller decides whether to retry or close.
    pub async fn send(&mut self, frame: &[u8]) -> Result<(), ProtocolError> {
        let transport = self.transport.as_mut().ok_or(ProtocolError::Closed)?;
        trace!("TX {} bytes to {}", frame.len(), self.peer);
        transport.write_all(frame).await?;
        Ok(())
    }

    /// Reads frames until one carrying `expected` (or anything, for
    /// `command::ANY`) completes the logical response, reassembling the
    /// embedded record across fragments. Frames from the wrong sender and
    /// malformed frames are discarded and the loop keeps listening; only
    /// transport faults and the deadline end it early.
    pub async fn receive(&mut self, expected: u16) -> Result<Vec<u8>, ProtocolError> {
        match self.receive_inner(expected).await {
            Ok(buf) => Ok(buf),
            Err(e) => {
                if e.is_fatal() {
                    // Indeterminate mid-frame state; drop the stream rather
                    // than let the next request read stale bytes.
                    warn!("closing link after fatal receive error: {}", e);
                    self.transport = None;
                }
                Err(e)
            }
        }
    }

    async fn receive_inner(&mut self, expected: u16) -> Result<Vec<u8>, ProtocolError> {
        let mut acc: Vec<u8> = Vec::new();
        let mut unstuffer = Unstuffer::new();
        let mut has_record = false;

        loop {
            let mut header = [0u8; HEADER_LEN];
            self.read_exact(&mut header).await?;

            let frame = match FrameHeader::parse(&header) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("discarding malformed frame: {}", e);
                    continue;
                }
            };

            let mut body = BytesMut::zeroed(frame.length as usize - HEADER_LEN);
            self.read_exact(&mut body).await?;

            if frame.source != self.peer {
                warn!(
                    "{} (expected {}), discarding",
                    FrameError::WrongSender(frame.source),
                    self.peer
                );
                continue;
            }
            trace!(
                "RX frame len={} command={:#06x} from {}",
                frame.length,
                frame.control,
                frame.source
            );

            if !has_record && starts_embedded_record(&body) {
                has_record = true;
                // Lead-in delimiter stays raw; everything after it is stuffed.
                acc.push(DELIMITER);
                unstuffer.feed(&body[1..], &mut acc)?;
            } else if has_record {
                unstuffer.feed(&body, &mut acc)?;
            } else {
                // Legacy short response: payload taken verbatim.
                acc.clear();
                acc.extend_from_slice(&body);
            }

            if frame.control == expected || expected == command::ANY {
                return Ok(acc);
            }
            debug!(
                "awaiting command {:#06x}, got {:#06x}; reading on",
                expected, frame.control
            );
        }
    }

    /// Deadline-aware blocking read: each call gets a fresh deadline, and
    /// an elapsed deadline abandons the in-flight read.
    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ProtocolError> {
        let transport = self.transport.as_mut().ok_or(ProtocolError::Closed)?;

        let mut filled = 0;
        while filled < buf.len() {
            let read = tokio::time::timeout(self.timeout, transport.read(&mut buf[filled..]));
            match read.await {
                Ok(Ok(0)) => {
                    return Err(ProtocolError::Transport(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed by peer",
                    )))
                }
                Ok(Ok(n)) => filled += n,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Err(ProtocolError::Timeout(self.timeout)),
            }
        }
        Ok(())
    }
}

/// True when a frame payload opens an embedded record: a raw delimiter
/// followed by the little-endian record signature.
fn starts_embedded_record(body: &[u8]) -> bool {
    body.len() >= 5
        && body[0] == DELIMITER
        && u32::from_le_bytes([body[1], body[2], body[3], body[4]]) == record::SIGNATURE
}
