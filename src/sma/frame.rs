use crate::error::FrameError;
use crate::sma::address::BtAddress;
use crate::sma::checksum::ChecksumState;
use crate::sma::stuffing::{self, DELIMITER};

/// Bytes in the outer frame header: delimiter, length, header checksum,
/// two addresses, control word.
pub const HEADER_LEN: usize = 18;

/// Upper bound on a declared frame length; anything larger is garbage.
pub const MAX_FRAME_LEN: u16 = 1024;

/// Outer frame control words.
pub mod command {
    /// A data frame (also the final frame of a fragmented response).
    pub const DATA: u16 = 0x0001;
    /// Continuation fragment of a multi-frame response.
    pub const FRAGMENT: u16 = 0x0008;
    /// Wildcard passed to `receive` to accept any command.
    pub const ANY: u16 = 0x00FF;
}

// Frame {{{
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u16,
    pub source: BtAddress,
    pub destination: BtAddress,
    pub control: u16,
}

impl FrameHeader {
    /// Parses and validates the fixed-size header. The header checksum is
    /// delimiter XOR both length bytes.
    pub fn parse(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < HEADER_LEN {
            return Err(FrameError::TooShort(buf.len()));
        }
        if buf[0] != DELIMITER {
            return Err(FrameError::BadDelimiter(buf[0]));
        }

        let length = u16::from_le_bytes([buf[1], buf[2]]);
        let want = buf[0] ^ buf[1] ^ buf[2];
        if buf[3] != want {
            return Err(FrameError::HeaderChecksum { got: buf[3], want });
        }
        if length < HEADER_LEN as u16 || length > MAX_FRAME_LEN {
            return Err(FrameError::BadLength(length));
        }

        // from_wire cannot fail here, the length check above guarantees 18 bytes
        let source = BtAddress::from_wire(buf, 4).map_err(|_| FrameError::TooShort(buf.len()))?;
        let destination =
            BtAddress::from_wire(buf, 10).map_err(|_| FrameError::TooShort(buf.len()))?;
        let control = u16::from_le_bytes([buf[16], buf[17]]);

        Ok(Self {
            length,
            source,
            destination,
            control,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    /// Raw (still byte-stuffed) bytes following the header, up to the
    /// declared length.
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        let header = FrameHeader::parse(buf)?;
        if buf.len() != header.length as usize {
            return Err(FrameError::BadLength(header.length));
        }

        Ok(Self {
            payload: buf[HEADER_LEN..].to_vec(),
            header,
        })
    }
}
// }}}

// FrameBuilder {{{

/// Builds one outgoing frame. Header bytes are written raw; everything
/// pushed through the `write_*` methods is byte-stuffed and folded into the
/// rolling checksum. The length field and header checksum are backpatched
/// when the frame is finished.
pub struct FrameBuilder {
    buf: Vec<u8>,
    fcs: ChecksumState,
}

impl FrameBuilder {
    pub fn new(source: BtAddress, destination: BtAddress, control: u16) -> Self {
        let mut buf = Vec::with_capacity(96);
        buf.push(DELIMITER);
        buf.extend_from_slice(&[0, 0, 0]); // length + header checksum, backpatched
        buf.extend_from_slice(source.as_bytes());
        buf.extend_from_slice(destination.as_bytes());
        buf.extend_from_slice(&control.to_le_bytes());

        Self {
            buf,
            fcs: ChecksumState::new(),
        }
    }

    /// Writes one byte verbatim: no stuffing, not part of the checksum.
    /// Used for the embedded record's raw lead-in delimiter.
    pub fn write_raw(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    pub fn write_u8(&mut self, byte: u8) {
        self.fcs.update(byte);
        stuffing::escape_into(byte, &mut self.buf);
    }

    pub fn write_u16(&mut self, value: u16) {
        for byte in value.to_le_bytes() {
            self.write_u8(byte);
        }
    }

    pub fn write_u32(&mut self, value: u32) {
        for byte in value.to_le_bytes() {
            self.write_u8(byte);
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.write_u8(byte);
        }
    }

    /// True when a trailer byte would collide with a reserved byte. The
    /// trailer is written raw, so the sender must rebuild the request with
    /// a different packet id instead of sending this frame.
    pub fn checksum_clashes(&self) -> bool {
        let fcs = self.fcs.value().to_le_bytes();
        stuffing::is_reserved(fcs[0]) || stuffing::is_reserved(fcs[1])
    }

    /// Appends the finalized checksum and trailing delimiter, backpatches
    /// the length field, and yields the encoded frame.
    pub fn finish(mut self) -> Vec<u8> {
        let fcs = self.fcs.value().to_le_bytes();
        self.buf.push(fcs[0]);
        self.buf.push(fcs[1]);
        self.buf.push(DELIMITER);

        self.finalize_length();
        self.buf
    }

    /// Finishes a frame with no embedded record and no trailer.
    pub fn finish_bare(mut self) -> Vec<u8> {
        self.finalize_length();
        self.buf
    }

    fn finalize_length(&mut self) {
        let len = (self.buf.len() as u16).to_le_bytes();
        self.buf[1] = len[0];
        self.buf[2] = len[1];
        self.buf[3] = self.buf[0] ^ self.buf[1] ^ self.buf[2];
    }
}
// }}}
