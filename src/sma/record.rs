use serde::Serialize;

use crate::error::FrameError;
use crate::sma::checksum::ChecksumState;
use crate::sma::frame::FrameBuilder;
use crate::sma::stuffing::DELIMITER;

/// Signature marking the start of an embedded record inside a frame's
/// payload; appears on the wire as FF 03 60 65 after a raw 0x7E.
pub const SIGNATURE: u32 = 0x656003FF;

/// Offset of command-specific data within the reassembled record buffer.
pub const DATA_OFFSET: usize = 29;

/// Top bit of the packet id: final fragment of the logical exchange.
pub const FINAL_FRAGMENT: u16 = 0x8000;

/// Device identity at the record layer: subsystem id plus serial number.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct SmaSerial {
    pub susy_id: u16,
    pub serial: u32,
}

impl SmaSerial {
    /// Address-any, used before the peer identity is known (logon, logoff).
    pub const ANY: SmaSerial = SmaSerial {
        susy_id: 0xFFFF,
        serial: 0xFFFF_FFFF,
    };

    pub fn new(susy_id: u16, serial: u32) -> Self {
        Self { susy_id, serial }
    }
}

impl std::fmt::Display for SmaSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.susy_id, self.serial)
    }
}

/// Header fields of an outgoing embedded record. The whole header is
/// byte-stuffed and checksummed as it is written, apart from the lead-in.
pub struct RecordHeader {
    pub longwords: u8,
    pub control: u8,
    pub destination: SmaSerial,
    pub control2: u16,
    pub source: SmaSerial,
    pub packet_id: u16,
}

impl RecordHeader {
    /// Writes the record header into a frame under construction. Requests
    /// are always single-fragment, so the final bit is set on the way out.
    pub fn write(&self, builder: &mut FrameBuilder) {
        builder.write_raw(DELIMITER);
        builder.write_u32(SIGNATURE);
        builder.write_u8(self.longwords);
        builder.write_u8(self.control);
        builder.write_u16(self.destination.susy_id);
        builder.write_u32(self.destination.serial);
        builder.write_u16(self.control2);
        builder.write_u16(self.source.susy_id);
        builder.write_u32(self.source.serial);
        builder.write_u16(self.control2);
        builder.write_u16(0);
        builder.write_u16(0);
        builder.write_u16(self.packet_id | FINAL_FRAGMENT);
    }
}

/// A fully reassembled inbound record, validated against its trailer
/// checksum before any field is interpreted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbeddedRecord {
    pub longwords: u8,
    pub control: u8,
    pub destination: SmaSerial,
    pub control2: u16,
    pub source: SmaSerial,
    /// Reply status; nonzero means the device rejected the request.
    pub result: u16,
    /// Count of record fragments still outstanding after this one.
    pub fragments_left: u16,
    /// Low 15 bits of the packet id, correlating fragments of one exchange.
    pub packet_id: u16,
    pub final_fragment: bool,
    /// Command-specific bytes between the header and the trailer.
    pub data: Vec<u8>,
}

fn word16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

fn word32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

impl EmbeddedRecord {
    /// Parses the reassembled (already unstuffed) buffer produced by the
    /// link session: raw 0x7E, signature, header, data, checksum, 0x7E.
    pub fn parse(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < DATA_OFFSET + 3 {
            return Err(FrameError::Truncated(buf.len()));
        }
        if buf[0] != DELIMITER || word32(buf, 1) != SIGNATURE {
            return Err(FrameError::NoSignature);
        }
        if buf[buf.len() - 1] != DELIMITER {
            return Err(FrameError::Truncated(buf.len()));
        }

        // Checksum spans signature through end of data; lead-in and
        // trailer are outside it.
        let fcs_offset = buf.len() - 3;
        let mut fcs = ChecksumState::new();
        fcs.update_slice(&buf[1..fcs_offset]);
        let got = word16(buf, fcs_offset);
        if got != fcs.value() {
            return Err(FrameError::Checksum {
                got,
                want: fcs.value(),
            });
        }

        let packet_id = word16(buf, 27);

        Ok(Self {
            longwords: buf[5],
            control: buf[6],
            destination: SmaSerial::new(word16(buf, 7), word32(buf, 9)),
            control2: word16(buf, 13),
            source: SmaSerial::new(word16(buf, 15), word32(buf, 17)),
            result: word16(buf, 23),
            fragments_left: word16(buf, 25),
            packet_id: packet_id & !FINAL_FRAGMENT,
            final_fragment: packet_id & FINAL_FRAGMENT != 0,
            data: buf[DATA_OFFSET..fcs_offset].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sma::address::BtAddress;
    use crate::sma::frame::{command, Frame, FrameBuilder};
    use crate::sma::stuffing::unescape;

    fn encode(data: &[u8]) -> Vec<u8> {
        let mut builder = FrameBuilder::new(
            BtAddress::new([1, 2, 3, 4, 5, 6]),
            BtAddress::new([6, 5, 4, 3, 2, 1]),
            command::DATA,
        );
        RecordHeader {
            longwords: 0x09,
            control: 0xA0,
            destination: SmaSerial::new(0x0071, 2100052746),
            control2: 0,
            source: SmaSerial::new(125, 934043669),
            packet_id: 0x0001,
        }
        .write(&mut builder);
        builder.write_bytes(data);
        builder.finish()
    }

    #[test]
    fn encode_parse_round_trip() {
        let encoded = encode(&[0xAA, 0x7E, 0xBB, 0x7D]);
        let frame = Frame::decode(&encoded).unwrap();
        let record = EmbeddedRecord::parse(&unescape_payload(&frame)).unwrap();

        assert_eq!(record.longwords, 0x09);
        assert_eq!(record.control, 0xA0);
        assert_eq!(record.destination, SmaSerial::new(0x0071, 2100052746));
        assert_eq!(record.source, SmaSerial::new(125, 934043669));
        assert_eq!(record.packet_id, 0x0001);
        assert!(record.final_fragment);
        assert_eq!(record.result, 0);
        assert_eq!(record.data, vec![0xAA, 0x7E, 0xBB, 0x7D]);
    }

    #[test]
    fn corrupted_data_fails_the_checksum() {
        let encoded = encode(&[1, 2, 3, 4]);
        let frame = Frame::decode(&encoded).unwrap();
        let mut buf = unescape_payload(&frame);
        buf[DATA_OFFSET] ^= 0x01;

        assert!(matches!(
            EmbeddedRecord::parse(&buf),
            Err(FrameError::Checksum { .. })
        ));
    }

    // The record region of a payload: lead-in kept raw, the rest unstuffed.
    // The trailer bytes pass through unchanged since they are never reserved.
    fn unescape_payload(frame: &Frame) -> Vec<u8> {
        let mut buf = vec![frame.payload[0]];
        buf.extend(unescape(&frame.payload[1..]).unwrap());
        buf
    }
}
