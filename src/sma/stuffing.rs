use crate::error::ProtocolError;

/// Frame delimiter; also the raw lead-in byte of an embedded record.
pub const DELIMITER: u8 = 0x7E;
/// Escape marker inside byte-stuffed regions.
pub const ESCAPE: u8 = 0x7D;
/// XOR applied to the byte following an escape marker.
const ESCAPE_XOR: u8 = 0x20;

/// Hard bound on the unstuffed accumulation buffer. Exceeding it is a
/// fatal decode error for the whole response, never a silent truncation.
pub const REASSEMBLY_BOUND: usize = 520;

/// Bytes that must not appear literally inside a checksummed region.
pub fn is_reserved(byte: u8) -> bool {
    matches!(byte, 0x7E | 0x7D | 0x11 | 0x12 | 0x13)
}

/// Appends `byte` to `out`, escaped if reserved. One or two output bytes.
pub fn escape_into(byte: u8, out: &mut Vec<u8>) {
    if is_reserved(byte) {
        out.push(ESCAPE);
        out.push(byte ^ ESCAPE_XOR);
    } else {
        out.push(byte);
    }
}

/// Streaming unstuffer. Escape state persists across calls so that an
/// escape sequence split between two frames of one response is still
/// decoded correctly.
#[derive(Default)]
pub struct Unstuffer {
    escape_next: bool,
}

impl Unstuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw wire bytes, appending decoded bytes to `out`.
    pub fn feed(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<(), ProtocolError> {
        for &byte in input {
            if self.escape_next {
                self.push(byte ^ ESCAPE_XOR, out)?;
                self.escape_next = false;
            } else if byte == ESCAPE {
                self.escape_next = true;
            } else {
                self.push(byte, out)?;
            }
        }
        Ok(())
    }

    fn push(&self, byte: u8, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
        if out.len() >= REASSEMBLY_BOUND {
            return Err(ProtocolError::Reassembly(out.len()));
        }
        out.push(byte);
        Ok(())
    }
}

/// One-shot unstuff, for regions known to fit in a single buffer.
pub fn unescape(input: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::with_capacity(input.len());
    Unstuffer::new().feed(input, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escape(input: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for &b in input {
            escape_into(b, &mut out);
        }
        out
    }

    #[test]
    fn round_trip_with_reserved_bytes() {
        let original = vec![0x00, 0x7E, 0x41, 0x7D, 0x11, 0x12, 0x13, 0xFF, 0x20];
        let stuffed = escape(&original);
        assert_eq!(unescape(&stuffed).unwrap(), original);
    }

    #[test]
    fn reserved_bytes_never_appear_escaped() {
        for byte in 0..=u8::MAX {
            let stuffed = escape(&[byte]);
            if is_reserved(byte) {
                assert_eq!(stuffed, vec![ESCAPE, byte ^ 0x20]);
            } else {
                assert_eq!(stuffed, vec![byte]);
            }
        }
    }

    #[test]
    fn escape_split_across_feeds() {
        let mut out = Vec::new();
        let mut unstuffer = Unstuffer::new();
        unstuffer.feed(&[0x01, ESCAPE], &mut out).unwrap();
        unstuffer.feed(&[0x5E, 0x02], &mut out).unwrap();
        assert_eq!(out, vec![0x01, 0x7E, 0x02]);
    }

    #[test]
    fn overflow_is_an_error_not_a_truncation() {
        let input = vec![0x42u8; REASSEMBLY_BOUND + 1];
        let err = unescape(&input).unwrap_err();
        assert!(matches!(err, ProtocolError::Reassembly(n) if n == REASSEMBLY_BOUND));
    }
}
