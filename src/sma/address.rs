use crate::prelude::*;

use serde::{Serialize, Serializer};

/// Bluetooth device address as it appears on the wire: 6 bytes, least
/// significant byte first. The all-ones address is the broadcast address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BtAddress([u8; 6]);

impl BtAddress {
    pub const BROADCAST: BtAddress = BtAddress([0xFF; 6]);

    pub fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Reads an address from `buf` at `offset`, in wire (low-endian) order.
    pub fn from_wire(buf: &[u8], offset: usize) -> Result<Self> {
        let slice = buf
            .get(offset..offset + 6)
            .ok_or_else(|| anyhow!("address out of bounds at offset {}", offset))?;
        let mut bytes = [0u8; 6];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xFF; 6]
    }
}

impl std::str::FromStr for BtAddress {
    type Err = anyhow::Error;

    /// Parses the human form `00:80:25:15:B6:06` (most significant byte
    /// first) into wire order.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            bail!("bluetooth address must have 6 octets: {}", s);
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            bytes[5 - i] = u8::from_str_radix(part, 16)
                .map_err(|e| anyhow!("bad octet '{}' in {}: {}", part, s, e))?;
        }
        Ok(Self(bytes))
    }
}

impl std::fmt::Display for BtAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[5], self.0[4], self.0[3], self.0[2], self.0[1], self.0[0]
        )
    }
}

impl std::fmt::Debug for BtAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl Serialize for BtAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parse_and_display_round_trip() {
        let addr = BtAddress::from_str("00:80:25:15:B6:06").unwrap();
        assert_eq!(addr.as_bytes(), &[0x06, 0xB6, 0x15, 0x25, 0x80, 0x00]);
        assert_eq!(addr.to_string(), "00:80:25:15:B6:06");
    }

    #[test]
    fn broadcast_is_all_ones() {
        assert!(BtAddress::BROADCAST.is_broadcast());
        assert!(!BtAddress::from_str("00:80:25:15:B6:06").unwrap().is_broadcast());
    }

    #[test]
    fn rejects_malformed() {
        assert!(BtAddress::from_str("00:80:25").is_err());
        assert!(BtAddress::from_str("00:80:25:15:B6:ZZ").is_err());
    }
}
