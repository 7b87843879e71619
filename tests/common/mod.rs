// Not every test binary uses every helper.
#![allow(dead_code)]

use std::str::FromStr;

use sma_bridge::sma::address::BtAddress;
use sma_bridge::sma::frame::{command, FrameBuilder, HEADER_LEN};
use sma_bridge::sma::query::APP_IDENTITY;
use sma_bridge::sma::record::{SmaSerial, FINAL_FRAGMENT, SIGNATURE};
use sma_bridge::sma::stuffing::DELIMITER;

pub struct Factory;

impl Factory {
    pub fn local_address() -> BtAddress {
        BtAddress::from_str("00:11:22:33:44:55").unwrap()
    }

    pub fn peer_address() -> BtAddress {
        BtAddress::from_str("00:80:25:15:B6:06").unwrap()
    }

    pub fn device_serial() -> SmaSerial {
        SmaSerial::new(0x0071, 2_100_052_746)
    }

    /// Raw outer frame with an arbitrary payload region; length and header
    /// checksum are computed, nothing else is touched. Lets a test split
    /// one response across FRAGMENT/DATA frames at any byte boundary.
    pub fn frame(source: BtAddress, control: u16, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![DELIMITER, 0, 0, 0];
        buf.extend_from_slice(source.as_bytes());
        buf.extend_from_slice(Self::local_address().as_bytes());
        buf.extend_from_slice(&control.to_le_bytes());
        buf.extend_from_slice(payload);

        let len = (buf.len() as u16).to_le_bytes();
        buf[1] = len[0];
        buf[2] = len[1];
        buf[3] = buf[0] ^ buf[1] ^ buf[2];
        buf
    }

    /// Complete single-frame device response carrying one embedded record.
    pub fn response_frame(packet_id: u16, result: u16, data: &[u8]) -> Vec<u8> {
        let payload = Self::response_payload(packet_id, result, data);
        Self::frame(Self::peer_address(), command::DATA, &payload)
    }

    /// The payload region (stuffed record plus trailer) of a device
    /// response, for tests that frame it themselves.
    pub fn response_payload(packet_id: u16, result: u16, data: &[u8]) -> Vec<u8> {
        let mut b = FrameBuilder::new(Self::peer_address(), Self::local_address(), command::DATA);
        b.write_raw(DELIMITER);
        b.write_u32(SIGNATURE);
        b.write_u8(0x0E);
        b.write_u8(0xA0);
        b.write_u16(APP_IDENTITY.susy_id);
        b.write_u32(APP_IDENTITY.serial);
        b.write_u16(0);
        b.write_u16(Self::device_serial().susy_id);
        b.write_u32(Self::device_serial().serial);
        b.write_u16(0);
        b.write_u16(result);
        b.write_u16(0);
        b.write_u16(packet_id | FINAL_FRAGMENT);
        b.write_bytes(data);
        b.finish()[HEADER_LEN..].to_vec()
    }

    pub fn logon_reply(packet_id: u16, result: u16) -> Vec<u8> {
        Self::response_frame(packet_id, result, &[])
    }

    /// Command echo and identifier range opening a data response.
    pub fn prologue(cmd: u32, first: u32, last: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&cmd.to_le_bytes());
        buf.extend_from_slice(&first.to_le_bytes());
        buf.extend_from_slice(&last.to_le_bytes());
        buf
    }

    /// 16-byte energy record.
    pub fn energy_record(id: u32, timestamp: u32, value: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&id.to_le_bytes());
        buf.extend_from_slice(&timestamp.to_le_bytes());
        buf.extend_from_slice(&value.to_le_bytes());
        buf
    }

    /// 28-byte spot value record.
    pub fn spot_record(id: u32, timestamp: u32, value: i32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&id.to_le_bytes());
        buf.extend_from_slice(&timestamp.to_le_bytes());
        for _ in 0..4 {
            buf.extend_from_slice(&value.to_le_bytes());
        }
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf
    }
}
