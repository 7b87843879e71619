use chrono::{Local, Utc};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

use crate::error::{FrameError, ProtocolError};
use crate::prelude::*;
use crate::sma::catalog::{Category, ObjectCatalog};
use crate::sma::decode::ResponseDecoder;
use crate::sma::frame::{command, FrameBuilder};
use crate::sma::link::LinkSession;
use crate::sma::record::{EmbeddedRecord, RecordHeader, SmaSerial};
use crate::sma::snapshot::TelemetrySnapshot;

/// Record-layer command words.
pub mod commands {
    pub const LOGON: u32 = 0xFFFD_040C;
    pub const LOGOFF: u32 = 0xFFFD_010E;
    pub const SET_TIME: u32 = 0xF000_020A;
}

/// Identity this binding presents to the device.
pub const APP_IDENTITY: SmaSerial = SmaSerial {
    susy_id: 125,
    serial: 934_043_669,
};

/// Seconds of inactivity after which the device drops a logon by itself.
const LOGON_TIMEOUT_SECS: u32 = 900;

/// Attempts per category before it is given up for this cycle.
const CATEGORY_ATTEMPTS: u32 = 3;

/// Categories queried in one polling cycle, identity first so a fresh
/// snapshot carries the device name even when later groups fail.
pub const POLL_CATEGORIES: &[Category] = &[
    Category::TypeLabel,
    Category::SoftwareVersion,
    Category::DeviceStatus,
    Category::GridRelayStatus,
    Category::EnergyProduction,
    Category::OperationTime,
    Category::SpotDcPower,
    Category::SpotDcVoltage,
    Category::SpotAcTotalPower,
    Category::SpotAcPower,
    Category::SpotAcVoltage,
    Category::SpotGridFrequency,
    Category::MaxAcPower,
    Category::MaxAcPower2,
    Category::InverterTemperature,
    Category::BatteryChargeStatus,
    Category::BatteryInfo,
];

// UserGroup {{{
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive, Serialize, Deserialize,
)]
#[repr(u32)]
#[serde(rename_all = "lowercase")]
pub enum UserGroup {
    User = 0x07,
    Installer = 0x0A,
}
// }}}

/// Turns the configured password into the 12 credential bytes of a logon
/// request. Kept behind a trait so the wire obfuscation a given firmware
/// expects can be swapped in without touching the session.
pub trait CredentialEncoder: Send {
    fn encode(&self, group: UserGroup, password: &str) -> [u8; 12];
}

/// Password bytes as-is, NUL padded.
pub struct PlainCredential;

impl CredentialEncoder for PlainCredential {
    fn encode(&self, _group: UserGroup, password: &str) -> [u8; 12] {
        let mut credential = [0u8; 12];
        for (slot, byte) in credential.iter_mut().zip(password.bytes()) {
            *slot = byte;
        }
        credential
    }
}

/// Drives the authenticate / fetch / logoff cycle over an open link.
/// One request is in flight at a time; the packet id correlates each
/// response with the request it answers.
pub struct QuerySession {
    link: LinkSession,
    catalog: ObjectCatalog,
    app: SmaSerial,
    peer_serial: Option<SmaSerial>,
    packet_id: u16,
    encoder: Box<dyn CredentialEncoder>,
}

impl QuerySession {
    pub fn new(link: LinkSession) -> Self {
        Self {
            link,
            catalog: ObjectCatalog::new(),
            app: APP_IDENTITY,
            peer_serial: None,
            packet_id: 0,
            encoder: Box::new(PlainCredential),
        }
    }

    pub fn with_app_identity(mut self, app: SmaSerial) -> Self {
        self.app = app;
        self
    }

    pub fn with_credential_encoder(mut self, encoder: Box<dyn CredentialEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn peer_serial(&self) -> Option<SmaSerial> {
        self.peer_serial
    }

    pub fn is_open(&self) -> bool {
        self.link.is_open()
    }

    /// Authenticates against the device. The device's record-layer
    /// identity is learned from the reply and addressed directly from
    /// then on.
    pub async fn logon(
        &mut self,
        group: UserGroup,
        password: &str,
    ) -> Result<(), ProtocolError> {
        let now = Utc::now().timestamp() as u32;
        let credential = self.encoder.encode(group, password);
        let frame = self.build_request(0x0E, 0xA0, SmaSerial::ANY, 0x0100, &|b| {
            b.write_u32(commands::LOGON);
            b.write_u32(u32::from(group));
            b.write_u32(LOGON_TIMEOUT_SECS);
            b.write_u32(now);
            b.write_u32(0);
            b.write_bytes(&credential);
        });
        self.link.send(&frame).await?;

        let record = self.receive_record().await?;
        if record.result != 0 {
            return Err(ProtocolError::Auth(record.result));
        }
        info!("logged on to {} as {:?}", record.source, group);
        self.peer_serial = Some(record.source);
        Ok(())
    }

    /// Announces the end of the session. Fire and forget: no reply is
    /// defined for it and failure to send only means the device times
    /// the logon out on its own.
    pub async fn logoff(&mut self) {
        if !self.link.is_open() {
            return;
        }
        let frame = self.build_request(0x08, 0xA0, SmaSerial::ANY, 0x0300, &|b| {
            b.write_u32(commands::LOGOFF);
            b.write_u32(0xFFFF_FFFF);
        });
        if let Err(e) = self.link.send(&frame).await {
            debug!("logoff not sent: {}", e);
        }
        self.peer_serial = None;
    }

    /// Pushes the host clock (with UTC offset) to the device.
    pub async fn set_device_time(&mut self) -> Result<(), ProtocolError> {
        let now = Local::now();
        let offset = now.offset().local_minus_utc();
        let time = now.timestamp() as u32;
        let destination = self.peer_serial.unwrap_or(SmaSerial::ANY);

        let frame = self.build_request(0x10, 0xA0, destination, 0, &|b| {
            b.write_u32(commands::SET_TIME);
            b.write_u32(0x0023_6D00);
            b.write_u32(0x0023_6D00);
            b.write_u32(0x0023_6D00);
            b.write_u32(time);
            b.write_u32(time);
            b.write_u32(time);
            b.write_u32(offset as u32);
            b.write_u32(1);
        });
        self.link.send(&frame).await
    }

    /// Queries every polling category into one snapshot.
    pub async fn fetch(&mut self) -> Result<TelemetrySnapshot, ProtocolError> {
        self.fetch_categories(POLL_CATEGORIES).await
    }

    /// Queries the given categories into one snapshot. A category that
    /// keeps failing is logged and left out; only a dead link ends the
    /// cycle early.
    pub async fn fetch_categories(
        &mut self,
        categories: &[Category],
    ) -> Result<TelemetrySnapshot, ProtocolError> {
        let mut snapshot = TelemetrySnapshot::new();
        snapshot.serial = self.peer_serial;

        for &category in categories {
            match self.request_category(category, &mut snapshot).await {
                Ok(applied) => debug!("{:?}: applied {} records", category, applied),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("{}", e),
            }
        }
        Ok(snapshot)
    }

    /// One full cycle: logon, fetch, logoff.
    pub async fn read_snapshot(
        &mut self,
        group: UserGroup,
        password: &str,
    ) -> Result<TelemetrySnapshot, ProtocolError> {
        self.logon(group, password).await?;
        let result = self.fetch().await;
        self.logoff().await;
        result
    }

    pub async fn close(&mut self) {
        self.logoff().await;
        self.link.close().await;
    }

    /// Requests one category, retrying on recoverable protocol errors.
    pub async fn request_category(
        &mut self,
        category: Category,
        snapshot: &mut TelemetrySnapshot,
    ) -> Result<usize, ProtocolError> {
        for attempt in 1..=CATEGORY_ATTEMPTS {
            match self.try_category(category).await {
                Ok(data) => {
                    let applied =
                        ResponseDecoder::new(&self.catalog).decode(category, &data, snapshot);
                    return Ok(applied);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        "{:?}: attempt {}/{} failed: {}",
                        category, attempt, CATEGORY_ATTEMPTS, e
                    );
                }
            }
        }
        Err(ProtocolError::CategoryFetch(category, CATEGORY_ATTEMPTS))
    }

    async fn try_category(&mut self, category: Category) -> Result<Vec<u8>, ProtocolError> {
        let destination = self.peer_serial.unwrap_or(SmaSerial::ANY);
        let (first, last) = category.range();
        let frame = self.build_request(0x09, 0xA0, destination, 0, &|b| {
            b.write_u32(category.command());
            b.write_u32(first);
            b.write_u32(last);
        });
        self.link.send(&frame).await?;

        let mut data = Vec::new();
        loop {
            let record = self.receive_record().await?;
            if record.result != 0 {
                return Err(FrameError::Rejected(record.result).into());
            }
            data.extend_from_slice(&record.data);
            if record.final_fragment {
                return Ok(data);
            }
            trace!(
                "{:?}: {} record fragments still outstanding",
                category,
                record.fragments_left
            );
        }
    }

    /// Receives and validates one embedded record, dropping replies to a
    /// request this session no longer has in flight.
    async fn receive_record(&mut self) -> Result<EmbeddedRecord, ProtocolError> {
        loop {
            let buf = self.link.receive(command::DATA).await?;
            let record = EmbeddedRecord::parse(&buf)?;
            if record.packet_id != self.packet_id {
                warn!(
                    "{}",
                    FrameError::StalePacketId {
                        got: record.packet_id,
                        want: self.packet_id,
                    }
                );
                continue;
            }
            return Ok(record);
        }
    }

    /// Builds one request frame under a fresh packet id. The trailer is
    /// written raw, so when its checksum lands on a reserved byte the
    /// request is rebuilt under the next id until it does not.
    fn build_request(
        &mut self,
        longwords: u8,
        control: u8,
        destination: SmaSerial,
        control2: u16,
        write_data: &dyn Fn(&mut FrameBuilder),
    ) -> Vec<u8> {
        loop {
            self.bump_packet_id();
            let mut builder =
                FrameBuilder::new(self.link.local(), self.link.peer(), command::DATA);
            RecordHeader {
                longwords,
                control,
                destination,
                control2,
                source: self.app,
                packet_id: self.packet_id,
            }
            .write(&mut builder);
            write_data(&mut builder);

            if builder.checksum_clashes() {
                debug!(
                    "checksum clashes with a reserved byte under packet id {}, rebuilding",
                    self.packet_id
                );
                continue;
            }
            return builder.finish();
        }
    }

    fn bump_packet_id(&mut self) {
        self.packet_id = (self.packet_id + 1) & 0x7FFF;
        if self.packet_id == 0 {
            self.packet_id = 1;
        }
    }
}
