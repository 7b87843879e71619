use nom::bytes::complete::take;
use nom::number::complete::{le_i32, le_u32, le_u64};
use nom::sequence::tuple;
use nom::IResult;

use crate::prelude::*;
use crate::sma::catalog::{
    attribute_name, device_class_name, model_name, Category, Lri, LriDef, ObjectCatalog,
    RecordKind, ValueKind,
};
use crate::sma::snapshot::{TelemetrySnapshot, Value};

/// Command echo plus the identifier range, leading every data response.
pub const PROLOGUE_LEN: usize = 12;

// Value-not-available markers. A device reports these for objects it
// knows about but cannot measure right now (e.g. DC values at night).
const NAN_S32: u32 = 0x8000_0000;
const NAN_U32: u32 = 0xFFFF_FFFF;
const NAN_S64: u64 = 0x8000_0000_0000_0000;
const NAN_U64: u64 = 0xFFFF_FFFF_FFFF_FFFF;

/// Tag terminating an attribute list before all eight slots are used.
const ATTRIBUTE_END: u32 = 0x00FF_FFFE;

/// Decodes one category response into a snapshot. Never fails wholesale:
/// unknown identifiers, out-of-range records and unavailable values are
/// skipped or zeroed record by record.
pub struct ResponseDecoder<'a> {
    catalog: &'a ObjectCatalog,
}

impl<'a> ResponseDecoder<'a> {
    pub fn new(catalog: &'a ObjectCatalog) -> Self {
        Self { catalog }
    }

    /// Walks the fixed-size records after the prologue and folds each
    /// recognized one into `snapshot`. Returns how many records were
    /// applied.
    pub fn decode(
        &self,
        category: Category,
        data: &[u8],
        snapshot: &mut TelemetrySnapshot,
    ) -> usize {
        let (mut rest, (echo, first, last)) = match prologue(data) {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("{:?}: response shorter than its prologue, ignoring", category);
                return 0;
            }
        };
        if echo != category.command() {
            debug!(
                "{:?}: command echo {:#010x} differs from request {:#010x}",
                category,
                echo,
                category.command()
            );
        }

        let kind = category.record_kind();
        let mut applied = 0;
        while rest.len() >= kind.size() {
            let (tail, raw) = match record(kind, rest) {
                Ok(parsed) => parsed,
                Err(_) => break,
            };
            rest = tail;

            let id = raw.id & 0x00FF_FFFF;
            if id < first & 0x00FF_FFFF || id > last & 0x00FF_FFFF {
                trace!("{:?}: identifier {:#08x} outside echoed range", category, id);
                continue;
            }
            let Some(entry) = self.catalog.by_id(id) else {
                trace!("{:?}: unknown identifier {:#08x}", category, id);
                continue;
            };

            self.apply(entry, &raw, snapshot);
            applied += 1;
        }
        if !rest.is_empty() {
            debug!("{:?}: {} trailing bytes after last record", category, rest.len());
        }
        applied
    }

    fn apply(&self, entry: &LriDef, raw: &RawRecord<'_>, snapshot: &mut TelemetrySnapshot) {
        match (entry.kind, &raw.payload) {
            (ValueKind::U64, RawPayload::Counter(value)) => {
                let value = match *value {
                    NAN_S64 | NAN_U64 => 0,
                    v => v,
                };
                snapshot.set(entry.lri, Value::Numeric(value as f64 / entry.divisor));
            }
            (ValueKind::S32, RawPayload::Spot(value)) => {
                let value = match *value as u32 {
                    NAN_S32 | NAN_U32 => 0,
                    _ => *value,
                };
                snapshot.set(entry.lri, Value::Numeric(f64::from(value) / entry.divisor));
            }
            (ValueKind::Text, RawPayload::Bytes(data)) => {
                let text = decode_text(data);
                trace!("{}: \"{}\"", entry.code, text);
                if entry.lri == Lri::NameplateLocation {
                    snapshot.device_name = Some(text);
                } else {
                    snapshot.set(entry.lri, Value::Text(text));
                }
            }
            (ValueKind::Attribute, RawPayload::Bytes(data)) => {
                let Some(tag) = active_attribute(data) else {
                    trace!("{}: no active attribute", entry.code);
                    return;
                };
                self.apply_attribute(entry, tag, snapshot);
            }
            (ValueKind::Version, RawPayload::Bytes(data)) => {
                let version = decode_version(&data[16..20]);
                trace!("{}: {}", entry.code, version);
                snapshot.sw_version = Some(version);
            }
            _ => {
                // Catalog kind and category record kind disagree; the
                // definition table keeps them consistent, so never decode
                // through the wrong layout.
                warn!("{}: record layout mismatch, skipping", entry.code);
            }
        }
    }

    fn apply_attribute(&self, entry: &LriDef, tag: u32, snapshot: &mut TelemetrySnapshot) {
        match entry.lri {
            Lri::NameplateMainModel => {
                snapshot.device_class = Some(device_class_name(tag));
            }
            Lri::NameplateModel => {
                let model = model_name(tag);
                snapshot.device_type = Some(model.to_string());
                snapshot.set(entry.lri, Value::Text(model.to_string()));
            }
            Lri::OperationHealth => {
                snapshot.device_status = Some(tag_text(tag));
            }
            Lri::OperationGriSwStt => {
                snapshot.set(entry.lri, Value::Text(tag_text(tag)));
            }
            _ => {
                snapshot.set(entry.lri, Value::Numeric(f64::from(tag)));
            }
        }
    }
}

struct RawRecord<'a> {
    id: u32,
    #[allow(dead_code)]
    timestamp: u32,
    payload: RawPayload<'a>,
}

enum RawPayload<'a> {
    Counter(u64),
    Spot(i32),
    Bytes(&'a [u8]),
}

fn prologue(input: &[u8]) -> IResult<&[u8], (u32, u32, u32)> {
    tuple((le_u32, le_u32, le_u32))(input)
}

fn record(kind: RecordKind, input: &[u8]) -> IResult<&[u8], RawRecord<'_>> {
    let (input, (id, timestamp)) = tuple((le_u32, le_u32))(input)?;
    let (input, payload) = match kind {
        RecordKind::Energy => {
            let (input, value) = le_u64(input)?;
            (input, RawPayload::Counter(value))
        }
        RecordKind::Spot => {
            let (input, value) = le_i32(input)?;
            // Repeated copies of the value; only the first is meaningful.
            let (input, _) = take(16usize)(input)?;
            (input, RawPayload::Spot(value))
        }
        RecordKind::Attribute => {
            let (input, data) = take(32usize)(input)?;
            (input, RawPayload::Bytes(data))
        }
    };
    Ok((input, RawRecord { id, timestamp, payload }))
}

/// NUL-padded device text; bytes after the first NUL are padding.
fn decode_text(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).trim().to_string()
}

/// Scans the eight tagged slots of an attribute record for the active
/// one: low 24 bits are the tag, a 1 in the top byte marks it active.
fn active_attribute(data: &[u8]) -> Option<u32> {
    for chunk in data.chunks_exact(4).take(8) {
        let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let tag = word & 0x00FF_FFFF;
        if tag == ATTRIBUTE_END {
            break;
        }
        if word >> 24 == 1 {
            return Some(tag);
        }
    }
    None
}

fn tag_text(tag: u32) -> String {
    match attribute_name(tag) {
        Some(name) => name.to_string(),
        None => format!("{}", tag),
    }
}

/// Firmware version quad, wire order release/build/minor/major. Release
/// levels 0-5 print as their letter (N, E, A, B, R, S).
fn decode_version(quad: &[u8]) -> String {
    const RELEASE: &[u8] = b"NEABRS";
    let (release, build, minor, major) = (quad[0], quad[1], quad[2], quad[3]);
    match RELEASE.get(release as usize) {
        Some(&letter) => format!("{:02}.{:02}.{:02}.{}", major, minor, build, letter as char),
        None => format!("{:02}.{:02}.{:02}.{}", major, minor, build, release),
    }
}
