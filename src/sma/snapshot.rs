use std::collections::HashMap;

use serde::Serialize;

use crate::sma::catalog::{Lri, ObjectCatalog};
use crate::sma::record::SmaSerial;

/// One decoded telemetry value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Numeric(f64),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Numeric(v) => Some(*v),
            Value::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Numeric(_) => None,
            Value::Text(s) => Some(s),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Numeric(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Everything learned about one device across a polling cycle: its
/// identity from the type label, and the latest decoded value per data
/// object. Values for objects a device does not report simply stay
/// absent.
#[derive(Clone, Debug, Default, Serialize)]
pub struct TelemetrySnapshot {
    pub serial: Option<SmaSerial>,
    pub device_name: Option<String>,
    pub device_class: Option<String>,
    pub device_type: Option<String>,
    pub sw_version: Option<String>,
    pub device_status: Option<String>,
    pub values: HashMap<Lri, Value>,
}

impl TelemetrySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, lri: Lri, value: Value) {
        self.values.insert(lri, value);
    }

    pub fn get(&self, lri: Lri) -> Option<&Value> {
        self.values.get(&lri)
    }

    /// Looks up a value by its external channel key, e.g. "etotal".
    pub fn by_channel(&self, catalog: &ObjectCatalog, channel: &str) -> Option<&Value> {
        catalog
            .definitions_for_channel(channel)
            .and_then(|lri| self.values.get(&lri))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.serial.is_none() && self.device_name.is_none()
    }
}
