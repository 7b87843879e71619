use crate::prelude::*;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::sma::address::BtAddress;
use crate::sma::query::{self, UserGroup};
use crate::sma::record::SmaSerial;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub inverters: Vec<Inverter>,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,
}

// Inverter {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Inverter {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    /// RFCOMM gateway endpoint, host:port.
    pub endpoint: String,
    /// Bluetooth address of the device.
    pub address: String,
    /// Bluetooth address presented as ours. The gateway bridges the real
    /// adapter, so any stable address works.
    pub local_address: Option<String>,

    pub password: String,
    #[serde(default = "Config::default_user_group")]
    pub user_group: UserGroup,

    /// Seconds between polling cycles.
    pub poll_interval: Option<u64>,
    /// Seconds to wait on a silent link before giving up a read.
    pub receive_timeout: Option<u64>,
    /// Push the host clock to the device after each logon.
    pub sync_time: Option<bool>,

    /// Record-layer identity this binding presents; the defaults are fine
    /// unless several bridges poll the same device.
    pub app_susy_id: Option<u16>,
    pub app_serial: Option<u32>,
}

impl Inverter {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn address(&self) -> Result<BtAddress> {
        BtAddress::from_str(&self.address)
    }

    pub fn local_address(&self) -> Result<BtAddress> {
        match &self.local_address {
            Some(address) => BtAddress::from_str(address),
            None => Ok(BtAddress::new([0; 6])),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn user_group(&self) -> UserGroup {
        self.user_group
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval.unwrap_or(300))
    }

    pub fn receive_timeout(&self) -> Option<Duration> {
        self.receive_timeout.map(Duration::from_secs)
    }

    pub fn sync_time(&self) -> bool {
        self.sync_time == Some(true)
    }

    pub fn app_identity(&self) -> SmaSerial {
        SmaSerial::new(
            self.app_susy_id.unwrap_or(query::APP_IDENTITY.susy_id),
            self.app_serial.unwrap_or(query::APP_IDENTITY.serial),
        )
    }
}
// }}}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("error reading {}: {}", file, err))?;

        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.inverters.is_empty() {
            bail!("config contains no inverters");
        }
        for inverter in &self.inverters {
            inverter.address()?;
            inverter.local_address()?;
        }
        Ok(())
    }

    pub fn loglevel(&self) -> String {
        self.loglevel.clone()
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_user_group() -> UserGroup {
        UserGroup::User
    }
}

/// Cheaply cloneable handle passed to every component.
#[derive(Clone, Debug)]
pub struct ConfigWrapper {
    config: Arc<Config>,
}

impl ConfigWrapper {
    pub fn new(file: String) -> Result<Self> {
        Ok(Self::from_config(Config::new(file)?))
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn loglevel(&self) -> String {
        self.config.loglevel()
    }

    pub fn inverters(&self) -> &[Inverter] {
        &self.config.inverters
    }

    pub fn enabled_inverters(&self) -> impl Iterator<Item = &Inverter> {
        self.config.inverters.iter().filter(|i| i.enabled())
    }
}
