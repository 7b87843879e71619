use clap::Parser;

/// SMA Bridge - monitors SMA inverters over their Bluetooth interface
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Options {
    /// Config file to read
    #[clap(short = 'c', long = "config", default_value = "config.yaml")]
    pub config_file: String,

    /// Poll each inverter once and exit
    #[clap(short = '1', long = "once")]
    pub once: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }
}
