pub use std::io::Write;

pub use anyhow::{anyhow, bail, Error, Result};
pub use log::{debug, error, info, trace, warn};

pub use crate::{
    config::{Config, ConfigWrapper},
    options::Options,
};
