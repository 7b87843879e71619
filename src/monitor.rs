use crate::prelude::*;

use std::time::Duration;

use tokio::sync::broadcast;

use crate::config;
use crate::sma::link::LinkSession;
use crate::sma::query::QuerySession;
use crate::sma::snapshot::TelemetrySnapshot;
use crate::sma::transport::StreamTransport;

/// Delay before reconnecting after a failed polling cycle.
const RETRY_DELAY: Duration = Duration::from_secs(30);

/// Polls one inverter on its configured interval. Each cycle opens the
/// gateway connection, runs a logon / fetch / logoff exchange and logs
/// the snapshot; connections are not held between cycles because the
/// device drops idle Bluetooth links on its own schedule anyway.
pub struct Monitor {
    inverter: config::Inverter,
    shutdown: broadcast::Receiver<()>,
}

impl Monitor {
    pub fn new(inverter: config::Inverter, shutdown: broadcast::Receiver<()>) -> Self {
        Self { inverter, shutdown }
    }

    pub async fn start(mut self) -> Result<()> {
        let address = self.inverter.address()?;
        loop {
            let delay = match self.cycle().await {
                Ok(snapshot) => {
                    info!(
                        "{}: {}",
                        address,
                        serde_json::to_string(&snapshot).unwrap_or_default()
                    );
                    self.inverter.poll_interval()
                }
                Err(e) => {
                    error!("{}: polling cycle failed: {:#}", address, e);
                    RETRY_DELAY
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.recv() => {
                    info!("{}: monitor stopping", address);
                    return Ok(());
                }
            }
        }
    }

    /// Polls the inverter once over a fresh connection.
    pub async fn cycle(&self) -> Result<TelemetrySnapshot> {
        let transport = StreamTransport::connect(self.inverter.endpoint()).await?;
        let mut link = LinkSession::open(
            Box::new(transport),
            self.inverter.local_address()?,
            self.inverter.address()?,
        );
        if let Some(timeout) = self.inverter.receive_timeout() {
            link = link.with_timeout(timeout);
        }

        let mut session =
            QuerySession::new(link).with_app_identity(self.inverter.app_identity());

        session
            .logon(self.inverter.user_group(), self.inverter.password())
            .await?;

        if self.inverter.sync_time() {
            if let Err(e) = session.set_device_time().await {
                warn!("setting device time failed: {}", e);
            }
        }

        let snapshot = session.fetch().await;
        session.close().await;
        Ok(snapshot?)
    }
}
