pub mod config; // Configuration management
pub mod error; // Error handling and types
pub mod monitor; // Per-inverter polling loop
pub mod options; // Command line options parsing
pub mod prelude; // Common imports and types
pub mod sma; // SMA Bluetooth protocol implementation

// Get the package version from Cargo.toml
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;

use std::sync::Arc;

use crate::monitor::Monitor;

pub fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .init();
}

/// Main application entry point: starts one monitor per enabled inverter
/// and runs until the shutdown signal arrives.
pub async fn app(
    mut shutdown_rx: tokio::sync::broadcast::Receiver<()>,
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
    config: Arc<ConfigWrapper>,
) -> Result<()> {
    info!("sma-bridge {} starting", CARGO_PKG_VERSION);

    let mut handles = Vec::new();
    for inverter in config.enabled_inverters() {
        let monitor = Monitor::new(inverter.clone(), shutdown_tx.subscribe());
        handles.push(tokio::spawn(async move {
            if let Err(e) = monitor.start().await {
                error!("monitor task failed: {:#}", e);
            }
        }));
    }
    if handles.is_empty() {
        bail!("no enabled inverters configured");
    }

    let _ = shutdown_rx.recv().await;
    info!("shutdown signal received, stopping monitors");

    for handle in handles {
        if let Err(e) = handle.await {
            error!("error waiting for monitor task: {}", e);
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Application entry point: wires up logging and Ctrl+C handling around
/// the main loop.
pub async fn run(config: Config) -> Result<()> {
    init_logging(&config.loglevel());

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let config = Arc::new(ConfigWrapper::from_config(config));

    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl+c: {}", e);
        }
        let _ = shutdown_tx_clone.send(());
    });

    app(shutdown_rx, shutdown_tx, config).await
}
