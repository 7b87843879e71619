use std::error::Error;

use sma_bridge::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let options = Options::new();

    let config = Config::new(options.config_file)?;

    if options.once {
        return run_once(config).await;
    }

    sma_bridge::run(config).await?;

    Ok(())
}

/// Polls every enabled inverter a single time and exits; useful for
/// cron-style setups and for checking a new config.
async fn run_once(config: Config) -> Result<(), Box<dyn Error + Send + Sync>> {
    use sma_bridge::monitor::Monitor;

    sma_bridge::init_logging(&config.loglevel());

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let mut failed = false;

    for inverter in config.inverters.iter().filter(|i| i.enabled()) {
        let monitor = Monitor::new(inverter.clone(), shutdown_tx.subscribe());
        match monitor.cycle().await {
            Ok(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
            Err(e) => {
                eprintln!("{}: {:#}", inverter.address, e);
                failed = true;
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
