use anyhow::Result;
use std::path::PathBuf;
use tracing::info;
use vantage::config::{DeviceBackend, SessionConfig};
use vantage::logging;
use vantage_server::VantageServer;

use crate::args::ServerArgs;

pub async fn start_server(args: &ServerArgs) -> Result<()> {
    // Create the runtime log file path
    let log_path = shellexpand::env(&args.log_dir)
        .map_err(|e| anyhow::anyhow!("Failed to expand log directory: {}", e))?;
    let log_path = PathBuf::from(log_path.as_ref()).join("vantage_server.log");

    let log_level = args.log_level.parse().unwrap_or_else(|_| {
        eprintln!(
            "Invalid log level: {}. Defaulting to 'info'.",
            args.log_level
        );
        tracing::Level::INFO
    });

    logging::setup_global_logging(log_path, &log_level, args.log_stdout)
        .expect("Failed to setup logging");

    let session_config = session_config(args)?;

    info!("Starting vantage server on {}", args.address);
    info!("Logging to directory: {}", args.log_dir);

    let server = VantageServer::new(args.address, session_config).await?;
    server.run().await?;

    Ok(())
}

/// Manifest first, explicit flags on top.
fn session_config(args: &ServerArgs) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::from_file(path)?,
        None => SessionConfig::default(),
    };

    if let Some(device) = &args.device {
        config.device = match device.as_str() {
            "software" => DeviceBackend::Software,
            "remote" => {
                let address = args.device_address.clone().ok_or_else(|| {
                    anyhow::anyhow!("--device remote requires --device-address")
                })?;
                DeviceBackend::Remote { address }
            }
            other => anyhow::bail!("Unknown device backend: {}", other),
        };
    }
    if let Some(data_root) = &args.data_root {
        config.data_root = Some(data_root.clone());
    }

    Ok(config)
}
