use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Vantage Server CLI - Serve remote interactive image visualization sessions
#[derive(Debug, Parser)]
#[command(name = "vantage-server")]
#[command(author, version, about)]
pub struct ServerArgs {
    /// Address to bind the management socket to
    #[arg(short, long, default_value = "127.0.0.1:9700")]
    pub address: SocketAddr,

    /// Session manifest (TOML) with viewer, device, and data-root settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Rendering backend: "software" or "remote"
    #[arg(long)]
    pub device: Option<String>,

    /// Address of the external rendering engine (with --device remote)
    #[arg(long)]
    pub device_address: Option<String>,

    /// Directory that client-supplied image paths are mapped under
    #[arg(long)]
    pub data_root: Option<PathBuf>,

    /// Logging level (simple version, e.g. 'info', 'debug')
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Log directory
    #[arg(long, default_value = "$VANTAGE_HOME/logs/vantage")]
    pub log_dir: String,

    /// Log to stdout
    #[arg(long)]
    pub log_stdout: bool,
}
