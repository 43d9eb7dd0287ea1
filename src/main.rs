use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use swerve_zenoh_runtime::config::{DS_TIMEOUT, RobotConfig};

/// Swerve robot runtime: steps the drive, arm and intake at 50 Hz over zenoh
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON robot configuration; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Disable the robot when driver station packets are older than this
    #[arg(long, default_value_t = DS_TIMEOUT.as_millis() as u64)]
    ds_timeout_ms: u64,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            info!("Loading config from {}", path.display());
            match RobotConfig::load(path) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Config error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        None => RobotConfig::default(),
    };

    let ds_timeout = Duration::from_millis(args.ds_timeout_ms);
    if let Err(e) = swerve_zenoh_runtime::runtime::run(config, ds_timeout).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
