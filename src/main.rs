mod config;
mod constants;
mod core_cli;
mod core_db;
mod core_ftpcommand;
mod core_liveness;
mod core_network;
mod core_pool;
mod core_storage;
mod core_transfer;
mod helpers;
mod server;
mod session;

use crate::config::Config;
use crate::core_cli::Cli;
use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::info;
use std::io::Write;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Cli::parse();

    // Initialize the logger with a custom format
    let default_level = if args.verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            writeln!(
                buf,
                "[{}] [{}] {}",
                timestamp,
                record.level(),
                record.args()
            )
        })
        .init();

    let mut config = Config::load_from_file(&args.config)?;
    if let Some(port) = args.listen_port {
        config.server.listen_port = port;
    }
    info!("Loaded configuration from {}", args.config);

    // Run the FTP server
    server::run(config).await?;

    Ok(())
}
