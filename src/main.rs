use clap::Parser;
use metastore_rebalance::{
    cmd::{command::RebalanceCommands, handler::handle_command},
    common::RebalanceConfig,
};

#[derive(Parser)]
#[command(name = "metastore-rebalance")]
#[command(version, about = "Balance Hive table locations across two storage backends", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: RebalanceCommands,

    /// Path to configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    config: String,

    /// Logical host name of the metastore (overrides the config file)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Connect to this address and skip host resolution
    #[arg(long, global = true)]
    address: Option<String>,

    /// Metastore port
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let mut cfg = RebalanceConfig::from_file(&cli.config)
        .map_err(|e| anyhow::anyhow!("Failed to load {}: {}", cli.config, e))?;
    if let Some(host) = cli.host {
        cfg.metastore.host = host;
    }
    if let Some(address) = cli.address {
        cfg.metastore.address = Some(address);
    }
    if let Some(port) = cli.port {
        cfg.metastore.port = port;
    }
    tracing::debug!("Loaded config: {:?}", cfg);

    handle_command(cli.command, cfg).await
}
