#![forbid(unsafe_code)]
//! ChainDrug ledger node

use chaindrug::config::{load_config, DEFAULT_CONFIG_PATH};
use chaindrug::node::Node;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Index of this node in the peer and identity tables
    #[arg(short, long)]
    index: Option<u64>,
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging();

    let mut config = load_config(&cli.config)?;
    config.apply_overrides(cli.index, cli.port)?;
    info!(
        config = %cli.config.display(),
        index = config.node.index,
        port = config.node.port,
        "Configuration loaded"
    );

    let node = Arc::new(Node::new(config)?);
    if let Err(e) = node.run().await {
        error!("Node stopped with error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
