use clap::Parser;

use blogline_api::config::{Cli, ServerConfig};
use blogline_api::server::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ServerConfig::load(&cli)?;

    blogline_observability::init(&config.log)?;
    tracing::info!(addr = %config.addr, "starting blogline");

    Server::new(config).await?.run().await
}
