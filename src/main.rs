use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use egg_rat_slap::shared::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ServerConfig::from_env()?;
    let addr = config.socket_addr()?;

    tracing::info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await?;

    egg_rat_slap::serve(listener, shutdown_signal()).await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    tracing::info!("received shutdown signal");
}
