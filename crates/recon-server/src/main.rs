//! recon-server - reconnaissance relay endpoints
//!
//! Parses flags, loads configuration, and serves the router until Ctrl-C.

use anyhow::Result;
use clap::Parser;
use recon_core::Recon;
use recon_server::cli::Cli;
use recon_server::logging::initialize_logging;
use recon_server::{AppState, router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    let config = cli.load_config()?;
    let bind = config.server.bind.clone();
    let recon = Recon::new(config)?;
    let app = router(Arc::new(AppState::new(recon)));

    let listener = TcpListener::bind(&bind).await?;
    info!(addr = %listener.local_addr()?, "recon-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("recon-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
}
