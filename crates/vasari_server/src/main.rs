use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use vasari_server::{MediaFileResolver, VasariConfig, bind, build_storage, init_tracing, serve};

#[derive(Parser, Debug)]
#[command(author, version, about = "Vasari Media File Server", long_about = None)]
struct Args {
    /// Configuration file layered over the defaults
    #[arg(short, long, env = "VASARI_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = VasariConfig::load(args.config.as_deref())?;
    init_tracing(config.logging())?;

    if let Some(address) = args.bind {
        let server = config.server().clone().with_bind_address(address);
        config = config.with_server(server);
    }

    info!(
        bind_address = %config.server().bind_address(),
        request_target = %config.resolver().request_target(),
        "Starting Vasari media server"
    );

    let storage = build_storage(&config).context("Failed to initialise storage")?;
    let resolver = MediaFileResolver::builder()
        .storage(storage)
        .options(config.resolver().clone())
        .build()?;

    let listener = bind(config.server().bind_address()).await?;
    serve(listener, Arc::new(resolver), shutdown_signal()).await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
