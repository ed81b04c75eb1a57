use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;

use abacus_server::ServerConfig;

/// Shared-session calculator server.
#[derive(Parser, Debug)]
#[command(name = "abacus-server")]
struct Args {
    /// Port to listen on (1024 or above).
    #[arg(long, short = 'p', default_value_t = 9000)]
    port: u16,

    /// Directory for persisted session snapshots.
    #[arg(long, default_value = "./sessions")]
    data_dir: PathBuf,
}

/// Ports below 1024 need elevated privileges; refuse them before any
/// socket is opened.
fn validate_port(port: u16) -> anyhow::Result<()> {
    if port < 1024 {
        bail!("invalid port {port} (must be 1024 or above)");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    validate_port(args.port)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig {
        port: args.port,
        data_dir: args.data_dir,
        ..Default::default()
    };

    let handle = abacus_server::start(config).await?;
    tracing::info!(port = handle.port, "abacus server ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    Ok(())
}
