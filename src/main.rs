//! ScreenEcho signaling server binary.

use std::net::IpAddr;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use screenecho_server::server::config::{DEFAULT_HOST, DEFAULT_PORT};
use screenecho_server::rooms::DEFAULT_ROOM_ID_ATTEMPTS;
use screenecho_server::{Result, Server, ServerConfig};

/// Rendezvous and signaling server for multi-party screen sharing.
#[derive(Debug, Parser)]
#[command(name = "screenecho-server", version, about)]
struct Args {
    /// Address to bind.
    #[arg(long, default_value_t = DEFAULT_HOST)]
    host: IpAddr,

    /// Port to listen on.
    #[arg(long, short, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Attempts to mint an unused room ID before answering 503.
    #[arg(long, default_value_t = DEFAULT_ROOM_ID_ATTEMPTS)]
    room_id_attempts: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = ServerConfig::new()
        .with_host(args.host)
        .with_port(args.port)
        .with_room_id_attempts(args.room_id_attempts);

    let server = Server::bind(config).await?;

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, shutting down");
    server.shutdown().await;

    Ok(())
}
