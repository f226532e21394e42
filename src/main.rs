mod cli;

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use peershare::config::{PeerConfig, TrackerConfig, DEFAULT_PEER_PORT, DEFAULT_TRACKER_PORT};
use peershare::net::MessageServer;
use peershare::peer::PeerSession;
use peershare::tracker::Tracker;

#[derive(Debug, Parser)]
#[command(version, about = "Share files between peers through a central tracker")]
struct Args {
    #[command(subcommand)]
    command: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Run the tracker
    Tracker {
        /// Port to accept peer requests on
        #[arg(long, default_value_t = DEFAULT_TRACKER_PORT)]
        port: u16,
    },
    /// Run a peer with an interactive prompt
    Peer {
        /// Tracker address, e.g. 192.168.1.10:9000
        #[arg(long)]
        tracker: SocketAddr,
        /// Directory to share from and download into
        #[arg(long)]
        storage: PathBuf,
        /// Port this peer listens on
        #[arg(long, default_value_t = DEFAULT_PEER_PORT)]
        listen_port: u16,
        /// Port other peers listen on
        #[arg(long, default_value_t = DEFAULT_PEER_PORT)]
        peer_port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Args::parse().command {
        Mode::Tracker { port } => run_tracker(TrackerConfig::default().with_listen_port(port)).await,
        Mode::Peer {
            tracker,
            storage,
            listen_port,
            peer_port,
        } => {
            let config = PeerConfig::default()
                .with_tracker_addr(tracker)
                .with_storage_root(storage)
                .with_listen_port(listen_port)
                .with_peer_port(peer_port);
            run_peer(config).await
        }
    }
}

async fn run_tracker(config: TrackerConfig) -> Result<()> {
    let server = MessageServer::bind((Ipv4Addr::UNSPECIFIED, config.listen_port))
        .await
        .with_context(|| format!("Failed to bind tracker port {}", config.listen_port))?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nShutting down...");
            let _ = shutdown_tx.send(());
        }
    });

    server.run(Tracker::new(), shutdown_rx).await
}

async fn run_peer(config: PeerConfig) -> Result<()> {
    let session = PeerSession::new(config.clone()).await?;
    let server = MessageServer::bind((Ipv4Addr::UNSPECIFIED, config.listen_port))
        .await
        .with_context(|| format!("Failed to bind peer port {}", config.listen_port))?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let listener = tokio::spawn(server.run(session.service(), shutdown_rx));

    info!(
        "Peer ready, sharing {} via tracker {}",
        config.storage_root.display(),
        config.tracker_addr
    );

    let outcome = tokio::select! {
        result = cli::run_prompt(&session) => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nShutting down...");
            Ok(())
        }
    };

    let _ = shutdown_tx.send(());
    if let Err(e) = listener.await {
        warn!("Listener task failed: {}", e);
    }

    outcome
}
