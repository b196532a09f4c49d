//! Picochain node binary.
//!
//! Starts the chain store and the peer registry, serves the peer-facing
//! endpoints, dials any bootstrap peers and runs the periodic health
//! sweep until interrupted.

use clap::Parser;
use picochain::api::{create_router, ApiState};
use picochain::chain::ChainHandle;
use picochain::config::{NodeConfig, PeersConfig};
use picochain::network::client::HttpPeerClient;
use picochain::network::registry::PeerHandle;
use picochain::network::{health, identity};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "picochain")]
#[command(version = "0.1.0")]
#[command(about = "A small blockchain node with HTTP peer discovery", long_about = None)]
struct Cli {
    /// Address to serve the peer-facing endpoints on
    #[arg(short, long, default_value = "127.0.0.1:4600")]
    listen_addr: SocketAddr,

    /// Peer URI to dial at startup (repeatable)
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// Maximum number of admitted peers
    #[arg(long, default_value_t = 8)]
    max_peers: usize,

    /// Chance of admitting a new peer once the registry is full
    #[arg(long, default_value_t = 0.5)]
    admission_probability: f64,

    /// Seconds between peer health sweeps
    #[arg(long, default_value_t = 30)]
    health_interval: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();
    let cli = Cli::parse();

    let config = NodeConfig {
        listen_addr: cli.listen_addr,
        bootstrap_peers: cli.peers,
        peers: PeersConfig {
            max_peers: cli.max_peers,
            admission_probability: cli.admission_probability,
        },
        health_check_interval: Duration::from_secs(cli.health_interval),
    };

    let node_nonce = identity::node_nonce();
    log::info!("Starting picochain node (nonce {})", node_nonce);

    let chain = ChainHandle::spawn();
    let peers = PeerHandle::spawn(
        config.peers.clone(),
        node_nonce,
        Arc::new(HttpPeerClient::new()),
        chain.clone(),
    );
    health::spawn(peers.clone(), config.health_check_interval);

    for uri in &config.bootstrap_peers {
        match peers.add_peer(uri.clone()).await {
            Ok(()) => log::info!("Bootstrap peer {} accepted", uri),
            Err(e) => log::warn!("Bootstrap peer {} rejected: {}", uri, e),
        }
    }

    let state = ApiState {
        chain,
        peers,
        node_nonce,
    };
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    log::info!("Listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("Shutting down");
        })
        .await?;

    Ok(())
}
