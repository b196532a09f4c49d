//! Picochain: a small blockchain node with HTTP peer discovery and
//! payment channels.
//!
//! This crate provides the node's peer subsystem and the chain store it
//! feeds:
//! - Peer admission with a nonce-based handshake (self-connection
//!   detection, genesis and server-role gates)
//! - A bounded peer registry with probabilistic turnover once full
//! - Periodic peer health checks and automatic chain sync from newly
//!   admitted peers
//! - Per-counterparty payment-channel negotiation state
//! - The peer-facing HTTP endpoints nodes use to talk to each other
//!
//! # Example
//!
//! ```rust,no_run
//! use picochain::{ChainHandle, HttpPeerClient, PeerHandle, PeersConfig};
//! use picochain::network::identity;
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let chain = ChainHandle::spawn();
//! let peers = PeerHandle::spawn(
//!     PeersConfig::default(),
//!     identity::node_nonce(),
//!     Arc::new(HttpPeerClient::new()),
//!     chain.clone(),
//! );
//!
//! if let Err(e) = peers.add_peer("http://127.0.0.1:4601".into()).await {
//!     eprintln!("peer rejected: {}", e);
//! }
//! println!("synced: {}", peers.is_chain_synced().await);
//! # }
//! ```

pub mod api;
pub mod chain;
pub mod channels;
pub mod config;
pub mod core;
pub mod network;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use chain::{ChainError, ChainHandle};
pub use channels::{Channel, ChannelError, ChannelHandle, ChannelInvite};
pub use config::{NodeConfig, PeersConfig};
pub use core::{Block, Transaction};
pub use network::{
    HttpPeerClient, NodeInfo, PeerClient, PeerError, PeerHandle, PeerRecord, SERVER_IDENTITY,
};
