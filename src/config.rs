//! Node configuration.
//!
//! Everything the peer subsystem is parameterized on arrives through
//! these structs at construction time; there is no ambient configuration
//! lookup.

use std::net::SocketAddr;
use std::time::Duration;

/// Peer admission policy parameters.
#[derive(Debug, Clone)]
pub struct PeersConfig {
    /// Upper bound on admitted peers
    pub max_peers: usize,
    /// Chance of admitting a validated candidate once the registry is
    /// full (one existing peer is evicted to make room). Keeps the peer
    /// set turning over instead of freezing at capacity.
    pub admission_probability: f64,
}

impl Default for PeersConfig {
    fn default() -> Self {
        Self {
            max_peers: 8,
            admission_probability: 0.5,
        }
    }
}

/// Top-level node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Address the peer-facing endpoints listen on
    pub listen_addr: SocketAddr,
    /// Peers to dial at startup
    pub bootstrap_peers: Vec<String>,
    /// Admission policy
    pub peers: PeersConfig,
    /// How often the health sweep re-validates the peer set
    pub health_check_interval: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:4600".parse().expect("static address parses"),
            bootstrap_peers: Vec::new(),
            peers: PeersConfig::default(),
            health_check_interval: Duration::from_secs(30),
        }
    }
}
