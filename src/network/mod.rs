//! Peer networking
//!
//! Discovery, admission, eviction, health checking and chain sync for
//! remote nodes, plus the outbound HTTP client they are reached through.

pub mod client;
pub mod health;
pub mod identity;
pub mod registry;
pub mod sync;

pub use client::{HttpPeerClient, NodeInfo, PeerClient, SERVER_IDENTITY};
pub use registry::{PeerError, PeerHandle, PeerRecord};
