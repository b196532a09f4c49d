//! Outbound peer calls.
//!
//! Peers speak JSON over HTTP. [`PeerClient`] is the seam the registry
//! talks through; [`HttpPeerClient`] is the reqwest-backed implementation.
//! Anything that goes wrong on the wire, including a response that does
//! not parse, is classified as a transport failure.

use crate::core::{Block, Transaction};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Identity string a node reports in its handshake info.
pub const SERVER_IDENTITY: &str = "picochain";

/// Default timeout for node-to-node requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Handshake payload a node serves at `GET /info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    /// The remote node's identity nonce
    pub nonce: u64,
    /// Hash of the remote node's genesis block
    pub genesis_hash: String,
    /// Hash of the remote node's newest block
    pub latest_block_hash: String,
    /// The remote node's chain height
    pub height: u64,
    /// Server role string, expected to equal [`SERVER_IDENTITY`]
    pub server_identity: String,
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request error: {0}")]
    Request(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Request(err.to_string())
    }
}

/// Network boundary for talking to other nodes.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Fetch a peer's handshake info.
    async fn get_info(&self, uri: &str) -> Result<NodeInfo, ClientError>;

    /// Push a block to each of the given peers. Per-peer failures are
    /// logged, not returned.
    async fn send_block(&self, block: &Block, uris: &[String]);

    /// Push a transaction to each of the given peers.
    async fn send_tx(&self, tx: &Transaction, uris: &[String]);

    /// Ask a peer for the blocks above `height`, oldest first.
    async fn fetch_blocks_since(&self, uri: &str, height: u64) -> Result<Vec<Block>, ClientError>;
}

/// HTTP implementation of [`PeerClient`].
pub struct HttpPeerClient {
    http: reqwest::Client,
}

impl HttpPeerClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { http }
    }
}

impl Default for HttpPeerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn get_info(&self, uri: &str) -> Result<NodeInfo, ClientError> {
        let url = format!("{}/info", uri.trim_end_matches('/'));
        let info = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<NodeInfo>()
            .await?;
        Ok(info)
    }

    async fn send_block(&self, block: &Block, uris: &[String]) {
        let posts = uris.iter().map(|uri| {
            let url = format!("{}/block", uri.trim_end_matches('/'));
            let request = self.http.post(url).json(block).send();
            async move {
                if let Err(e) = request.await {
                    log::warn!("Block push failed: {}", e);
                }
            }
        });
        futures::future::join_all(posts).await;
    }

    async fn send_tx(&self, tx: &Transaction, uris: &[String]) {
        let posts = uris.iter().map(|uri| {
            let url = format!("{}/transaction", uri.trim_end_matches('/'));
            let request = self.http.post(url).json(tx).send();
            async move {
                if let Err(e) = request.await {
                    log::warn!("Transaction push failed: {}", e);
                }
            }
        });
        futures::future::join_all(posts).await;
    }

    async fn fetch_blocks_since(&self, uri: &str, height: u64) -> Result<Vec<Block>, ClientError> {
        let url = format!("{}/blocks?from={}", uri.trim_end_matches('/'), height);
        let blocks = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Block>>()
            .await?;
        Ok(blocks)
    }
}
