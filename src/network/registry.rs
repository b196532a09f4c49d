//! Peer registry actor.
//!
//! Owns the bounded set of admitted peers and serializes every mutation
//! through a single mailbox. Admission runs a handshake against the
//! candidate (via [`PeerClient`]), applies the bounded-size policy, and
//! kicks off chain sync for freshly admitted peers.
//!
//! Handshake fetches, the health sweep and the sync-status query all run
//! on the registry's own turn, so the mailbox is held while those remote
//! calls are outstanding. Block and transaction broadcasts are the
//! exception: they are spawned detached and never hold the mailbox.

use crate::chain::ChainHandle;
use crate::config::PeersConfig;
use crate::core::{Block, Transaction};
use crate::network::client::{ClientError, PeerClient, SERVER_IDENTITY};
use crate::network::sync;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Peer admission and removal errors.
///
/// A handshake that reaches our own nonce (self-connection) and an
/// admission the policy declines are deliberate no-ops, not errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeerError {
    #[error("already known")]
    AlreadyKnown,
    #[error("request error: {0}")]
    Transport(String),
    #[error("genesis header hash not valid")]
    GenesisMismatch,
    #[error("peer is not a picochain server")]
    RoleMismatch,
    #[error("peer not found")]
    NotFound,
}

impl From<ClientError> for PeerError {
    fn from(err: ClientError) -> Self {
        let ClientError::Request(msg) = err;
        PeerError::Transport(msg)
    }
}

/// An admitted peer, keyed in the registry by the peer's own nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    /// Base URI the peer is reachable at
    pub uri: String,
    /// Hash of the peer's newest block, as last observed
    pub latest_block_hash: String,
}

enum Command {
    AddPeer(String, oneshot::Sender<Result<(), PeerError>>),
    RemovePeer(String, oneshot::Sender<Result<(), PeerError>>),
    ScheduleAddPeer { uri: String, nonce: u64 },
    PeerUris(oneshot::Sender<Vec<String>>),
    Peers(oneshot::Sender<HashMap<u64, PeerRecord>>),
    IsChainSynced(oneshot::Sender<bool>),
    CheckPeers(oneshot::Sender<usize>),
    BroadcastBlock(Block),
    BroadcastTx(Transaction),
}

/// Handle to the peer registry actor. Cheap to clone.
#[derive(Clone)]
pub struct PeerHandle {
    cmd_tx: mpsc::Sender<Command>,
}

struct RegistryActor {
    config: PeersConfig,
    own_nonce: u64,
    client: Arc<dyn PeerClient>,
    chain: ChainHandle,
    peers: HashMap<u64, PeerRecord>,
    cmd_rx: mpsc::Receiver<Command>,
}

impl PeerHandle {
    /// Spawn a registry actor.
    ///
    /// `own_nonce` is this node's identity nonce; a handshake reporting it
    /// back means the candidate URI points at ourselves.
    pub fn spawn(
        config: PeersConfig,
        own_nonce: u64,
        client: Arc<dyn PeerClient>,
        chain: ChainHandle,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let actor = RegistryActor {
            config,
            own_nonce,
            client,
            chain,
            peers: HashMap::new(),
            cmd_rx,
        };
        tokio::spawn(actor.run());
        Self { cmd_tx }
    }

    /// Validate `uri` with a handshake and admit it under the bounded-size
    /// policy. Replies before any triggered chain sync completes.
    pub async fn add_peer(&self, uri: String) -> Result<(), PeerError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::AddPeer(uri, tx)).await;
        rx.await.expect("peer registry actor stopped")
    }

    /// Remove the admitted peer with the given URI.
    pub async fn remove_peer(&self, uri: String) -> Result<(), PeerError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::RemovePeer(uri, tx)).await;
        rx.await.expect("peer registry actor stopped")
    }

    /// Fire-and-forget admission. Skipped outright when `nonce` is already
    /// registered; otherwise behaves like [`add_peer`](Self::add_peer)
    /// with nobody waiting on the outcome.
    pub async fn schedule_add_peer(&self, uri: String, nonce: u64) {
        self.send(Command::ScheduleAddPeer { uri, nonce }).await;
    }

    /// URIs of all admitted peers.
    pub async fn peer_uris(&self) -> Vec<String> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::PeerUris(tx)).await;
        rx.await.expect("peer registry actor stopped")
    }

    /// Snapshot of the admitted peer set.
    pub async fn peers(&self) -> HashMap<u64, PeerRecord> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Peers(tx)).await;
        rx.await.expect("peer registry actor stopped")
    }

    /// True when no admitted peer reports a chain taller than ours.
    /// Peers that fail to answer count as height 0.
    pub async fn is_chain_synced(&self) -> bool {
        let (tx, rx) = oneshot::channel();
        self.send(Command::IsChainSynced(tx)).await;
        rx.await.expect("peer registry actor stopped")
    }

    /// Re-validate every admitted peer, dropping the ones that fail the
    /// handshake or no longer share our genesis. Returns the number of
    /// peers dropped.
    pub async fn check_peers(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        self.send(Command::CheckPeers(tx)).await;
        rx.await.expect("peer registry actor stopped")
    }

    /// Push a block to every admitted peer without blocking the registry.
    pub async fn broadcast_block(&self, block: Block) {
        self.send(Command::BroadcastBlock(block)).await;
    }

    /// Push a transaction to every admitted peer without blocking the
    /// registry.
    pub async fn broadcast_tx(&self, tx: Transaction) {
        self.send(Command::BroadcastTx(tx)).await;
    }

    async fn send(&self, cmd: Command) {
        if self.cmd_tx.send(cmd).await.is_err() {
            log::error!("Peer registry mailbox unavailable, dropping command");
        }
    }
}

impl RegistryActor {
    async fn run(mut self) {
        while let Some(cmd) = self.cmd_rx.recv().await {
            match cmd {
                Command::AddPeer(uri, reply) => {
                    let _ = reply.send(self.add_peer(&uri).await);
                }
                Command::RemovePeer(uri, reply) => {
                    let _ = reply.send(self.remove_peer(&uri));
                }
                Command::ScheduleAddPeer { uri, nonce } => {
                    if self.peers.contains_key(&nonce) {
                        continue;
                    }
                    if let Err(e) = self.add_peer(&uri).await {
                        log::debug!("Scheduled peer {} not admitted: {}", uri, e);
                    }
                }
                Command::PeerUris(reply) => {
                    let uris = self.peers.values().map(|p| p.uri.clone()).collect();
                    let _ = reply.send(uris);
                }
                Command::Peers(reply) => {
                    let _ = reply.send(self.peers.clone());
                }
                Command::IsChainSynced(reply) => {
                    let _ = reply.send(self.is_chain_synced().await);
                }
                Command::CheckPeers(reply) => {
                    let _ = reply.send(self.check_peers().await);
                }
                Command::BroadcastBlock(block) => {
                    let client = self.client.clone();
                    let uris = self.peer_uri_list();
                    tokio::spawn(async move {
                        client.send_block(&block, &uris).await;
                    });
                }
                Command::BroadcastTx(tx) => {
                    let client = self.client.clone();
                    let uris = self.peer_uri_list();
                    tokio::spawn(async move {
                        client.send_tx(&tx, &uris).await;
                    });
                }
            }
        }
    }

    fn peer_uri_list(&self) -> Vec<String> {
        self.peers.values().map(|p| p.uri.clone()).collect()
    }

    async fn add_peer(&mut self, uri: &str) -> Result<(), PeerError> {
        if self.peers.values().any(|p| p.uri == uri) {
            return Err(PeerError::AlreadyKnown);
        }

        let info = self.client.get_info(uri).await?;

        if info.nonce == self.own_nonce {
            log::debug!("Candidate {} is ourselves, ignoring", uri);
            return Ok(());
        }
        if info.genesis_hash != self.chain.genesis_block_hash().await {
            return Err(PeerError::GenesisMismatch);
        }
        if info.server_identity != SERVER_IDENTITY {
            return Err(PeerError::RoleMismatch);
        }
        if self.peers.contains_key(&info.nonce) {
            return Err(PeerError::AlreadyKnown);
        }

        if self.peers.len() >= self.config.max_peers {
            if self.config.max_peers == 0
                || rand::thread_rng().gen::<f64>() >= self.config.admission_probability
            {
                log::debug!("Registry full, candidate {} declined", uri);
                return Ok(());
            }
            self.evict_random();
        }

        self.peers.insert(
            info.nonce,
            PeerRecord {
                uri: uri.to_string(),
                latest_block_hash: info.latest_block_hash,
            },
        );
        log::info!(
            "Added peer {} (nonce {}), {} peer(s) total",
            uri,
            info.nonce,
            self.peers.len()
        );

        // Catch up with the new peer's chain without holding up the reply.
        sync::spawn_sync(self.client.clone(), self.chain.clone(), uri.to_string());
        Ok(())
    }

    /// Evict one admitted peer chosen uniformly at random.
    fn evict_random(&mut self) {
        let keys: Vec<u64> = self.peers.keys().copied().collect();
        if keys.is_empty() {
            return;
        }
        let nonce = keys[rand::thread_rng().gen_range(0..keys.len())];
        if let Some(record) = self.peers.remove(&nonce) {
            log::info!("Evicted peer {} (nonce {}) to make room", record.uri, nonce);
        }
    }

    fn remove_peer(&mut self, uri: &str) -> Result<(), PeerError> {
        let nonce = self
            .peers
            .iter()
            .find(|(_, p)| p.uri == uri)
            .map(|(nonce, _)| *nonce)
            .ok_or(PeerError::NotFound)?;
        self.peers.remove(&nonce);
        log::info!("Removed peer {}", uri);
        Ok(())
    }

    async fn is_chain_synced(&self) -> bool {
        let local = self.chain.height().await;
        let mut best = 0u64;
        for record in self.peers.values() {
            let height = match self.client.get_info(&record.uri).await {
                Ok(info) => info.height,
                Err(_) => 0,
            };
            best = best.max(height);
        }
        best <= local
    }

    async fn check_peers(&mut self) -> usize {
        let genesis_hash = self.chain.genesis_block_hash().await;
        let before = self.peers.len();

        let mut survivors = HashMap::with_capacity(before);
        for (nonce, record) in &self.peers {
            match self.client.get_info(&record.uri).await {
                Ok(info) if info.genesis_hash == genesis_hash => {
                    let mut record = record.clone();
                    if info.latest_block_hash != record.latest_block_hash {
                        record.latest_block_hash = info.latest_block_hash;
                    }
                    survivors.insert(*nonce, record);
                }
                Ok(_) => {
                    log::warn!("Dropping peer {}: genesis hash no longer matches", record.uri);
                }
                Err(e) => {
                    log::warn!("Dropping peer {}: {}", record.uri, e);
                }
            }
        }

        // Swap in the re-validated set in one step; callers never observe
        // a half-checked registry.
        self.peers = survivors;
        let dropped = before - self.peers.len();
        log::info!(
            "Health check done: {} peer(s) dropped, {} remaining",
            dropped,
            self.peers.len()
        );
        dropped
    }
}
