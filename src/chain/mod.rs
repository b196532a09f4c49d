//! Chain store actor.
//!
//! Owns the newest-first block list and serializes every read and append
//! through a single mailbox. Other components hold a [`ChainHandle`] and
//! never touch the block list directly.
//!
//! Append checks linkage only (previous hash and height continuity);
//! full block validation is owned by the consensus layer.

use crate::core::Block;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Chain append errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("previous hash does not match the chain head")]
    PreviousHashMismatch,
    #[error("unexpected block height: expected {expected}, got {got}")]
    HeightMismatch { expected: u64, got: u64 },
    #[error("block hash does not match its header")]
    HashMismatch,
}

enum Command {
    Height(oneshot::Sender<u64>),
    Append(Block, oneshot::Sender<Result<(), ChainError>>),
    LatestBlockHash(oneshot::Sender<String>),
    GenesisBlockHash(oneshot::Sender<String>),
    BlocksSince(u64, oneshot::Sender<Vec<Block>>),
}

/// Handle to the chain store actor. Cheap to clone.
#[derive(Clone)]
pub struct ChainHandle {
    cmd_tx: mpsc::Sender<Command>,
}

struct ChainActor {
    /// Blocks, newest first. The last element is always genesis.
    blocks: Vec<Block>,
    genesis_hash: String,
    cmd_rx: mpsc::Receiver<Command>,
}

impl ChainHandle {
    /// Spawn a chain actor seeded with the genesis block.
    pub fn spawn() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let genesis = Block::genesis();
        let actor = ChainActor {
            genesis_hash: genesis.hash.clone(),
            blocks: vec![genesis],
            cmd_rx,
        };
        tokio::spawn(actor.run());
        Self { cmd_tx }
    }

    /// Chain height: the number of blocks, genesis included.
    pub async fn height(&self) -> u64 {
        self.request(Command::Height).await
    }

    /// Append a block to the head of the chain.
    pub async fn append(&self, block: Block) -> Result<(), ChainError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Append(block, tx)).await;
        rx.await.expect("chain actor stopped")
    }

    pub async fn latest_block_hash(&self) -> String {
        self.request(Command::LatestBlockHash).await
    }

    /// Hash of the genesis block, derived once at construction.
    pub async fn genesis_block_hash(&self) -> String {
        self.request(Command::GenesisBlockHash).await
    }

    /// Blocks a chain of height `height` does not have yet, oldest first.
    pub async fn blocks_since(&self, height: u64) -> Vec<Block> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::BlocksSince(height, tx)).await;
        rx.await.expect("chain actor stopped")
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> T {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await;
        rx.await.expect("chain actor stopped")
    }

    async fn send(&self, cmd: Command) {
        // The actor drains its mailbox for as long as a handle exists.
        if self.cmd_tx.send(cmd).await.is_err() {
            log::error!("Chain mailbox unavailable, dropping command");
        }
    }
}

impl ChainActor {
    async fn run(mut self) {
        while let Some(cmd) = self.cmd_rx.recv().await {
            match cmd {
                Command::Height(reply) => {
                    let _ = reply.send(self.blocks.len() as u64);
                }
                Command::Append(block, reply) => {
                    let _ = reply.send(self.append(block));
                }
                Command::LatestBlockHash(reply) => {
                    let _ = reply.send(self.head().hash.clone());
                }
                Command::GenesisBlockHash(reply) => {
                    let _ = reply.send(self.genesis_hash.clone());
                }
                Command::BlocksSince(height, reply) => {
                    let mut blocks: Vec<Block> = self
                        .blocks
                        .iter()
                        .filter(|b| b.header.height >= height)
                        .cloned()
                        .collect();
                    blocks.reverse();
                    let _ = reply.send(blocks);
                }
            }
        }
    }

    fn head(&self) -> &Block {
        self.blocks.first().expect("chain always holds genesis")
    }

    fn append(&mut self, block: Block) -> Result<(), ChainError> {
        let expected = self.blocks.len() as u64;
        if block.header.height != expected {
            return Err(ChainError::HeightMismatch {
                expected,
                got: block.header.height,
            });
        }
        if block.header.previous_hash != self.head().hash {
            return Err(ChainError::PreviousHashMismatch);
        }
        if !block.verify_hash() {
            return Err(ChainError::HashMismatch);
        }

        log::info!("Appended block {} ({})", block.header.height, block.hash);
        self.blocks.insert(0, block);
        Ok(())
    }
}
