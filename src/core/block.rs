//! Block implementation.
//!
//! A block carries a header with linkage metadata and a list of
//! transactions. Consensus rules (proof of work, full validation) live
//! outside this subsystem; the chain store only checks linkage.

use crate::core::transaction::Transaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Timestamp baked into the genesis block. Every node derives the same
/// genesis hash from it, which is what the handshake's genesis gate
/// compares.
pub const GENESIS_TIMESTAMP: i64 = 1_700_000_000;

/// Block header containing linkage metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block version
    pub version: u32,
    /// Number of blocks preceding this one (genesis is 0)
    pub height: u64,
    /// Hash of the previous block
    pub previous_hash: String,
    /// Block creation timestamp
    pub timestamp: DateTime<Utc>,
}

impl BlockHeader {
    /// Calculate the hash of the block header
    pub fn hash(&self) -> String {
        let data = format!(
            "{}{}{}{}",
            self.version,
            self.height,
            self.previous_hash,
            self.timestamp.timestamp()
        );
        hex::encode(Sha256::digest(data.as_bytes()))
    }
}

/// A block in the chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Block header
    pub header: BlockHeader,
    /// Block hash (cached for efficiency)
    pub hash: String,
    /// List of transactions in the block
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Create a new block extending `previous_hash` at `height`.
    pub fn new(height: u64, previous_hash: String, transactions: Vec<Transaction>) -> Self {
        Self::with_timestamp(height, previous_hash, transactions, Utc::now())
    }

    pub fn with_timestamp(
        height: u64,
        previous_hash: String,
        transactions: Vec<Transaction>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let header = BlockHeader {
            version: 1,
            height,
            previous_hash,
            timestamp,
        };
        let hash = header.hash();

        Self {
            header,
            hash,
            transactions,
        }
    }

    /// Create the genesis block. Identical on every node.
    pub fn genesis() -> Self {
        let timestamp = DateTime::from_timestamp(GENESIS_TIMESTAMP, 0)
            .expect("genesis timestamp is a valid unix time");
        Self::with_timestamp(0, "0".repeat(64), Vec::new(), timestamp)
    }

    /// Verify the cached block hash against the header
    pub fn verify_hash(&self) -> bool {
        self.hash == self.header.hash()
    }

    /// Get number of transactions in this block
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_block_is_stable() {
        let a = Block::genesis();
        let b = Block::genesis();
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.header.height, 0);
        assert_eq!(a.header.previous_hash, "0".repeat(64));
    }

    #[test]
    fn test_block_hash_verification() {
        let genesis = Block::genesis();
        let mut block = Block::new(1, genesis.hash.clone(), vec![]);
        assert!(block.verify_hash());

        block.header.height += 1;
        assert!(!block.verify_hash());
    }
}
