//! Chain synchronization against a single peer.
//!
//! Fired when a peer is admitted: fetch whatever blocks the peer has
//! above our height and fold them into the chain in the order received,
//! skipping any the chain store rejects.

use crate::chain::ChainHandle;
use crate::network::client::PeerClient;
use std::sync::Arc;

/// Run [`sync_from_peer`] on a detached task. The caller (the registry's
/// admission path) does not wait for it.
pub fn spawn_sync(client: Arc<dyn PeerClient>, chain: ChainHandle, uri: String) {
    tokio::spawn(async move {
        sync_from_peer(client.as_ref(), &chain, &uri).await;
    });
}

/// Fetch blocks above the local height from `uri` and append them.
/// Returns the number of blocks actually added.
pub async fn sync_from_peer(client: &dyn PeerClient, chain: &ChainHandle, uri: &str) -> usize {
    let local_height = chain.height().await;
    let blocks = match client.fetch_blocks_since(uri, local_height).await {
        Ok(blocks) => blocks,
        Err(e) => {
            log::warn!("Block fetch from {} failed: {}", uri, e);
            return 0;
        }
    };

    if blocks.is_empty() {
        log::debug!("Peer {} has nothing beyond height {}", uri, local_height);
        return 0;
    }

    let mut added = 0;
    for block in blocks {
        match chain.append(block).await {
            Ok(()) => added += 1,
            Err(e) => log::warn!("Skipping block from {}: {}", uri, e),
        }
    }

    log::info!("Synced {} block(s) from {}", added, uri);
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Block, Transaction};
    use crate::network::client::{ClientError, NodeInfo};
    use async_trait::async_trait;

    struct CannedBlocks(Vec<Block>);

    #[async_trait]
    impl PeerClient for CannedBlocks {
        async fn get_info(&self, _uri: &str) -> Result<NodeInfo, ClientError> {
            Err(ClientError::Request("not used".into()))
        }

        async fn send_block(&self, _block: &Block, _uris: &[String]) {}

        async fn send_tx(&self, _tx: &Transaction, _uris: &[String]) {}

        async fn fetch_blocks_since(
            &self,
            _uri: &str,
            height: u64,
        ) -> Result<Vec<Block>, ClientError> {
            Ok(self
                .0
                .iter()
                .filter(|b| b.header.height >= height)
                .cloned()
                .collect())
        }
    }

    #[tokio::test]
    async fn test_folds_peer_blocks_in_order() {
        let chain = ChainHandle::spawn();
        let b1 = Block::new(1, chain.genesis_block_hash().await, vec![]);
        let b2 = Block::new(2, b1.hash.clone(), vec![]);
        let client = CannedBlocks(vec![b1, b2]);

        let added = sync_from_peer(&client, &chain, "http://peer").await;

        assert_eq!(added, 2);
        assert_eq!(chain.height().await, 3);
    }

    #[tokio::test]
    async fn test_skips_blocks_the_chain_rejects() {
        let chain = ChainHandle::spawn();
        let good = Block::new(1, chain.genesis_block_hash().await, vec![]);
        let orphan = Block::new(5, "c".repeat(64), vec![]);
        let client = CannedBlocks(vec![good, orphan]);

        let added = sync_from_peer(&client, &chain, "http://peer").await;

        assert_eq!(added, 1);
        assert_eq!(chain.height().await, 2);
    }
}
