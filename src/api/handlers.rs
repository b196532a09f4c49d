//! Handlers for the peer-facing HTTP endpoints.
//!
//! These are the endpoints one node calls on another: the handshake info
//! exchange, block fetching for sync, block/transaction pushes and peer
//! announcements. The operator-facing management API lives in a separate
//! service and is not part of this crate.

use crate::chain::ChainHandle;
use crate::core::{Block, Transaction};
use crate::network::client::{NodeInfo, SERVER_IDENTITY};
use crate::network::registry::{PeerError, PeerHandle};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

/// Shared state for the peer-facing endpoints
#[derive(Clone)]
pub struct ApiState {
    pub chain: ChainHandle,
    pub peers: PeerHandle,
    pub node_nonce: u64,
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct BlocksQuery {
    /// Height the caller already has; defaults to 0 (everything)
    pub from: Option<u64>,
}

#[derive(Deserialize)]
pub struct PeerRequest {
    pub uri: String,
    /// Announcing nonce, if the caller already knows its own identity.
    /// When present the admission runs fire-and-forget.
    pub nonce: Option<u64>,
}

#[derive(Serialize)]
pub struct BlockAccepted {
    pub hash: String,
    pub height: u64,
}

#[derive(Serialize)]
pub struct TxAccepted {
    pub id: String,
}

#[derive(Serialize)]
pub struct SyncStatus {
    pub height: u64,
    pub synced: bool,
}

#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: error.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /info - handshake payload
pub async fn node_info(State(state): State<ApiState>) -> Json<NodeInfo> {
    Json(NodeInfo {
        nonce: state.node_nonce,
        genesis_hash: state.chain.genesis_block_hash().await,
        latest_block_hash: state.chain.latest_block_hash().await,
        height: state.chain.height().await,
        server_identity: SERVER_IDENTITY.to_string(),
    })
}

/// GET /blocks?from=h - blocks above height h, oldest first
pub async fn list_blocks(
    State(state): State<ApiState>,
    Query(query): Query<BlocksQuery>,
) -> Json<Vec<Block>> {
    Json(state.chain.blocks_since(query.from.unwrap_or(0)).await)
}

/// POST /block - append a pushed block
pub async fn submit_block(
    State(state): State<ApiState>,
    Json(block): Json<Block>,
) -> Result<Json<BlockAccepted>, (StatusCode, Json<ApiError>)> {
    let accepted = BlockAccepted {
        hash: block.hash.clone(),
        height: block.header.height,
    };
    state
        .chain
        .append(block)
        .await
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e))?;
    Ok(Json(accepted))
}

/// POST /transaction - accept a broadcast transaction
pub async fn submit_transaction(Json(tx): Json<Transaction>) -> Json<TxAccepted> {
    // Pool handling lives upstream; acknowledging the push is enough for
    // channel counterparties to fan their transactions out.
    log::debug!("Received transaction {} from a peer", tx.id);
    Json(TxAccepted { id: tx.id })
}

/// GET /peers - URIs of admitted peers
pub async fn list_peers(State(state): State<ApiState>) -> Json<Vec<String>> {
    Json(state.peers.peer_uris().await)
}

/// POST /peers - announce or add a peer
pub async fn add_peer(
    State(state): State<ApiState>,
    Json(request): Json<PeerRequest>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    match request.nonce {
        Some(nonce) => {
            state.peers.schedule_add_peer(request.uri, nonce).await;
            Ok(StatusCode::ACCEPTED)
        }
        None => match state.peers.add_peer(request.uri).await {
            Ok(()) => Ok(StatusCode::OK),
            Err(e @ PeerError::AlreadyKnown) => Err(error_response(StatusCode::CONFLICT, e)),
            Err(e @ PeerError::Transport(_)) => Err(error_response(StatusCode::BAD_GATEWAY, e)),
            Err(e) => Err(error_response(StatusCode::BAD_REQUEST, e)),
        },
    }
}

/// DELETE /peers - drop an admitted peer
pub async fn remove_peer(
    State(state): State<ApiState>,
    Json(request): Json<PeerRequest>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    match state.peers.remove_peer(request.uri).await {
        Ok(()) => Ok(StatusCode::OK),
        Err(e) => Err(error_response(StatusCode::NOT_FOUND, e)),
    }
}

/// GET /sync - local height and whether any peer is ahead of us
pub async fn sync_status(State(state): State<ApiState>) -> Json<SyncStatus> {
    Json(SyncStatus {
        height: state.chain.height().await,
        synced: state.peers.is_chain_synced().await,
    })
}
