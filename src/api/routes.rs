//! Peer-facing route configuration

use crate::api::handlers::{self, ApiState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// Create the router for the peer-facing endpoints
pub fn create_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/info", get(handlers::node_info))
        .route("/blocks", get(handlers::list_blocks))
        .route("/block", post(handlers::submit_block))
        .route("/transaction", post(handlers::submit_transaction))
        .route(
            "/peers",
            get(handlers::list_peers)
                .post(handlers::add_peer)
                .delete(handlers::remove_peer),
        )
        .route("/sync", get(handlers::sync_status))
        .with_state(state)
        .layer(cors)
}
