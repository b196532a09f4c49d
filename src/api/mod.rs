//! Peer-facing HTTP endpoints
//!
//! The minimal surface one node exposes to other nodes. Management and
//! wallet-style APIs are a separate service's concern.

pub mod handlers;
pub mod routes;

pub use handlers::ApiState;
pub use routes::create_router;
