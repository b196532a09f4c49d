//! Core blockchain data types

pub mod block;
pub mod transaction;

pub use block::{Block, BlockHeader, GENESIS_TIMESTAMP};
pub use transaction::Transaction;
