//! Node identity nonce.
//!
//! Each process draws one random nonce at first use and keeps it for its
//! whole lifetime. Remote nodes are keyed by their nonce, and a handshake
//! that returns our own nonce means we dialled ourselves.

use rand::Rng;
use std::sync::OnceLock;

/// Upper bound (exclusive) for node nonces: 2^31 - 1.
pub const MAX_NONCE: u64 = 2_147_483_647;

static NODE_NONCE: OnceLock<u64> = OnceLock::new();

/// The process-wide node nonce, generated on first call and stable after.
pub fn node_nonce() -> u64 {
    *NODE_NONCE.get_or_init(|| rand::thread_rng().gen_range(1..MAX_NONCE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_is_stable_and_in_range() {
        let first = node_nonce();
        assert!((1..MAX_NONCE).contains(&first));
        assert_eq!(node_nonce(), first);
        assert_eq!(node_nonce(), first);
    }
}
