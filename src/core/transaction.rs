//! Transaction type shared by blocks and payment channels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A value transfer between two addresses.
///
/// Signing and script evaluation happen outside this subsystem; a
/// transaction here is the already-validated value object that blocks
/// carry and channels negotiate over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction id (hex-encoded SHA-256 of the payload fields)
    pub id: String,
    /// Sender address
    pub from: String,
    /// Recipient address
    pub to: String,
    /// Amount transferred
    pub amount: u64,
    /// Fee offered to the block producer
    pub fee: u64,
    /// Sender-local sequence number
    pub nonce: u64,
    /// Creation timestamp
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    pub fn new(from: &str, to: &str, amount: u64, fee: u64, nonce: u64) -> Self {
        Self::with_timestamp(from, to, amount, fee, nonce, Utc::now())
    }

    /// Build a transaction at an explicit timestamp. Deterministic inputs
    /// yield a deterministic id.
    pub fn with_timestamp(
        from: &str,
        to: &str,
        amount: u64,
        fee: u64,
        nonce: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let id = Self::calculate_id(from, to, amount, fee, nonce, timestamp);
        Self {
            id,
            from: from.to_string(),
            to: to.to_string(),
            amount,
            fee,
            nonce,
            timestamp,
        }
    }

    fn calculate_id(
        from: &str,
        to: &str,
        amount: u64,
        fee: u64,
        nonce: u64,
        timestamp: DateTime<Utc>,
    ) -> String {
        let data = format!(
            "{}{}{}{}{}{}",
            from,
            to,
            amount,
            fee,
            nonce,
            timestamp.timestamp()
        );
        hex::encode(Sha256::digest(data.as_bytes()))
    }

    /// Recompute the id from the payload fields and compare.
    pub fn verify_id(&self) -> bool {
        self.id
            == Self::calculate_id(
                &self.from,
                &self.to,
                self.amount,
                self.fee,
                self.nonce,
                self.timestamp,
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_deterministic() {
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let a = Transaction::with_timestamp("alice", "bob", 10, 1, 0, ts);
        let b = Transaction::with_timestamp("alice", "bob", 10, 1, 0, ts);
        assert_eq!(a.id, b.id);
        assert!(a.verify_id());
    }

    #[test]
    fn test_tampered_tx_fails_verification() {
        let mut tx = Transaction::new("alice", "bob", 10, 1, 0);
        tx.amount = 999;
        assert!(!tx.verify_id());
    }
}
