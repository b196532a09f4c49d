//! Payment-channel negotiation state.
//!
//! Tracks, per remote address, a bilateral off-chain channel: an invite
//! phase, an open channel with a newest-first transaction history, and a
//! single-slot pending proposal. A channel moves through
//! `NoChannel -> Invited -> Open -> (PendingProposed <-> Open) -> Closed`;
//! the maps below encode those states implicitly.
//!
//! The table runs in its own actor so channel calls are never queued
//! behind slow peer I/O in the registry.

use crate::core::Transaction;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("no such channel")]
    NoSuchChannel,
}

/// An open invitation to a counterparty, keyed by its public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelInvite {
    /// Amount each side locks when the channel opens
    pub lock_amount: u64,
    /// Fee offered for the opening transaction
    pub fee: u64,
    /// URI the counterparty is reachable at
    pub uri: String,
}

/// An open channel with a counterparty, keyed by its address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    /// URI the counterparty is reachable at
    pub uri: String,
    /// Settled channel transactions, newest first
    pub tx_history: Vec<Transaction>,
    /// The one proposal currently under negotiation, if any
    pub pending_tx: Option<Transaction>,
}

/// Pure channel bookkeeping. The actor below owns one of these.
#[derive(Debug, Default)]
pub struct ChannelTable {
    invites: HashMap<String, ChannelInvite>,
    channels: HashMap<String, Channel>,
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an invite for `pubkey`, replacing any earlier one.
    pub fn add_invite(&mut self, pubkey: &str, uri: &str, lock_amount: u64, fee: u64) {
        self.invites.insert(
            pubkey.to_string(),
            ChannelInvite {
                lock_amount,
                fee,
                uri: uri.to_string(),
            },
        );
    }

    /// Drop every invite pointing at `uri`. Succeeds whether or not one
    /// existed.
    pub fn remove_invite(&mut self, uri: &str) {
        self.invites.retain(|_, invite| invite.uri != uri);
    }

    pub fn invites(&self) -> &HashMap<String, ChannelInvite> {
        &self.invites
    }

    /// Open a channel with `address`, seeded with the opening transaction.
    /// Any prior channel at that address is replaced outright.
    pub fn open_channel(&mut self, address: &str, tx: Transaction, uri: &str) {
        self.channels.insert(
            address.to_string(),
            Channel {
                uri: uri.to_string(),
                tx_history: vec![tx],
                pending_tx: None,
            },
        );
    }

    /// Close the channel with `address`. Succeeds whether or not one was
    /// open.
    pub fn close_channel(&mut self, address: &str) {
        self.channels.remove(address);
    }

    /// Prepend a settled transaction to the channel's history.
    pub fn add_tx(&mut self, address: &str, tx: Transaction) -> Result<(), ChannelError> {
        let channel = self
            .channels
            .get_mut(address)
            .ok_or(ChannelError::NoSuchChannel)?;
        channel.tx_history.insert(0, tx);
        Ok(())
    }

    /// Stage a proposal on the channel's pending slot. An unresolved
    /// earlier proposal is replaced outright.
    pub fn propose_pending(&mut self, address: &str, tx: Transaction) -> Result<(), ChannelError> {
        let channel = self
            .channels
            .get_mut(address)
            .ok_or(ChannelError::NoSuchChannel)?;
        channel.pending_tx = Some(tx);
        Ok(())
    }

    pub fn pending(&self, address: &str) -> Option<&Transaction> {
        self.channels.get(address).and_then(|c| c.pending_tx.as_ref())
    }

    /// Resolve the pending proposal by clearing the slot. The accepted
    /// transaction is not moved into the history; a caller that wants it
    /// on record must `add_tx` it explicitly.
    pub fn accept_pending(&mut self, address: &str) -> Result<(), ChannelError> {
        let channel = self
            .channels
            .get_mut(address)
            .ok_or(ChannelError::NoSuchChannel)?;
        channel.pending_tx = None;
        Ok(())
    }

    /// Snapshot of every open channel.
    pub fn open_channels(&self) -> HashMap<String, Channel> {
        self.channels.clone()
    }
}

// =============================================================================
// Actor
// =============================================================================

enum Command {
    AddInvite {
        pubkey: String,
        uri: String,
        lock_amount: u64,
        fee: u64,
    },
    RemoveInvite(String),
    Invites(oneshot::Sender<HashMap<String, ChannelInvite>>),
    OpenChannel {
        address: String,
        tx: Transaction,
        uri: String,
    },
    CloseChannel(String),
    AddTx {
        address: String,
        tx: Transaction,
        reply: oneshot::Sender<Result<(), ChannelError>>,
    },
    ProposePending {
        address: String,
        tx: Transaction,
        reply: oneshot::Sender<Result<(), ChannelError>>,
    },
    Pending(String, oneshot::Sender<Option<Transaction>>),
    AcceptPending(String, oneshot::Sender<Result<(), ChannelError>>),
    OpenChannels(oneshot::Sender<HashMap<String, Channel>>),
}

/// Handle to the channel actor. Cheap to clone.
#[derive(Clone)]
pub struct ChannelHandle {
    cmd_tx: mpsc::Sender<Command>,
}

struct ChannelActor {
    table: ChannelTable,
    cmd_rx: mpsc::Receiver<Command>,
}

impl ChannelHandle {
    pub fn spawn() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let actor = ChannelActor {
            table: ChannelTable::new(),
            cmd_rx,
        };
        tokio::spawn(actor.run());
        Self { cmd_tx }
    }

    pub async fn add_invite(&self, pubkey: String, uri: String, lock_amount: u64, fee: u64) {
        self.send(Command::AddInvite {
            pubkey,
            uri,
            lock_amount,
            fee,
        })
        .await;
    }

    pub async fn remove_invite(&self, uri: String) {
        self.send(Command::RemoveInvite(uri)).await;
    }

    pub async fn invites(&self) -> HashMap<String, ChannelInvite> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Invites(tx)).await;
        rx.await.expect("channel actor stopped")
    }

    pub async fn open_channel(&self, address: String, tx: Transaction, uri: String) {
        self.send(Command::OpenChannel { address, tx, uri }).await;
    }

    pub async fn close_channel(&self, address: String) {
        self.send(Command::CloseChannel(address)).await;
    }

    pub async fn add_tx(&self, address: String, tx: Transaction) -> Result<(), ChannelError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::AddTx { address, tx, reply }).await;
        rx.await.expect("channel actor stopped")
    }

    pub async fn propose_pending(
        &self,
        address: String,
        tx: Transaction,
    ) -> Result<(), ChannelError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ProposePending { address, tx, reply }).await;
        rx.await.expect("channel actor stopped")
    }

    pub async fn pending(&self, address: String) -> Option<Transaction> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Pending(address, tx)).await;
        rx.await.expect("channel actor stopped")
    }

    pub async fn accept_pending(&self, address: String) -> Result<(), ChannelError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::AcceptPending(address, tx)).await;
        rx.await.expect("channel actor stopped")
    }

    pub async fn open_channels(&self) -> HashMap<String, Channel> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::OpenChannels(tx)).await;
        rx.await.expect("channel actor stopped")
    }

    async fn send(&self, cmd: Command) {
        if self.cmd_tx.send(cmd).await.is_err() {
            log::error!("Channel mailbox unavailable, dropping command");
        }
    }
}

impl ChannelActor {
    async fn run(mut self) {
        while let Some(cmd) = self.cmd_rx.recv().await {
            match cmd {
                Command::AddInvite {
                    pubkey,
                    uri,
                    lock_amount,
                    fee,
                } => self.table.add_invite(&pubkey, &uri, lock_amount, fee),
                Command::RemoveInvite(uri) => self.table.remove_invite(&uri),
                Command::Invites(reply) => {
                    let _ = reply.send(self.table.invites().clone());
                }
                Command::OpenChannel { address, tx, uri } => {
                    self.table.open_channel(&address, tx, &uri)
                }
                Command::CloseChannel(address) => self.table.close_channel(&address),
                Command::AddTx { address, tx, reply } => {
                    let _ = reply.send(self.table.add_tx(&address, tx));
                }
                Command::ProposePending { address, tx, reply } => {
                    let _ = reply.send(self.table.propose_pending(&address, tx));
                }
                Command::Pending(address, reply) => {
                    let _ = reply.send(self.table.pending(&address).cloned());
                }
                Command::AcceptPending(address, reply) => {
                    let _ = reply.send(self.table.accept_pending(&address));
                }
                Command::OpenChannels(reply) => {
                    let _ = reply.send(self.table.open_channels());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(n: u64) -> Transaction {
        Transaction::new("alice", "bob", 10 * n, 1, n)
    }

    #[test]
    fn test_invite_upsert_and_removal_by_uri() {
        let mut table = ChannelTable::new();
        table.add_invite("pk1", "http://a", 100, 1);
        table.add_invite("pk1", "http://b", 200, 2);
        table.add_invite("pk2", "http://b", 300, 3);

        assert_eq!(table.invites().len(), 2);
        assert_eq!(table.invites()["pk1"].lock_amount, 200);

        table.remove_invite("http://b");
        assert!(table.invites().is_empty());

        // Removing again is still a success.
        table.remove_invite("http://b");
    }

    #[test]
    fn test_channel_lifecycle_leaves_no_residue() {
        let mut table = ChannelTable::new();
        table.open_channel("addr", tx(0), "http://a");
        table.add_tx("addr", tx(1)).unwrap();
        table.close_channel("addr");

        assert!(table.open_channels().is_empty());
        assert_eq!(table.add_tx("addr", tx(2)), Err(ChannelError::NoSuchChannel));
    }

    #[test]
    fn test_history_is_newest_first() {
        let mut table = ChannelTable::new();
        table.open_channel("addr", tx(0), "http://a");
        table.add_tx("addr", tx(1)).unwrap();
        table.add_tx("addr", tx(2)).unwrap();

        let channels = table.open_channels();
        let nonces: Vec<u64> = channels["addr"].tx_history.iter().map(|t| t.nonce).collect();
        assert_eq!(nonces, vec![2, 1, 0]);
    }

    #[test]
    fn test_reopen_replaces_existing_channel() {
        let mut table = ChannelTable::new();
        table.open_channel("addr", tx(0), "http://a");
        table.add_tx("addr", tx(1)).unwrap();

        table.open_channel("addr", tx(7), "http://b");

        let channels = table.open_channels();
        assert_eq!(channels["addr"].uri, "http://b");
        assert_eq!(channels["addr"].tx_history.len(), 1);
        assert_eq!(channels["addr"].tx_history[0].nonce, 7);
    }

    #[test]
    fn test_pending_slot_overwrites_unresolved_proposal() {
        let mut table = ChannelTable::new();
        table.open_channel("addr", tx(0), "http://a");

        table.propose_pending("addr", tx(1)).unwrap();
        table.propose_pending("addr", tx(2)).unwrap();
        assert_eq!(table.pending("addr").unwrap().nonce, 2);
    }

    #[test]
    fn test_accept_clears_slot_without_recording() {
        let mut table = ChannelTable::new();
        table.open_channel("addr", tx(0), "http://a");
        table.propose_pending("addr", tx(1)).unwrap();

        table.accept_pending("addr").unwrap();

        assert!(table.pending("addr").is_none());
        // The accepted transaction does not land in the history.
        assert_eq!(table.open_channels()["addr"].tx_history.len(), 1);
    }

    #[test]
    fn test_operations_on_unknown_address() {
        let mut table = ChannelTable::new();
        assert_eq!(table.add_tx("ghost", tx(1)), Err(ChannelError::NoSuchChannel));
        assert_eq!(
            table.propose_pending("ghost", tx(1)),
            Err(ChannelError::NoSuchChannel)
        );
        assert_eq!(table.accept_pending("ghost"), Err(ChannelError::NoSuchChannel));
        assert!(table.pending("ghost").is_none());
        // Closing a channel that never opened is fine.
        table.close_channel("ghost");
    }

    #[tokio::test]
    async fn test_actor_round_trip() {
        let channels = ChannelHandle::spawn();
        channels
            .add_invite("pk".into(), "http://a".into(), 100, 1)
            .await;
        channels
            .open_channel("addr".into(), tx(0), "http://a".into())
            .await;
        channels.propose_pending("addr".into(), tx(1)).await.unwrap();

        assert_eq!(channels.pending("addr".into()).await.unwrap().nonce, 1);
        assert_eq!(channels.invites().await.len(), 1);

        channels.accept_pending("addr".into()).await.unwrap();
        assert!(channels.pending("addr".into()).await.is_none());

        channels.close_channel("addr".into()).await;
        assert!(channels.open_channels().await.is_empty());
    }
}
