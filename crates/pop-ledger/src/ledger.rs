//! The ledger interface clients and indexers talk to.

use async_trait::async_trait;
use tokio::sync::broadcast;

use pop_core::{
    Address, ChainId, ContentDigest, LoggedEvent, ProofRecord, SignedTransaction,
    TransactionReceipt, TxHash,
};

use crate::error::Result;

/// A globally ordered ledger hosting the proof registry.
///
/// `submit` returns once the transaction is included. A registry revert is
/// reported through the receipt status, not as an error; errors mean the
/// transaction was not included at all.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// The network this ledger belongs to.
    async fn chain_id(&self) -> Result<ChainId>;

    /// The nonce the next transaction from `address` must carry.
    async fn next_nonce(&self, address: &Address) -> Result<u64>;

    /// Include a signed transaction and return its receipt.
    async fn submit(&self, tx: SignedTransaction) -> Result<TransactionReceipt>;

    /// Read a registry record. Unregistered digests return the zero sentinel.
    async fn get_proof(&self, digest: &ContentDigest) -> Result<ProofRecord>;

    /// Look up the receipt of an included transaction.
    async fn get_receipt(&self, tx_hash: &TxHash) -> Result<Option<TransactionReceipt>>;

    /// Registry events with `sequence > after`, ascending, at most `limit`.
    async fn events_since(&self, after: u64, limit: usize) -> Result<Vec<LoggedEvent>>;

    /// Live feed of registry events as they are committed.
    fn subscribe(&self) -> broadcast::Receiver<LoggedEvent>;
}
