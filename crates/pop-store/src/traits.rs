//! Store traits: the abstract interfaces for registry and mirror persistence.
//!
//! [`ProofStore`] holds authoritative ledger state: registry records, the
//! event log and the transaction log. [`MirrorStore`] holds the off-chain
//! projection used for owner listings, which can always be rebuilt from the
//! event log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pop_core::{
    Address, ContentDigest, LoggedEvent, ProofMetadata, ProofRecord, ProofRegistered,
    TransactionReceipt, TxHash, TxStatus,
};

use crate::error::Result;

/// Result of inserting a proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// The digest was unregistered and now belongs to the event's owner.
    /// `sequence` is the event's position in the log.
    Inserted { sequence: u64 },
    /// The digest already has a record; nothing was written.
    AlreadyExists { existing: ProofRecord },
}

/// The most recent block recorded in a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainHead {
    pub block_number: u64,
    /// Unix seconds.
    pub block_timestamp: u64,
}

/// An executed transaction, as persisted in the transaction log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub receipt: TransactionReceipt,
    /// The sender nonce this transaction consumed.
    pub nonce: u64,
}

impl TransactionRecord {
    /// The same transaction, reverted with `reason` and without events.
    pub fn reverted(&self, reason: &str) -> Self {
        Self {
            receipt: TransactionReceipt {
                status: TxStatus::Reverted {
                    reason: reason.to_string(),
                },
                events: Vec::new(),
                ..self.receipt.clone()
            },
            nonce: self.nonce,
        }
    }
}

/// Persistence for registry state, the event log and the transaction log.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, `spawn_blocking` is used internally to avoid blocking the
/// runtime.
///
/// # Design Notes
///
/// - **First writer wins**: [`commit_registration`](ProofStore::commit_registration)
///   is an atomic check-and-insert. A second registration for the same digest
///   never overwrites the record; it returns `AlreadyExists` with the record
///   that won.
/// - **One commit per transaction**: the record, its event and the
///   transaction log entry are written together or not at all. A failed
///   commit leaves no trace, so the same signed transaction can be retried.
/// - **Event log**: every successful registration appends exactly one event
///   with the next sequence number. Records and events are never removed.
#[async_trait]
pub trait ProofStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Registry State
    // ─────────────────────────────────────────────────────────────────────────

    /// Execute a registration and record its transaction in one commit.
    ///
    /// `record` describes the successful outcome; its receipt supplies the
    /// block number and transaction hash of the event. When the digest is
    /// already registered, only the transaction is written, reverted with
    /// [`ALREADY_REGISTERED_REASON`], and the winning record is returned.
    ///
    /// [`ALREADY_REGISTERED_REASON`]: pop_core::ALREADY_REGISTERED_REASON
    async fn commit_registration(
        &self,
        event: &ProofRegistered,
        record: &TransactionRecord,
    ) -> Result<InsertResult>;

    /// Get the record for a digest, if registered.
    async fn get_proof(&self, digest: &ContentDigest) -> Result<Option<ProofRecord>>;

    /// Number of registered digests.
    async fn proof_count(&self) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Event Log
    // ─────────────────────────────────────────────────────────────────────────

    /// Events with `sequence > after`, ascending, at most `limit`.
    async fn events_since(&self, after: u64, limit: usize) -> Result<Vec<LoggedEvent>>;

    /// Sequence number of the newest event, 0 when the log is empty.
    async fn latest_sequence(&self) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Transaction Log
    // ─────────────────────────────────────────────────────────────────────────

    /// Append an executed transaction that touched no registry state.
    async fn record_transaction(&self, record: &TransactionRecord) -> Result<()>;

    /// Get the receipt of an executed transaction.
    async fn get_receipt(&self, tx_hash: &TxHash) -> Result<Option<TransactionReceipt>>;

    /// The next nonce `address` must use: one past its highest recorded
    /// nonce, or 0.
    async fn next_nonce(&self, address: &Address) -> Result<u64>;

    /// The newest recorded block, if any.
    async fn chain_head(&self) -> Result<Option<ChainHead>>;
}

/// A mirror row: registry facts plus descriptive metadata.
///
/// `owner`, `timestamp` and `metadata_pointer` come from the ledger. The
/// remaining fields are descriptive and may be filled in later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofSummary {
    pub fingerprint: ContentDigest,
    pub owner: Address,
    /// Ledger timestamp, Unix seconds.
    pub timestamp: u64,
    pub metadata_pointer: String,
    pub tx_hash: Option<TxHash>,
    pub block_number: Option<u64>,
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub model_version: Option<String>,
    pub content_type: Option<String>,
    pub notes: Option<String>,
    /// Client-assigned creation time from the metadata document.
    pub created_at: Option<DateTime<Utc>>,
}

impl ProofSummary {
    /// A summary carrying only what the ledger event says.
    pub fn from_event(event: &LoggedEvent) -> Self {
        Self {
            fingerprint: event.event.digest,
            owner: event.event.owner,
            timestamp: event.event.timestamp,
            metadata_pointer: event.event.metadata_pointer.clone(),
            tx_hash: Some(event.tx_hash),
            block_number: Some(event.block_number),
            prompt: None,
            model: None,
            model_version: None,
            content_type: None,
            notes: None,
            created_at: None,
        }
    }

    /// A summary for the registration carried by a successful receipt.
    pub fn from_receipt(receipt: &TransactionReceipt) -> Option<Self> {
        let event = receipt.events.first()?;
        Some(Self {
            fingerprint: event.digest,
            owner: event.owner,
            timestamp: event.timestamp,
            metadata_pointer: event.metadata_pointer.clone(),
            tx_hash: Some(receipt.tx_hash),
            block_number: Some(receipt.block_number),
            prompt: None,
            model: None,
            model_version: None,
            content_type: None,
            notes: None,
            created_at: None,
        })
    }

    /// Fill descriptive fields from a metadata document.
    pub fn with_metadata(mut self, metadata: &ProofMetadata) -> Self {
        self.prompt = Some(metadata.prompt.clone());
        self.model = Some(metadata.model.clone());
        self.model_version = metadata.model_version.clone();
        self.content_type = Some(metadata.content_type.clone());
        self.notes = metadata.notes.clone();
        self.created_at = Some(metadata.timestamp);
        self
    }

    /// Merge a newer write into this row.
    ///
    /// Ledger fields are replaced. Optional fields keep their current value
    /// when the newer write leaves them empty, so an indexer pass never erases
    /// metadata a client already recorded.
    pub fn merge(&mut self, newer: &ProofSummary) {
        self.owner = newer.owner;
        self.timestamp = newer.timestamp;
        self.metadata_pointer = newer.metadata_pointer.clone();

        fn coalesce<T: Clone>(slot: &mut Option<T>, newer: &Option<T>) {
            if newer.is_some() {
                *slot = newer.clone();
            }
        }

        coalesce(&mut self.tx_hash, &newer.tx_hash);
        coalesce(&mut self.block_number, &newer.block_number);
        coalesce(&mut self.prompt, &newer.prompt);
        coalesce(&mut self.model, &newer.model);
        coalesce(&mut self.model_version, &newer.model_version);
        coalesce(&mut self.content_type, &newer.content_type);
        coalesce(&mut self.notes, &newer.notes);
        coalesce(&mut self.created_at, &newer.created_at);
    }

    /// Whether descriptive metadata has been recorded.
    pub fn has_metadata(&self) -> bool {
        self.prompt.is_some()
    }
}

/// Persistence for the off-chain projection.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Insert a summary, or merge it into the existing row
    /// (see [`ProofSummary::merge`]).
    async fn upsert_summary(&self, summary: &ProofSummary) -> Result<()>;

    /// Get the summary for a fingerprint.
    async fn find_by_fingerprint(&self, fingerprint: &ContentDigest) -> Result<Option<ProofSummary>>;

    /// All summaries owned by `owner`, newest first.
    ///
    /// Ordered by ledger timestamp descending, then block number descending,
    /// then fingerprint ascending.
    async fn list_by_owner(&self, owner: &Address) -> Result<Vec<ProofSummary>>;

    /// Number of rows in the mirror.
    async fn summary_count(&self) -> Result<u64>;

    /// Last event sequence a named consumer has processed (0 if never).
    async fn get_cursor(&self, name: &str) -> Result<u64>;

    /// Persist a consumer's cursor.
    async fn set_cursor(&self, name: &str, sequence: u64) -> Result<()>;
}

/// Sort key implementing the [`MirrorStore::list_by_owner`] order.
pub(crate) fn newest_first(a: &ProofSummary, b: &ProofSummary) -> std::cmp::Ordering {
    b.timestamp
        .cmp(&a.timestamp)
        .then_with(|| b.block_number.unwrap_or(0).cmp(&a.block_number.unwrap_or(0)))
        .then_with(|| a.fingerprint.cmp(&b.fingerprint))
}
