//! Registry records and the events that announce them.

use serde::{Deserialize, Serialize};

use crate::types::{Address, ContentDigest, TxHash};

/// The registry entry for one content digest.
///
/// Lookups of unregistered digests return [`ProofRecord::unregistered`]:
/// zero owner, zero timestamp, empty pointer. Callers distinguish the two
/// cases with [`ProofRecord::is_registered`], never by error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRecord {
    /// Identity that registered the digest.
    pub owner: Address,

    /// Ledger block time of the registering transaction, in Unix seconds.
    pub timestamp: u64,

    /// Content identifier of the metadata document in the metadata store.
    pub metadata_pointer: String,
}

impl ProofRecord {
    /// The sentinel returned for digests nobody has registered.
    pub fn unregistered() -> Self {
        Self {
            owner: Address::ZERO,
            timestamp: 0,
            metadata_pointer: String::new(),
        }
    }

    /// A record is registered iff it has a non-zero timestamp.
    pub fn is_registered(&self) -> bool {
        self.timestamp != 0
    }
}

impl Default for ProofRecord {
    fn default() -> Self {
        Self::unregistered()
    }
}

/// Emitted exactly once for every successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRegistered {
    pub digest: ContentDigest,
    pub owner: Address,
    pub timestamp: u64,
    pub metadata_pointer: String,
}

impl ProofRegistered {
    /// The record this event created.
    pub fn record(&self) -> ProofRecord {
        ProofRecord {
            owner: self.owner,
            timestamp: self.timestamp,
            metadata_pointer: self.metadata_pointer.clone(),
        }
    }
}

/// A [`ProofRegistered`] event with its position in the ledger's event log.
///
/// `sequence` starts at 1 and increases by one per event, so a consumer can
/// resume from the last sequence it processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedEvent {
    pub sequence: u64,
    pub block_number: u64,
    pub tx_hash: TxHash,
    pub event: ProofRegistered,
}
