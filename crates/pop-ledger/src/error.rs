//! Error types for the ledger.

use pop_core::{ChainId, ContentDigest, CoreError, ProofRecord};
use pop_store::StoreError;
use thiserror::Error;

/// Errors from the registry state machine.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The digest already has an owner. This is the registry's only
    /// rejection; the existing record is unchanged.
    #[error("Already registered: {digest}")]
    AlreadyRegistered {
        digest: ContentDigest,
        existing: ProofRecord,
    },

    /// The call context is not executable (e.g. a zero block timestamp).
    #[error("invalid call context: {0}")]
    InvalidContext(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from submitting to or reading from a ledger.
///
/// A registry revert is not an error here: it is reported in the
/// transaction receipt's status.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The transaction signature does not verify against its signer.
    #[error("invalid transaction signature")]
    InvalidSignature,

    /// The transaction targets another chain.
    #[error("wrong chain: ledger is {expected}, transaction is for {got}")]
    WrongChain { expected: ChainId, got: ChainId },

    /// The nonce is not the sender's next nonce.
    #[error("invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Transaction encoding error.
    #[error("encoding error: {0}")]
    Encoding(#[from] CoreError),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
