//! Error types for the indexer.

use thiserror::Error;

/// Errors that can occur while indexing.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Reading from the ledger failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] pop_ledger::LedgerError),

    /// Writing to the mirror failed.
    #[error("store error: {0}")]
    Store(#[from] pop_store::StoreError),
}

/// Result type for indexer operations.
pub type Result<T> = std::result::Result<T, IndexerError>;
