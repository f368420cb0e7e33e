//! Error types for the client.

use pop_core::{Address, CanonicalizeError, ChainId, ContentDigest};
use pop_ledger::LedgerError;
use pop_store::StoreError;
use thiserror::Error;

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The content could not be read or decoded.
    #[error("canonicalization failed: {0}")]
    Canonicalize(#[from] CanonicalizeError),

    /// The digest already has an owner. Expected outcome, never retried.
    #[error("{digest} already registered by {owner} at {timestamp}")]
    AlreadyRegistered {
        digest: ContentDigest,
        owner: Address,
        timestamp: u64,
    },

    /// The signer is on a different network than the registry.
    #[error("wrong network: expected chain {expected}, signer is on {actual}")]
    WrongNetwork { expected: ChainId, actual: ChainId },

    /// Transport failure talking to a remote service.
    #[error("network error: {0}")]
    Network(String),

    /// The ledger refused or failed the call.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The metadata store returned something unusable.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// The content generator refused or returned nothing usable.
    #[error("generation error: {0}")]
    Generation(String),

    /// Mirror storage failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The request is missing something it needs.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration is incomplete or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether restarting the whole registration may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::Network(_)
                | ClientError::Ledger(LedgerError::InvalidNonce { .. })
                | ClientError::Ledger(LedgerError::Store(_))
        )
    }

    /// Short message suitable for showing to a person.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Canonicalize(_) => "unable to process this file".to_string(),
            ClientError::AlreadyRegistered { .. } => "content already registered".to_string(),
            ClientError::WrongNetwork { expected, .. } => {
                format!("wrong network, switch to chain {}", expected)
            }
            ClientError::InvalidRequest(reason) => reason.clone(),
            ClientError::Config(reason) => format!("configuration problem: {}", reason),
            ClientError::Generation(reason) => format!("content generation failed: {}", reason),
            err if err.is_transient() => "network problem, please try again".to_string(),
            err => format!("registration failed: {}", err),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Metadata(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
