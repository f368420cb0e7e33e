//! The registry client.
//!
//! Constructed explicitly by [`RegistryClient::connect`] and consumed by
//! [`RegistryClient::disconnect`]. There is no shared global connection.

use std::sync::Arc;

use tracing::{info, warn};

use pop_core::{
    Address, ChainId, ContentDigest, ProofRecord, RegistryCall, TransactionReceipt, TxStatus,
    ALREADY_REGISTERED_REASON,
};
use pop_ledger::Ledger;

use crate::error::{ClientError, Result};
use crate::wallet::SigningIdentity;

/// A connected view of the proof registry.
pub struct RegistryClient {
    identity: Arc<dyn SigningIdentity>,
    ledger: Arc<dyn Ledger>,
    chain_id: ChainId,
}

impl RegistryClient {
    /// Connect `identity` to the registry on `expected`.
    ///
    /// Fails with [`ClientError::WrongNetwork`] when the identity is on a
    /// different network.
    pub async fn connect(
        identity: Arc<dyn SigningIdentity>,
        ledger: Arc<dyn Ledger>,
        expected: ChainId,
    ) -> Result<Self> {
        let client = Self {
            identity,
            ledger,
            chain_id: expected,
        };
        client.ensure_network().await?;
        info!(address = %client.address(), chain_id = %expected, "registry client connected");
        Ok(client)
    }

    /// Drop the connection.
    pub fn disconnect(self) {
        info!(address = %self.address(), "registry client disconnected");
    }

    /// The connected account.
    pub fn address(&self) -> Address {
        self.identity.address()
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// Check the identity is still on the expected network.
    pub async fn ensure_network(&self) -> Result<()> {
        let actual = self.identity.current_network().await?;
        if actual != self.chain_id {
            return Err(ClientError::WrongNetwork {
                expected: self.chain_id,
                actual,
            });
        }
        Ok(())
    }

    /// Register `digest` with `metadata_pointer` as the connected account.
    ///
    /// A registry revert surfaces as [`ClientError::AlreadyRegistered`],
    /// carrying the record that won.
    pub async fn register_proof(
        &self,
        digest: ContentDigest,
        metadata_pointer: &str,
    ) -> Result<TransactionReceipt> {
        self.ensure_network().await?;

        let receipt = self
            .identity
            .sign_and_submit(RegistryCall::Register {
                digest,
                metadata_pointer: metadata_pointer.to_string(),
            })
            .await?;

        match &receipt.status {
            TxStatus::Success => {
                info!(
                    digest = %digest,
                    tx_hash = %receipt.tx_hash,
                    block = receipt.block_number,
                    "proof registered"
                );
                Ok(receipt)
            }
            TxStatus::Reverted { reason } if reason == ALREADY_REGISTERED_REASON => {
                warn!(digest = %digest, tx_hash = %receipt.tx_hash, "registration reverted: already registered");
                let existing = self.get_proof(&digest).await?;
                Err(ClientError::AlreadyRegistered {
                    digest,
                    owner: existing.owner,
                    timestamp: existing.timestamp,
                })
            }
            TxStatus::Reverted { reason } => {
                warn!(digest = %digest, tx_hash = %receipt.tx_hash, reason = %reason, "registration reverted");
                Err(ClientError::InvalidRequest(format!("transaction reverted: {}", reason)))
            }
        }
    }

    /// Read the registry record. Unregistered digests return the zero
    /// sentinel.
    pub async fn get_proof(&self, digest: &ContentDigest) -> Result<ProofRecord> {
        Ok(self.ledger.get_proof(digest).await?)
    }

    /// Like [`get_proof`](Self::get_proof) but `None` when unregistered.
    pub async fn lookup(&self, digest: &ContentDigest) -> Result<Option<ProofRecord>> {
        let record = self.get_proof(digest).await?;
        Ok(record.is_registered().then_some(record))
    }
}
