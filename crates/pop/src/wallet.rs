//! Signing identities.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use pop_core::{Address, ChainId, Keypair, RegistryCall, Transaction, TransactionReceipt};
use pop_ledger::{Ledger, LedgerError};

use crate::error::Result;

/// Something that can sign registry calls and get them included.
///
/// The registry client only ever sees this capability, never key material.
#[async_trait]
pub trait SigningIdentity: Send + Sync {
    /// The account that will own anything this identity registers.
    fn address(&self) -> Address;

    /// The network the identity currently submits to.
    async fn current_network(&self) -> Result<ChainId>;

    /// Sign `call`, submit it and wait for inclusion.
    async fn sign_and_submit(&self, call: RegistryCall) -> Result<TransactionReceipt>;
}

/// A keypair held in process, submitting directly to a [`Ledger`].
pub struct LocalWallet {
    keypair: Keypair,
    ledger: Arc<dyn Ledger>,
    /// Serializes nonce assignment for this account.
    submit_lock: Mutex<()>,
}

impl LocalWallet {
    pub fn new(keypair: Keypair, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            keypair,
            ledger,
            submit_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl SigningIdentity for LocalWallet {
    fn address(&self) -> Address {
        self.keypair.address()
    }

    async fn current_network(&self) -> Result<ChainId> {
        Ok(self.ledger.chain_id().await?)
    }

    async fn sign_and_submit(&self, call: RegistryCall) -> Result<TransactionReceipt> {
        let _guard = self.submit_lock.lock().await;

        let chain_id = self.ledger.chain_id().await?;
        let nonce = self.ledger.next_nonce(&self.address()).await?;
        let tx = Transaction { chain_id, nonce, call }
            .sign(&self.keypair)
            .map_err(LedgerError::from)?;

        debug!(from = %self.address(), nonce, "submitting transaction");
        Ok(self.ledger.submit(tx).await?)
    }
}
