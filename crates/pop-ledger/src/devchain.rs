//! A single-lane local ledger.
//!
//! `DevChain` executes one transaction at a time. For each submission it:
//! 1. verifies the signature and chain id (no lock held),
//! 2. takes the execution lane,
//! 3. checks the sender nonce,
//! 4. opens a block (`number = previous + 1`,
//!    `timestamp = max(clock, previous timestamp)`),
//! 5. runs the registry call, which commits the transaction with it,
//! 6. advances the head and publishes any event.
//!
//! Reads go straight to the store and never wait on the lane.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use pop_core::{
    Address, ChainId, ContentDigest, CoreError, LoggedEvent, ProofRecord, RegistryCall,
    SignedTransaction, TransactionReceipt, TxHash, TxStatus, ALREADY_REGISTERED_REASON,
};
use pop_store::{ProofStore, TransactionRecord};

use crate::clock::{Clock, SystemClock};
use crate::error::{LedgerError, RegistryError, Result};
use crate::ledger::Ledger;
use crate::registry::{CallContext, ProofRegistry};

/// Configuration for a [`DevChain`].
#[derive(Debug, Clone)]
pub struct DevChainConfig {
    /// Chain id transactions must carry.
    pub chain_id: ChainId,
    /// Capacity of the live event channel. Slow subscribers that fall this
    /// far behind miss events and must catch up with `events_since`.
    pub event_buffer: usize,
}

impl Default for DevChainConfig {
    fn default() -> Self {
        Self {
            chain_id: ChainId::SEPOLIA,
            event_buffer: 1024,
        }
    }
}

/// Head of the chain as seen by the execution lane.
#[derive(Debug, Clone, Copy, Default)]
struct LaneState {
    block_number: u64,
    block_timestamp: u64,
}

/// A local ledger over a [`ProofStore`].
pub struct DevChain<S: ProofStore> {
    config: DevChainConfig,
    store: Arc<S>,
    registry: ProofRegistry<S>,
    clock: Arc<dyn Clock>,
    lane: Mutex<LaneState>,
    events: broadcast::Sender<LoggedEvent>,
}

impl<S: ProofStore> DevChain<S> {
    /// Open a chain over `store`, resuming from its recorded head.
    pub async fn open(store: S, clock: Arc<dyn Clock>, config: DevChainConfig) -> Result<Self> {
        let store = Arc::new(store);
        let head = store.chain_head().await?;
        let lane = head
            .map(|h| LaneState {
                block_number: h.block_number,
                block_timestamp: h.block_timestamp,
            })
            .unwrap_or_default();

        let (events, _) = broadcast::channel(config.event_buffer.max(1));

        info!(
            chain_id = %config.chain_id,
            block_number = lane.block_number,
            "dev chain opened"
        );

        Ok(Self {
            registry: ProofRegistry::new(store.clone()),
            config,
            store,
            clock,
            lane: Mutex::new(lane),
            events,
        })
    }

    /// Open a chain with the wall clock and default configuration.
    pub async fn with_store(store: S) -> Result<Self> {
        Self::open(store, Arc::new(SystemClock), DevChainConfig::default()).await
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The configured chain id.
    pub fn config(&self) -> &DevChainConfig {
        &self.config
    }

    /// Number of the latest block.
    pub async fn block_number(&self) -> u64 {
        self.lane.lock().await.block_number
    }
}

#[async_trait]
impl<S: ProofStore + 'static> Ledger for DevChain<S> {
    async fn chain_id(&self) -> Result<ChainId> {
        Ok(self.config.chain_id)
    }

    async fn next_nonce(&self, address: &Address) -> Result<u64> {
        Ok(self.store.next_nonce(address).await?)
    }

    async fn submit(&self, tx: SignedTransaction) -> Result<TransactionReceipt> {
        tx.verify().map_err(|e| match e {
            CoreError::InvalidSignature | CoreError::InvalidPublicKey => {
                LedgerError::InvalidSignature
            }
            other => LedgerError::Encoding(other),
        })?;

        if tx.transaction.chain_id != self.config.chain_id {
            return Err(LedgerError::WrongChain {
                expected: self.config.chain_id,
                got: tx.transaction.chain_id,
            });
        }

        let tx_hash = tx.hash()?;
        let from = tx.from();

        let mut lane = self.lane.lock().await;

        let expected = self.store.next_nonce(&from).await?;
        if tx.transaction.nonce != expected {
            return Err(LedgerError::InvalidNonce {
                expected,
                got: tx.transaction.nonce,
            });
        }

        let block_number = lane.block_number + 1;
        let block_timestamp = self
            .clock
            .now_secs()
            .max(lane.block_timestamp)
            .max(1);

        let ctx = CallContext {
            caller: from,
            block_number,
            timestamp: block_timestamp,
            tx_hash,
            nonce: tx.transaction.nonce,
        };

        // The registry commits the call together with its receipt. A store
        // failure leaves neither behind, so the lane stays where it was.
        let (receipt, logged) = match &tx.transaction.call {
            RegistryCall::Register {
                digest,
                metadata_pointer,
            } => match self.registry.register(&ctx, *digest, metadata_pointer).await {
                Ok(logged) => (
                    ctx.receipt(TxStatus::Success, vec![logged.event.clone()]),
                    Some(logged),
                ),
                Err(RegistryError::AlreadyRegistered { digest, existing }) => {
                    warn!(
                        %digest,
                        %from,
                        owner = %existing.owner,
                        "register reverted: already registered"
                    );
                    let status = TxStatus::Reverted {
                        reason: ALREADY_REGISTERED_REASON.to_string(),
                    };
                    (ctx.receipt(status, Vec::new()), None)
                }
                Err(RegistryError::InvalidContext(reason)) => {
                    let receipt = ctx.receipt(TxStatus::Reverted { reason }, Vec::new());
                    self.store
                        .record_transaction(&TransactionRecord {
                            receipt: receipt.clone(),
                            nonce: ctx.nonce,
                        })
                        .await?;
                    (receipt, None)
                }
                Err(RegistryError::Store(e)) => return Err(e.into()),
            },
        };

        lane.block_number = block_number;
        lane.block_timestamp = block_timestamp;

        // Published under the lane so subscribers see events in sequence order.
        if let Some(logged) = logged {
            info!(
                digest = %logged.event.digest,
                owner = %logged.event.owner,
                sequence = logged.sequence,
                block_number,
                "proof registered"
            );
            // No subscribers is fine.
            let _ = self.events.send(logged);
        }

        Ok(receipt)
    }

    async fn get_proof(&self, digest: &ContentDigest) -> Result<ProofRecord> {
        Ok(self
            .store
            .get_proof(digest)
            .await?
            .unwrap_or_else(ProofRecord::unregistered))
    }

    async fn get_receipt(&self, tx_hash: &TxHash) -> Result<Option<TransactionReceipt>> {
        Ok(self.store.get_receipt(tx_hash).await?)
    }

    async fn events_since(&self, after: u64, limit: usize) -> Result<Vec<LoggedEvent>> {
        Ok(self.store.events_since(after, limit).await?)
    }

    fn subscribe(&self) -> broadcast::Receiver<LoggedEvent> {
        self.events.subscribe()
    }
}
