//! The proof registry state machine.
//!
//! Per digest there are two states, UNREGISTERED and REGISTERED, and
//! REGISTERED is terminal. `register` is the only transition. It fails with
//! [`RegistryError::AlreadyRegistered`] on a registered digest and otherwise
//! records the caller as owner and emits exactly one event.
//!
//! A call commits together with its transaction: the record, the event and
//! the receipt land in one store write, including the reverted receipt of a
//! rejected call.

use std::sync::Arc;

use pop_core::{
    Address, ContentDigest, LoggedEvent, ProofRecord, ProofRegistered, TransactionReceipt, TxHash,
    TxStatus,
};
use pop_store::{InsertResult, ProofStore, TransactionRecord};

use crate::error::RegistryError;

/// Execution context supplied by the ledger for one call.
///
/// `caller` is the verified transaction signer; callers cannot choose it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Address,
    pub block_number: u64,
    /// Block time, Unix seconds. Must be non-zero.
    pub timestamp: u64,
    pub tx_hash: TxHash,
    /// Sender nonce the transaction consumes.
    pub nonce: u64,
}

impl CallContext {
    /// Receipt of the transaction running this call.
    pub fn receipt(&self, status: TxStatus, events: Vec<ProofRegistered>) -> TransactionReceipt {
        TransactionReceipt {
            tx_hash: self.tx_hash,
            block_number: self.block_number,
            block_timestamp: self.timestamp,
            from: self.caller,
            status,
            events,
        }
    }
}

/// Registry over a [`ProofStore`].
pub struct ProofRegistry<S: ProofStore + ?Sized> {
    store: Arc<S>,
}

impl<S: ProofStore + ?Sized> ProofRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Claim `digest` for `ctx.caller`.
    pub async fn register(
        &self,
        ctx: &CallContext,
        digest: ContentDigest,
        metadata_pointer: &str,
    ) -> Result<LoggedEvent, RegistryError> {
        // A zero timestamp is the "not found" signal and must never be stored.
        if ctx.timestamp == 0 {
            return Err(RegistryError::InvalidContext("zero block timestamp".into()));
        }

        let event = ProofRegistered {
            digest,
            owner: ctx.caller,
            timestamp: ctx.timestamp,
            metadata_pointer: metadata_pointer.to_string(),
        };

        let record = TransactionRecord {
            receipt: ctx.receipt(TxStatus::Success, vec![event.clone()]),
            nonce: ctx.nonce,
        };

        match self.store.commit_registration(&event, &record).await? {
            InsertResult::Inserted { sequence } => Ok(LoggedEvent {
                sequence,
                block_number: ctx.block_number,
                tx_hash: ctx.tx_hash,
                event,
            }),
            InsertResult::AlreadyExists { existing } => {
                Err(RegistryError::AlreadyRegistered { digest, existing })
            }
        }
    }

    /// Read a record. Unregistered digests return
    /// [`ProofRecord::unregistered`].
    pub async fn get_proof(&self, digest: &ContentDigest) -> Result<ProofRecord, RegistryError> {
        Ok(self
            .store
            .get_proof(digest)
            .await?
            .unwrap_or_else(ProofRecord::unregistered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pop_store::MemoryStore;
    use proptest::prelude::*;

    fn ctx(caller: u8, block: u64) -> CallContext {
        CallContext {
            caller: Address::from_bytes([caller; 20]),
            block_number: block,
            timestamp: 1_700_000_000 + block,
            tx_hash: TxHash::from_bytes([block as u8; 32]),
            nonce: block,
        }
    }

    #[tokio::test]
    async fn test_register_then_lookup() {
        let registry = ProofRegistry::new(Arc::new(MemoryStore::new()));
        let digest = ContentDigest::from_bytes([1; 32]);

        let logged = registry.register(&ctx(0xaa, 1), digest, "ptrA").await.unwrap();
        assert_eq!(logged.sequence, 1);
        assert_eq!(logged.event.owner, Address::from_bytes([0xaa; 20]));

        let record = registry.get_proof(&digest).await.unwrap();
        assert!(record.is_registered());
        assert_eq!(record.metadata_pointer, "ptrA");
        assert_eq!(record.timestamp, 1_700_000_001);
    }

    #[tokio::test]
    async fn test_call_commits_with_its_receipt() {
        let store = Arc::new(MemoryStore::new());
        let registry = ProofRegistry::new(store.clone());
        let digest = ContentDigest::from_bytes([1; 32]);

        let first = ctx(0xaa, 1);
        let logged = registry.register(&first, digest, "p1").await.unwrap();
        let receipt = store.get_receipt(&first.tx_hash).await.unwrap().unwrap();
        assert_eq!(receipt, first.receipt(TxStatus::Success, vec![logged.event]));

        let second = ctx(0xbb, 2);
        registry.register(&second, digest, "p2").await.unwrap_err();
        let receipt = store.get_receipt(&second.tx_hash).await.unwrap().unwrap();
        assert_eq!(receipt.revert_reason(), Some("Already registered"));
        assert_eq!(store.next_nonce(&second.caller).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_second_registration_rejected() {
        let registry = ProofRegistry::new(Arc::new(MemoryStore::new()));
        let digest = ContentDigest::from_bytes([1; 32]);

        registry.register(&ctx(0xaa, 1), digest, "p1").await.unwrap();
        let err = registry.register(&ctx(0xbb, 2), digest, "p2").await.unwrap_err();

        match err {
            RegistryError::AlreadyRegistered { existing, .. } => {
                assert_eq!(existing.owner, Address::from_bytes([0xaa; 20]));
                assert_eq!(existing.metadata_pointer, "p1");
            }
            other => panic!("unexpected error: {other}"),
        }

        // Same owner is rejected too: the key is the content alone.
        assert!(matches!(
            registry.register(&ctx(0xaa, 3), digest, "p3").await,
            Err(RegistryError::AlreadyRegistered { .. })
        ));
    }

    #[tokio::test]
    async fn test_unregistered_sentinel() {
        let registry = ProofRegistry::new(Arc::new(MemoryStore::new()));
        let record = registry.get_proof(&ContentDigest::from_bytes([7; 32])).await.unwrap();
        assert_eq!(record, ProofRecord::unregistered());
    }

    #[tokio::test]
    async fn test_zero_timestamp_rejected() {
        let registry = ProofRegistry::new(Arc::new(MemoryStore::new()));
        let mut context = ctx(1, 1);
        context.timestamp = 0;
        assert!(matches!(
            registry.register(&context, ContentDigest::ZERO, "p").await,
            Err(RegistryError::InvalidContext(_))
        ));
    }

    proptest! {
        /// Whatever the order of attempts, each digest ends up owned by the
        /// first attempt that touched it, and other digests are unaffected.
        #[test]
        fn prop_first_writer_wins(attempts in prop::collection::vec((0u8..4, 0u8..5), 1..40)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let registry = ProofRegistry::new(Arc::new(MemoryStore::new()));
                let mut first: std::collections::HashMap<u8, (u8, String)> = Default::default();

                for (i, (digest, caller)) in attempts.iter().enumerate() {
                    let pointer = format!("ptr-{}", i);
                    let result = registry
                        .register(&ctx(*caller, i as u64 + 1), ContentDigest::from_bytes([*digest; 32]), &pointer)
                        .await;

                    if first.contains_key(digest) {
                        prop_assert!(matches!(result, Err(RegistryError::AlreadyRegistered { .. })), "duplicate accepted");
                    } else {
                        prop_assert!(result.is_ok());
                        first.insert(*digest, (*caller, pointer));
                    }
                }

                for digest in 0u8..4 {
                    let record = registry.get_proof(&ContentDigest::from_bytes([digest; 32])).await.unwrap();
                    match first.get(&digest) {
                        Some((caller, pointer)) => {
                            prop_assert_eq!(record.owner, Address::from_bytes([*caller; 20]));
                            prop_assert_eq!(&record.metadata_pointer, pointer);
                        }
                        None => prop_assert!(!record.is_registered()),
                    }
                }
                Ok(())
            })?;
        }
    }
}
