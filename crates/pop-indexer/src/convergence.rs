//! Convergence checks between the ledger and the mirror.
//!
//! The mirror is a projection, so after a full catch-up every registry event
//! must have a row whose ledger fields match it exactly. The registry state
//! hash summarizes the event log so two deployments can compare logs without
//! exchanging them.

use pop_core::LoggedEvent;
use pop_ledger::Ledger;
use pop_store::MirrorStore;

use crate::error::Result;

const STATE_HASH_DOMAIN: &[u8] = b"pop-registry-state-v1:";
const PAGE: usize = 500;

/// Rolling hash over events in sequence order.
///
/// H = Blake3(domain || for each event: sequence || digest || owner ||
/// timestamp || pointer length || pointer)
pub fn registry_state_hash<'a>(events: impl IntoIterator<Item = &'a LoggedEvent>) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(STATE_HASH_DOMAIN);

    for logged in events {
        let event = &logged.event;
        hasher.update(&logged.sequence.to_be_bytes());
        hasher.update(event.digest.as_bytes());
        hasher.update(event.owner.as_bytes());
        hasher.update(&event.timestamp.to_be_bytes());
        hasher.update(&(event.metadata_pointer.len() as u64).to_be_bytes());
        hasher.update(event.metadata_pointer.as_bytes());
    }

    *hasher.finalize().as_bytes()
}

/// Read the whole event log from a ledger.
pub async fn read_event_log(ledger: &dyn Ledger) -> Result<Vec<LoggedEvent>> {
    let mut events = Vec::new();
    let mut after = 0;
    loop {
        let page = ledger.events_since(after, PAGE).await?;
        match page.last() {
            Some(last) => after = last.sequence,
            None => break,
        }
        events.extend(page);
    }
    Ok(events)
}

/// Result of checking the mirror against the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceResult {
    /// Every event is reflected in the mirror.
    Converged {
        events: u64,
        state_hash: [u8; 32],
    },
    /// The indexer has not applied every event yet.
    Behind { cursor: u64, head: u64 },
    /// The mirror disagrees with the ledger.
    Diverged { reason: String },
}

impl ConvergenceResult {
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceResult::Converged { .. })
    }
}

/// Compare the mirror to the ledger's full event log.
pub async fn verify_mirror<M: MirrorStore + ?Sized>(
    ledger: &dyn Ledger,
    mirror: &M,
    cursor_name: &str,
) -> Result<ConvergenceResult> {
    let events = read_event_log(ledger).await?;
    let head = events.last().map(|e| e.sequence).unwrap_or(0);
    let cursor = mirror.get_cursor(cursor_name).await?;

    if cursor < head {
        return Ok(ConvergenceResult::Behind { cursor, head });
    }
    if cursor > head {
        return Ok(ConvergenceResult::Diverged {
            reason: format!("cursor {} is past ledger head {}", cursor, head),
        });
    }

    for logged in &events {
        let event = &logged.event;
        let row = match mirror.find_by_fingerprint(&event.digest).await? {
            Some(row) => row,
            None => {
                return Ok(ConvergenceResult::Diverged {
                    reason: format!("missing row for {}", event.digest),
                });
            }
        };

        if row.owner != event.owner
            || row.timestamp != event.timestamp
            || row.metadata_pointer != event.metadata_pointer
        {
            return Ok(ConvergenceResult::Diverged {
                reason: format!("row for {} does not match its event", event.digest),
            });
        }
    }

    let rows = mirror.summary_count().await?;
    if rows != events.len() as u64 {
        return Ok(ConvergenceResult::Diverged {
            reason: format!("mirror has {} rows for {} events", rows, events.len()),
        });
    }

    Ok(ConvergenceResult::Converged {
        events: events.len() as u64,
        state_hash: registry_state_hash(&events),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Indexer, IndexerConfig};
    use pop_core::{
        Address, ChainId, ContentDigest, Keypair, ProofRegistered, RegistryCall, Transaction,
        TxHash,
    };
    use pop_ledger::{DevChain, DevChainConfig, ManualClock};
    use pop_store::{MemoryStore, ProofSummary};
    use std::sync::Arc;

    fn logged(sequence: u64, digest: u8, pointer: &str) -> LoggedEvent {
        LoggedEvent {
            sequence,
            block_number: sequence,
            tx_hash: TxHash::from_bytes([sequence as u8; 32]),
            event: ProofRegistered {
                digest: ContentDigest::from_bytes([digest; 32]),
                owner: Address::from_bytes([9; 20]),
                timestamp: 1_700_000_000 + sequence,
                metadata_pointer: pointer.to_string(),
            },
        }
    }

    #[test]
    fn test_state_hash_is_order_sensitive() {
        let a = logged(1, 1, "a");
        let b = logged(2, 2, "b");
        assert_eq!(registry_state_hash([&a, &b]), registry_state_hash(&vec![a.clone(), b.clone()]));
        assert_ne!(registry_state_hash([&a, &b]), registry_state_hash([&b, &a]));
    }

    #[test]
    fn test_state_hash_pointer_boundaries() {
        // Length prefixing keeps "ab"+"c" distinct from "a"+"bc".
        let left = [logged(1, 1, "ab"), logged(2, 2, "c")];
        let right = [logged(1, 1, "a"), logged(2, 2, "bc")];
        assert_ne!(registry_state_hash(&left), registry_state_hash(&right));
    }

    #[tokio::test]
    async fn test_mirror_convergence_lifecycle() {
        let chain = Arc::new(
            DevChain::open(
                MemoryStore::new(),
                Arc::new(ManualClock::new(1_700_000_000)),
                DevChainConfig::default(),
            )
            .await
            .unwrap(),
        );
        let kp = Keypair::from_seed(&[3; 32]);
        for (nonce, digest) in [(0u64, 1u8), (1, 2)] {
            let tx = Transaction {
                chain_id: ChainId::SEPOLIA,
                nonce,
                call: RegistryCall::Register {
                    digest: ContentDigest::from_bytes([digest; 32]),
                    metadata_pointer: "p".into(),
                },
            }
            .sign(&kp)
            .unwrap();
            chain.submit(tx).await.unwrap();
        }

        let mirror = Arc::new(MemoryStore::new());
        let result = verify_mirror(chain.as_ref(), mirror.as_ref(), "mirror").await.unwrap();
        assert_eq!(result, ConvergenceResult::Behind { cursor: 0, head: 2 });

        let indexer = Indexer::new(chain.clone(), mirror.clone(), IndexerConfig::default());
        indexer.catch_up().await.unwrap();

        let result = verify_mirror(chain.as_ref(), mirror.as_ref(), "mirror").await.unwrap();
        assert!(result.is_converged());

        // A stray row the ledger never produced is divergence.
        let mut stray = ProofSummary::from_event(&logged(9, 9, "x"));
        stray.tx_hash = None;
        mirror.upsert_summary(&stray).await.unwrap();
        let result = verify_mirror(chain.as_ref(), mirror.as_ref(), "mirror").await.unwrap();
        assert!(matches!(result, ConvergenceResult::Diverged { .. }));
    }
}
