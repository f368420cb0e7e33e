//! In-memory implementation of the store traits.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use pop_core::{
    Address, ContentDigest, LoggedEvent, ProofRecord, ProofRegistered, TransactionReceipt, TxHash,
    ALREADY_REGISTERED_REASON,
};

use crate::error::Result;
use crate::traits::{
    newest_first, ChainHead, InsertResult, MirrorStore, ProofStore, ProofSummary,
    TransactionRecord,
};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Registry records by digest.
    proofs: HashMap<ContentDigest, ProofRecord>,

    /// Event log; index `i` holds sequence `i + 1`.
    events: Vec<LoggedEvent>,

    /// Transaction receipts by hash.
    receipts: HashMap<TxHash, TransactionReceipt>,

    /// Highest consumed nonce per sender.
    nonces: HashMap<Address, u64>,

    head: Option<ChainHead>,

    /// Mirror rows by fingerprint.
    mirror: HashMap<ContentDigest, ProofSummary>,

    cursors: HashMap<String, u64>,
}

impl MemoryStoreInner {
    fn record(&mut self, record: &TransactionRecord) {
        let receipt = &record.receipt;

        let nonce = self.nonces.entry(receipt.from).or_insert(record.nonce);
        *nonce = (*nonce).max(record.nonce);

        self.head = Some(ChainHead {
            block_number: receipt.block_number,
            block_timestamp: receipt.block_timestamp,
        });
        self.receipts.insert(receipt.tx_hash, receipt.clone());
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProofStore for MemoryStore {
    async fn commit_registration(
        &self,
        event: &ProofRegistered,
        record: &TransactionRecord,
    ) -> Result<InsertResult> {
        let mut inner = self.inner.write()?;

        if let Some(existing) = inner.proofs.get(&event.digest).cloned() {
            inner.record(&record.reverted(ALREADY_REGISTERED_REASON));
            return Ok(InsertResult::AlreadyExists { existing });
        }

        let sequence = inner.events.len() as u64 + 1;
        inner.proofs.insert(event.digest, event.record());
        inner.events.push(LoggedEvent {
            sequence,
            block_number: record.receipt.block_number,
            tx_hash: record.receipt.tx_hash,
            event: event.clone(),
        });
        inner.record(record);

        Ok(InsertResult::Inserted { sequence })
    }

    async fn get_proof(&self, digest: &ContentDigest) -> Result<Option<ProofRecord>> {
        let inner = self.inner.read()?;
        Ok(inner.proofs.get(digest).cloned())
    }

    async fn proof_count(&self) -> Result<u64> {
        let inner = self.inner.read()?;
        Ok(inner.proofs.len() as u64)
    }

    async fn events_since(&self, after: u64, limit: usize) -> Result<Vec<LoggedEvent>> {
        let inner = self.inner.read()?;
        let start = usize::try_from(after).unwrap_or(usize::MAX);
        Ok(inner.events.iter().skip(start).take(limit).cloned().collect())
    }

    async fn latest_sequence(&self) -> Result<u64> {
        let inner = self.inner.read()?;
        Ok(inner.events.len() as u64)
    }

    async fn record_transaction(&self, record: &TransactionRecord) -> Result<()> {
        self.inner.write()?.record(record);
        Ok(())
    }

    async fn get_receipt(&self, tx_hash: &TxHash) -> Result<Option<TransactionReceipt>> {
        let inner = self.inner.read()?;
        Ok(inner.receipts.get(tx_hash).cloned())
    }

    async fn next_nonce(&self, address: &Address) -> Result<u64> {
        let inner = self.inner.read()?;
        Ok(inner.nonces.get(address).map(|n| n + 1).unwrap_or(0))
    }

    async fn chain_head(&self) -> Result<Option<ChainHead>> {
        let inner = self.inner.read()?;
        Ok(inner.head)
    }
}

#[async_trait]
impl MirrorStore for MemoryStore {
    async fn upsert_summary(&self, summary: &ProofSummary) -> Result<()> {
        let mut inner = self.inner.write()?;
        inner
            .mirror
            .entry(summary.fingerprint)
            .and_modify(|row| row.merge(summary))
            .or_insert_with(|| summary.clone());
        Ok(())
    }

    async fn find_by_fingerprint(&self, fingerprint: &ContentDigest) -> Result<Option<ProofSummary>> {
        let inner = self.inner.read()?;
        Ok(inner.mirror.get(fingerprint).cloned())
    }

    async fn list_by_owner(&self, owner: &Address) -> Result<Vec<ProofSummary>> {
        let inner = self.inner.read()?;
        let mut rows: Vec<ProofSummary> = inner
            .mirror
            .values()
            .filter(|row| &row.owner == owner)
            .cloned()
            .collect();
        rows.sort_by(newest_first);
        Ok(rows)
    }

    async fn summary_count(&self) -> Result<u64> {
        let inner = self.inner.read()?;
        Ok(inner.mirror.len() as u64)
    }

    async fn get_cursor(&self, name: &str) -> Result<u64> {
        let inner = self.inner.read()?;
        Ok(inner.cursors.get(name).copied().unwrap_or(0))
    }

    async fn set_cursor(&self, name: &str, sequence: u64) -> Result<()> {
        let mut inner = self.inner.write()?;
        inner.cursors.insert(name.to_string(), sequence);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pop_core::TxStatus;

    fn registration(digest: u8, owner: u8, timestamp: u64) -> ProofRegistered {
        ProofRegistered {
            digest: ContentDigest::from_bytes([digest; 32]),
            owner: Address::from_bytes([owner; 20]),
            timestamp,
            metadata_pointer: format!("ptr-{}", digest),
        }
    }

    fn carrying(event: &ProofRegistered, n: u8) -> TransactionRecord {
        TransactionRecord {
            receipt: TransactionReceipt {
                tx_hash: TxHash::from_bytes([n; 32]),
                block_number: n as u64,
                block_timestamp: event.timestamp,
                from: event.owner,
                status: TxStatus::Success,
                events: vec![event.clone()],
            },
            nonce: n as u64,
        }
    }

    #[tokio::test]
    async fn test_first_writer_wins() {
        let store = MemoryStore::new();
        let first = registration(1, 0xaa, 100);
        let mut second = registration(1, 0xbb, 200);
        second.metadata_pointer = "ptr-other".into();

        let r1 = store.commit_registration(&first, &carrying(&first, 1)).await.unwrap();
        assert_eq!(r1, InsertResult::Inserted { sequence: 1 });

        let r2 = store.commit_registration(&second, &carrying(&second, 2)).await.unwrap();
        assert_eq!(r2, InsertResult::AlreadyExists { existing: first.record() });

        let reverted = store.get_receipt(&TxHash::from_bytes([2; 32])).await.unwrap().unwrap();
        assert_eq!(reverted.revert_reason(), Some(ALREADY_REGISTERED_REASON));
        assert!(reverted.events.is_empty());
        assert_eq!(store.next_nonce(&second.owner).await.unwrap(), 3);

        let stored = store.get_proof(&first.digest).await.unwrap().unwrap();
        assert_eq!(stored.owner, first.owner);
        assert_eq!(stored.metadata_pointer, "ptr-1");
        assert_eq!(store.latest_sequence().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_events_since_pages() {
        let store = MemoryStore::new();
        for i in 1..=5u8 {
            let event = registration(i, 1, 100 + i as u64);
            store.commit_registration(&event, &carrying(&event, i)).await.unwrap();
        }

        let page = store.events_since(0, 2).await.unwrap();
        assert_eq!(page.iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![1, 2]);

        let rest = store.events_since(2, 100).await.unwrap();
        assert_eq!(rest.iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![3, 4, 5]);

        assert!(store.events_since(5, 10).await.unwrap().is_empty());
        assert!(store.events_since(u64::MAX, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nonces_and_head() {
        let store = MemoryStore::new();
        let sender = Address::from_bytes([7; 20]);
        assert_eq!(store.next_nonce(&sender).await.unwrap(), 0);
        assert!(store.chain_head().await.unwrap().is_none());

        let receipt = TransactionReceipt {
            tx_hash: TxHash::from_bytes([9; 32]),
            block_number: 1,
            block_timestamp: 1_700_000_000,
            from: sender,
            status: TxStatus::Success,
            events: Vec::new(),
        };
        store
            .record_transaction(&TransactionRecord { receipt: receipt.clone(), nonce: 0 })
            .await
            .unwrap();

        assert_eq!(store.next_nonce(&sender).await.unwrap(), 1);
        assert_eq!(
            store.chain_head().await.unwrap(),
            Some(ChainHead { block_number: 1, block_timestamp: 1_700_000_000 })
        );
        assert_eq!(store.get_receipt(&receipt.tx_hash).await.unwrap(), Some(receipt));
    }

    #[tokio::test]
    async fn test_mirror_list_by_owner() {
        let store = MemoryStore::new();
        for (i, ts) in [(1u8, 300u64), (2, 100), (3, 200)] {
            let event = LoggedEvent {
                sequence: i as u64,
                block_number: i as u64,
                tx_hash: TxHash::from_bytes([i; 32]),
                event: registration(i, 0xaa, ts),
            };
            store.upsert_summary(&ProofSummary::from_event(&event)).await.unwrap();
        }
        let other = LoggedEvent {
            sequence: 4,
            block_number: 4,
            tx_hash: TxHash::from_bytes([4; 32]),
            event: registration(4, 0xbb, 400),
        };
        store.upsert_summary(&ProofSummary::from_event(&other)).await.unwrap();

        let rows = store.list_by_owner(&Address::from_bytes([0xaa; 20])).await.unwrap();
        assert_eq!(rows.iter().map(|r| r.timestamp).collect::<Vec<_>>(), vec![300, 200, 100]);
        assert_eq!(store.summary_count().await.unwrap(), 4);
        assert!(store
            .list_by_owner(&Address::from_bytes([0xcc; 20]))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_cursor_defaults_to_zero() {
        let store = MemoryStore::new();
        assert_eq!(store.get_cursor("indexer").await.unwrap(), 0);
        store.set_cursor("indexer", 12).await.unwrap();
        assert_eq!(store.get_cursor("indexer").await.unwrap(), 12);
    }
}
