//! Event projection into the mirror.
//!
//! The indexer reads registry events in sequence order and upserts one
//! [`ProofSummary`] per event. Progress is stored as a named cursor in the
//! mirror itself, so a restarted indexer resumes where it stopped and
//! re-applying an event is harmless.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use pop_core::{LoggedEvent, ProofMetadata};
use pop_ledger::Ledger;
use pop_store::{MirrorStore, ProofSummary};

use crate::error::Result;

/// Where the indexer looks up metadata documents for new events.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetch the document behind `pointer`. Implementations log their own
    /// failures and return `None`; a missing document never stops indexing.
    async fn fetch_metadata(&self, pointer: &str) -> Option<ProofMetadata>;
}

/// Configuration for the indexer.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Name of the cursor in the mirror's cursor table.
    pub cursor_name: String,
    /// Maximum events to read per ledger query.
    pub batch_size: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            cursor_name: "mirror".to_string(),
            batch_size: 100,
        }
    }
}

/// Summary of one catch-up pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Events applied to the mirror.
    pub applied: usize,
    /// Events whose metadata document was found and merged.
    pub enriched: usize,
    /// Cursor after the pass.
    pub cursor: u64,
}

/// Projects a ledger's event log into a [`MirrorStore`].
pub struct Indexer<M: MirrorStore + ?Sized> {
    ledger: Arc<dyn Ledger>,
    mirror: Arc<M>,
    metadata: Option<Arc<dyn MetadataSource>>,
    config: IndexerConfig,
}

impl<M: MirrorStore + ?Sized> Indexer<M> {
    pub fn new(ledger: Arc<dyn Ledger>, mirror: Arc<M>, config: IndexerConfig) -> Self {
        Self {
            ledger,
            mirror,
            metadata: None,
            config,
        }
    }

    /// Enrich new rows with metadata documents.
    pub fn with_metadata(mut self, source: Arc<dyn MetadataSource>) -> Self {
        self.metadata = Some(source);
        self
    }

    /// The last sequence applied to the mirror.
    pub async fn cursor(&self) -> Result<u64> {
        Ok(self.mirror.get_cursor(&self.config.cursor_name).await?)
    }

    /// Apply every event after the cursor, batch by batch.
    pub async fn catch_up(&self) -> Result<IndexReport> {
        let mut report = IndexReport {
            cursor: self.cursor().await?,
            ..Default::default()
        };

        loop {
            let batch = self
                .ledger
                .events_since(report.cursor, self.config.batch_size.max(1))
                .await?;
            if batch.is_empty() {
                break;
            }

            for event in &batch {
                if self.apply(event).await? {
                    report.enriched += 1;
                }
                report.applied += 1;
                report.cursor = event.sequence;
            }

            self.mirror
                .set_cursor(&self.config.cursor_name, report.cursor)
                .await?;
            debug!(cursor = report.cursor, batch = batch.len(), "indexed batch");
        }

        if report.applied > 0 {
            info!(
                applied = report.applied,
                enriched = report.enriched,
                cursor = report.cursor,
                "mirror caught up"
            );
        }
        Ok(report)
    }

    /// Follow the live event feed until `shutdown` flips to `true`.
    ///
    /// Subscribes before catching up so nothing committed in between is
    /// missed. Falls back to `catch_up` whenever the feed lags or skips a
    /// sequence.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut feed = self.ledger.subscribe();
        let mut cursor = self.catch_up().await?.cursor;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(cursor, "indexer stopping");
                        return Ok(());
                    }
                }
                received = feed.recv() => match received {
                    Ok(event) if event.sequence <= cursor => {}
                    Ok(event) if event.sequence == cursor + 1 => {
                        self.apply(&event).await?;
                        cursor = event.sequence;
                        self.mirror.set_cursor(&self.config.cursor_name, cursor).await?;
                    }
                    Ok(event) => {
                        debug!(cursor, received = event.sequence, "sequence gap, catching up");
                        cursor = self.catch_up().await?.cursor;
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "event feed lagged, catching up");
                        cursor = self.catch_up().await?.cursor;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!(cursor, "event feed closed");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Upsert the row for one event. Returns whether metadata was merged.
    async fn apply(&self, event: &LoggedEvent) -> Result<bool> {
        let mut summary = ProofSummary::from_event(event);
        let mut enriched = false;

        if let Some(source) = &self.metadata {
            let known = self
                .mirror
                .find_by_fingerprint(&event.event.digest)
                .await?
                .map(|row| row.has_metadata())
                .unwrap_or(false);

            if !known {
                if let Some(metadata) = source.fetch_metadata(&event.event.metadata_pointer).await {
                    summary = summary.with_metadata(&metadata);
                    enriched = true;
                }
            }
        }

        self.mirror.upsert_summary(&summary).await?;
        Ok(enriched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pop_core::{ChainId, ContentDigest, Keypair, RegistryCall, Transaction};
    use pop_ledger::{DevChain, DevChainConfig, ManualClock};
    use pop_store::{MemoryStore, SqliteStore};
    use std::time::Duration;

    async fn chain() -> Arc<DevChain<MemoryStore>> {
        Arc::new(
            DevChain::open(
                MemoryStore::new(),
                Arc::new(ManualClock::new(1_700_000_000)),
                DevChainConfig::default(),
            )
            .await
            .unwrap(),
        )
    }

    async fn register(chain: &DevChain<MemoryStore>, kp: &Keypair, digest: u8) {
        let nonce = chain.next_nonce(&kp.address()).await.unwrap();
        let tx = Transaction {
            chain_id: ChainId::SEPOLIA,
            nonce,
            call: RegistryCall::Register {
                digest: ContentDigest::from_bytes([digest; 32]),
                metadata_pointer: format!("ptr-{}", digest),
            },
        }
        .sign(kp)
        .unwrap();
        chain.submit(tx).await.unwrap();
    }

    struct FixedMetadata;

    #[async_trait]
    impl MetadataSource for FixedMetadata {
        async fn fetch_metadata(&self, pointer: &str) -> Option<ProofMetadata> {
            let digest: u8 = pointer.strip_prefix("ptr-")?.parse().ok()?;
            if digest == 2 {
                return None;
            }
            Some(ProofMetadata::new(
                ContentDigest::from_bytes([digest; 32]),
                format!("prompt {}", digest),
                pop_core::Address::ZERO,
                "text/plain",
            ))
        }
    }

    #[tokio::test]
    async fn test_catch_up_projects_all_events() {
        let chain = chain().await;
        let alice = Keypair::from_seed(&[1; 32]);
        for d in 1..=5 {
            register(&chain, &alice, d).await;
        }

        let mirror = Arc::new(MemoryStore::new());
        let indexer = Indexer::new(
            chain.clone(),
            mirror.clone(),
            IndexerConfig { batch_size: 2, ..Default::default() },
        );

        let report = indexer.catch_up().await.unwrap();
        assert_eq!(report.applied, 5);
        assert_eq!(report.cursor, 5);

        let rows = mirror.list_by_owner(&alice.address()).await.unwrap();
        assert_eq!(rows.len(), 5);

        // Nothing new: a second pass is a no-op.
        assert_eq!(indexer.catch_up().await.unwrap().applied, 0);
    }

    #[tokio::test]
    async fn test_resumes_from_persisted_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror.db");
        let chain = chain().await;
        let alice = Keypair::from_seed(&[1; 32]);

        register(&chain, &alice, 1).await;
        register(&chain, &alice, 2).await;
        {
            let mirror = Arc::new(SqliteStore::open(&path).unwrap());
            let indexer = Indexer::new(chain.clone(), mirror, IndexerConfig::default());
            assert_eq!(indexer.catch_up().await.unwrap().applied, 2);
        }

        register(&chain, &alice, 3).await;
        let mirror = Arc::new(SqliteStore::open(&path).unwrap());
        let indexer = Indexer::new(chain.clone(), mirror.clone(), IndexerConfig::default());
        let report = indexer.catch_up().await.unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.cursor, 3);
        assert_eq!(mirror.summary_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_metadata_enrichment() {
        let chain = chain().await;
        let alice = Keypair::from_seed(&[1; 32]);
        register(&chain, &alice, 1).await;
        register(&chain, &alice, 2).await;

        let mirror = Arc::new(MemoryStore::new());
        let indexer = Indexer::new(chain.clone(), mirror.clone(), IndexerConfig::default())
            .with_metadata(Arc::new(FixedMetadata));

        let report = indexer.catch_up().await.unwrap();
        assert_eq!(report.applied, 2);
        assert_eq!(report.enriched, 1);

        let row = mirror
            .find_by_fingerprint(&ContentDigest::from_bytes([1; 32]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.prompt.as_deref(), Some("prompt 1"));
        // Ledger facts win over anything in the document.
        assert_eq!(row.owner, alice.address());

        let missing = mirror
            .find_by_fingerprint(&ContentDigest::from_bytes([2; 32]))
            .await
            .unwrap()
            .unwrap();
        assert!(missing.prompt.is_none());
    }

    #[tokio::test]
    async fn test_run_follows_live_events() {
        let chain = chain().await;
        let alice = Keypair::from_seed(&[1; 32]);
        register(&chain, &alice, 1).await;

        let mirror = Arc::new(MemoryStore::new());
        let indexer = Arc::new(Indexer::new(chain.clone(), mirror.clone(), IndexerConfig::default()));
        let (stop, stopped) = watch::channel(false);

        let task = {
            let indexer = indexer.clone();
            tokio::spawn(async move { indexer.run(stopped).await })
        };

        register(&chain, &alice, 2).await;
        register(&chain, &alice, 3).await;

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while indexer.cursor().await.unwrap() < 3 {
            assert!(tokio::time::Instant::now() < deadline, "indexer did not catch up");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        stop.send(true).unwrap();
        task.await.unwrap().unwrap();
        assert_eq!(mirror.summary_count().await.unwrap(), 3);
    }
}
