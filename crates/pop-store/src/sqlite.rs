//! SQLite implementation of the store traits.
//!
//! This is the persistent storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use pop_core::{
    Address, ContentDigest, LoggedEvent, ProofRecord, ProofRegistered, TransactionReceipt, TxHash,
    TxStatus, ALREADY_REGISTERED_REASON,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{
    ChainHead, InsertResult, MirrorStore, ProofStore, ProofSummary, TransactionRecord,
};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

fn blob_to_array<const N: usize>(
    idx: usize,
    name: &str,
    bytes: Vec<u8>,
) -> rusqlite::Result<[u8; N]> {
    bytes.try_into().map_err(|_| {
        rusqlite::Error::InvalidColumnType(idx, name.into(), rusqlite::types::Type::Blob)
    })
}

fn to_sql_u64(n: u64) -> Result<i64> {
    i64::try_from(n).map_err(|_| StoreError::InvalidData(format!("{} does not fit in INTEGER", n)))
}

// Columns: digest, owner, timestamp, metadata_pointer, sequence, block_number, tx_hash
fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<LoggedEvent> {
    Ok(LoggedEvent {
        sequence: row.get::<_, i64>(4)? as u64,
        block_number: row.get::<_, i64>(5)? as u64,
        tx_hash: TxHash(blob_to_array(6, "tx_hash", row.get(6)?)?),
        event: ProofRegistered {
            digest: ContentDigest(blob_to_array(0, "digest", row.get(0)?)?),
            owner: Address(blob_to_array(1, "owner", row.get(1)?)?),
            timestamp: row.get::<_, i64>(2)? as u64,
            metadata_pointer: row.get(3)?,
        },
    })
}

fn insert_transaction(conn: &Connection, record: &TransactionRecord) -> Result<()> {
    let receipt = &record.receipt;
    conn.execute(
        "INSERT INTO transactions (
            tx_hash, sender, nonce, block_number, block_timestamp, revert_reason
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            receipt.tx_hash.0.as_slice(),
            receipt.from.0.as_slice(),
            to_sql_u64(record.nonce)?,
            to_sql_u64(receipt.block_number)?,
            to_sql_u64(receipt.block_timestamp)?,
            receipt.revert_reason(),
        ],
    )?;
    Ok(())
}

const EVENT_COLUMNS: &str =
    "digest, owner, timestamp, metadata_pointer, sequence, block_number, tx_hash";

fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProofSummary> {
    let tx_hash: Option<Vec<u8>> = row.get("tx_hash")?;
    let created_at: Option<String> = row.get("created_at")?;

    Ok(ProofSummary {
        fingerprint: ContentDigest(blob_to_array(0, "fingerprint", row.get("fingerprint")?)?),
        owner: Address(blob_to_array(1, "owner", row.get("owner")?)?),
        timestamp: row.get::<_, i64>("timestamp")? as u64,
        metadata_pointer: row.get("metadata_pointer")?,
        tx_hash: tx_hash
            .map(|b| blob_to_array(4, "tx_hash", b).map(TxHash))
            .transpose()?,
        block_number: row.get::<_, Option<i64>>("block_number")?.map(|n| n as u64),
        prompt: row.get("prompt")?,
        model: row.get("model")?,
        model_version: row.get("model_version")?,
        content_type: row.get("content_type")?,
        notes: row.get("notes")?,
        created_at: created_at
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            11,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })
            })
            .transpose()?,
    })
}

const SUMMARY_COLUMNS: &str = "fingerprint, owner, timestamp, metadata_pointer, tx_hash, \
     block_number, prompt, model, model_version, content_type, notes, created_at";

#[async_trait]
impl ProofStore for SqliteStore {
    async fn commit_registration(
        &self,
        event: &ProofRegistered,
        record: &TransactionRecord,
    ) -> Result<InsertResult> {
        let event = event.clone();
        let record = record.clone();
        let timestamp = to_sql_u64(event.timestamp)?;
        let block_number = to_sql_u64(record.receipt.block_number)?;

        self.run(move |conn| {
            // IMMEDIATE takes the write lock up front so the existence check,
            // the insert and the transaction row see the same state.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let existing = tx
                .query_row(
                    "SELECT owner, timestamp, metadata_pointer FROM proofs WHERE digest = ?1",
                    params![event.digest.0.as_slice()],
                    |row| {
                        Ok(ProofRecord {
                            owner: Address(blob_to_array(0, "owner", row.get(0)?)?),
                            timestamp: row.get::<_, i64>(1)? as u64,
                            metadata_pointer: row.get(2)?,
                        })
                    },
                )
                .optional()?;

            if let Some(existing) = existing {
                insert_transaction(&tx, &record.reverted(ALREADY_REGISTERED_REASON))?;
                tx.commit()?;
                return Ok(InsertResult::AlreadyExists { existing });
            }

            let sequence: i64 = tx.query_row(
                "SELECT COALESCE(MAX(sequence), 0) + 1 FROM proofs",
                [],
                |row| row.get(0),
            )?;

            tx.execute(
                "INSERT INTO proofs (
                    digest, owner, timestamp, metadata_pointer, sequence, block_number, tx_hash
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    event.digest.0.as_slice(),
                    event.owner.0.as_slice(),
                    timestamp,
                    event.metadata_pointer,
                    sequence,
                    block_number,
                    record.receipt.tx_hash.0.as_slice(),
                ],
            )?;
            insert_transaction(&tx, &record)?;
            tx.commit()?;

            tracing::debug!(digest = %event.digest, sequence, "proof committed");
            Ok(InsertResult::Inserted {
                sequence: sequence as u64,
            })
        })
        .await
    }

    async fn get_proof(&self, digest: &ContentDigest) -> Result<Option<ProofRecord>> {
        let digest = *digest;
        self.run(move |conn| {
            conn.query_row(
                "SELECT owner, timestamp, metadata_pointer FROM proofs WHERE digest = ?1",
                params![digest.0.as_slice()],
                |row| {
                    Ok(ProofRecord {
                        owner: Address(blob_to_array(0, "owner", row.get(0)?)?),
                        timestamp: row.get::<_, i64>(1)? as u64,
                        metadata_pointer: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn proof_count(&self) -> Result<u64> {
        self.run(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM proofs", [], |row| row.get(0))?;
            Ok(n as u64)
        })
        .await
    }

    async fn events_since(&self, after: u64, limit: usize) -> Result<Vec<LoggedEvent>> {
        let after = i64::try_from(after).unwrap_or(i64::MAX);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM proofs WHERE sequence > ?1 ORDER BY sequence LIMIT ?2",
                EVENT_COLUMNS
            ))?;
            let events = stmt
                .query_map(params![after, limit], row_to_event)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(events)
        })
        .await
    }

    async fn latest_sequence(&self) -> Result<u64> {
        self.run(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COALESCE(MAX(sequence), 0) FROM proofs",
                [],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        })
        .await
    }

    async fn record_transaction(&self, record: &TransactionRecord) -> Result<()> {
        let record = record.clone();
        self.run(move |conn| insert_transaction(conn, &record)).await
    }

    async fn get_receipt(&self, tx_hash: &TxHash) -> Result<Option<TransactionReceipt>> {
        let tx_hash = *tx_hash;

        self.run(move |conn| {
            let row = conn
                .query_row(
                    "SELECT sender, block_number, block_timestamp, revert_reason
                     FROM transactions WHERE tx_hash = ?1",
                    params![tx_hash.0.as_slice()],
                    |row| {
                        Ok((
                            Address(blob_to_array(0, "sender", row.get(0)?)?),
                            row.get::<_, i64>(1)? as u64,
                            row.get::<_, i64>(2)? as u64,
                            row.get::<_, Option<String>>(3)?,
                        ))
                    },
                )
                .optional()?;

            let Some((from, block_number, block_timestamp, revert_reason)) = row else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM proofs WHERE tx_hash = ?1 ORDER BY sequence",
                EVENT_COLUMNS
            ))?;
            let events = stmt
                .query_map(params![tx_hash.0.as_slice()], row_to_event)?
                .map(|e| e.map(|logged| logged.event))
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let status = match revert_reason {
                Some(reason) => TxStatus::Reverted { reason },
                None => TxStatus::Success,
            };

            Ok(Some(TransactionReceipt {
                tx_hash,
                block_number,
                block_timestamp,
                from,
                status,
                events,
            }))
        })
        .await
    }

    async fn next_nonce(&self, address: &Address) -> Result<u64> {
        let address = *address;
        self.run(move |conn| {
            let max: Option<i64> = conn.query_row(
                "SELECT MAX(nonce) FROM transactions WHERE sender = ?1",
                params![address.0.as_slice()],
                |row| row.get(0),
            )?;
            Ok(max.map(|n| n as u64 + 1).unwrap_or(0))
        })
        .await
    }

    async fn chain_head(&self) -> Result<Option<ChainHead>> {
        self.run(|conn| {
            conn.query_row(
                "SELECT block_number, block_timestamp FROM transactions
                 ORDER BY block_number DESC LIMIT 1",
                [],
                |row| {
                    Ok(ChainHead {
                        block_number: row.get::<_, i64>(0)? as u64,
                        block_timestamp: row.get::<_, i64>(1)? as u64,
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }
}

#[async_trait]
impl MirrorStore for SqliteStore {
    async fn upsert_summary(&self, summary: &ProofSummary) -> Result<()> {
        let s = summary.clone();
        let timestamp = to_sql_u64(s.timestamp)?;
        let block_number = s.block_number.map(to_sql_u64).transpose()?;

        self.run(move |conn| {
            // Ledger fields are replaced; descriptive fields keep their
            // current value when the incoming one is NULL.
            conn.execute(
                "INSERT INTO mirror_proofs (
                    fingerprint, owner, timestamp, metadata_pointer, tx_hash, block_number,
                    prompt, model, model_version, content_type, notes, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                ON CONFLICT(fingerprint) DO UPDATE SET
                    owner = excluded.owner,
                    timestamp = excluded.timestamp,
                    metadata_pointer = excluded.metadata_pointer,
                    tx_hash = COALESCE(excluded.tx_hash, mirror_proofs.tx_hash),
                    block_number = COALESCE(excluded.block_number, mirror_proofs.block_number),
                    prompt = COALESCE(excluded.prompt, mirror_proofs.prompt),
                    model = COALESCE(excluded.model, mirror_proofs.model),
                    model_version = COALESCE(excluded.model_version, mirror_proofs.model_version),
                    content_type = COALESCE(excluded.content_type, mirror_proofs.content_type),
                    notes = COALESCE(excluded.notes, mirror_proofs.notes),
                    created_at = COALESCE(excluded.created_at, mirror_proofs.created_at),
                    updated_at = excluded.updated_at",
                params![
                    s.fingerprint.0.as_slice(),
                    s.owner.0.as_slice(),
                    timestamp,
                    s.metadata_pointer,
                    s.tx_hash.as_ref().map(|h| h.0.to_vec()),
                    block_number,
                    s.prompt,
                    s.model,
                    s.model_version,
                    s.content_type,
                    s.notes,
                    s.created_at.map(|dt| dt.to_rfc3339()),
                    Utc::now().timestamp_millis(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn find_by_fingerprint(&self, fingerprint: &ContentDigest) -> Result<Option<ProofSummary>> {
        let fingerprint = *fingerprint;
        self.run(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM mirror_proofs WHERE fingerprint = ?1",
                    SUMMARY_COLUMNS
                ),
                params![fingerprint.0.as_slice()],
                row_to_summary,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_by_owner(&self, owner: &Address) -> Result<Vec<ProofSummary>> {
        let owner = *owner;
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM mirror_proofs WHERE owner = ?1
                 ORDER BY timestamp DESC, COALESCE(block_number, 0) DESC, fingerprint ASC",
                SUMMARY_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![owner.0.as_slice()], row_to_summary)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn summary_count(&self) -> Result<u64> {
        self.run(|conn| {
            let n: i64 =
                conn.query_row("SELECT COUNT(*) FROM mirror_proofs", [], |row| row.get(0))?;
            Ok(n as u64)
        })
        .await
    }

    async fn get_cursor(&self, name: &str) -> Result<u64> {
        let name = name.to_string();
        self.run(move |conn| {
            let n: Option<i64> = conn
                .query_row(
                    "SELECT sequence FROM cursors WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(n.map(|n| n as u64).unwrap_or(0))
        })
        .await
    }

    async fn set_cursor(&self, name: &str, sequence: u64) -> Result<()> {
        let name = name.to_string();
        let sequence = to_sql_u64(sequence)?;
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO cursors (name, sequence, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET
                    sequence = excluded.sequence,
                    updated_at = excluded.updated_at",
                params![name, sequence, Utc::now().timestamp_millis()],
            )?;
            Ok(())
        })
        .await
    }
}
