//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, chrono::Utc::now().timestamp_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        2 => apply_v2(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: registry state, event log and transaction log.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Registry records. One row per registered digest; each row is also
        -- the event announcing it.
        CREATE TABLE proofs (
            digest BLOB PRIMARY KEY,          -- 32 bytes, Keccak-256 of canonical content
            owner BLOB NOT NULL,              -- 20 bytes
            timestamp INTEGER NOT NULL,       -- block time, Unix seconds, > 0
            metadata_pointer TEXT NOT NULL,
            sequence INTEGER NOT NULL UNIQUE, -- event log position, from 1
            block_number INTEGER NOT NULL,
            tx_hash BLOB NOT NULL             -- 32 bytes
        );

        -- Executed transactions, successful or reverted.
        CREATE TABLE transactions (
            tx_hash BLOB PRIMARY KEY,
            sender BLOB NOT NULL,             -- 20 bytes
            nonce INTEGER NOT NULL,
            block_number INTEGER NOT NULL UNIQUE,
            block_timestamp INTEGER NOT NULL,
            revert_reason TEXT,               -- NULL on success

            UNIQUE(sender, nonce)
        );

        CREATE INDEX idx_proofs_tx_hash ON proofs(tx_hash);
        CREATE INDEX idx_proofs_owner ON proofs(owner);
        "#,
    )?;

    Ok(())
}

/// Migration v2: off-chain mirror and consumer cursors.
fn apply_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE mirror_proofs (
            fingerprint BLOB PRIMARY KEY,
            owner BLOB NOT NULL,
            timestamp INTEGER NOT NULL,
            metadata_pointer TEXT NOT NULL,
            tx_hash BLOB,
            block_number INTEGER,
            prompt TEXT,
            model TEXT,
            model_version TEXT,
            content_type TEXT,
            notes TEXT,
            created_at TEXT,                  -- RFC 3339, client-assigned
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE cursors (
            name TEXT PRIMARY KEY,
            sequence INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX idx_mirror_owner_time ON mirror_proofs(owner, timestamp DESC);
        "#,
    )?;

    Ok(())
}
