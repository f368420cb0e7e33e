//! # Proof-of-Prompt Store
//!
//! Storage abstraction for Proof-of-Prompt. Provides trait-based interfaces
//! for registry persistence and for the off-chain mirror, with SQLite and
//! in-memory implementations.
//!
//! ## Key Types
//!
//! - [`ProofStore`] - Registry records, event log and transaction log
//! - [`MirrorStore`] - Queryable projection of registrations plus metadata
//! - [`SqliteStore`] - SQLite-based persistent storage (implements both)
//! - [`MemoryStore`] - In-memory storage for tests (implements both)
//! - [`InsertResult`] - Result of inserting a proof
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pop_store::{ProofStore, SqliteStore};
//! use pop_core::ContentDigest;
//!
//! async fn example() {
//!     let store = SqliteStore::open("ledger.db").unwrap();
//!     let record = store.get_proof(&ContentDigest::ZERO).await.unwrap();
//!     assert!(record.is_none());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **First writer wins**: inserting a digest that already has a record
//!   returns `AlreadyExists` with the original record
//! - **Append-only**: records and events are never updated or deleted
//! - **Rebuildable mirror**: the mirror can be dropped and replayed from
//!   `events_since(0, ..)`

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{
    ChainHead, InsertResult, MirrorStore, ProofStore, ProofSummary, TransactionRecord,
};
