//! # Proof-of-Prompt Indexer
//!
//! Keeps the off-chain mirror in step with the registry.
//!
//! The ledger's event log is the source of truth. The [`Indexer`] reads it
//! in sequence order and upserts one row per registration into a
//! [`MirrorStore`](pop_store::MirrorStore), optionally enriching rows with
//! metadata documents. Because upserts are idempotent and the cursor is
//! persisted in the mirror, a crashed indexer simply resumes, and a
//! dropped mirror can be rebuilt by replaying from sequence zero.
//!
//! ## Convergence
//!
//! [`verify_mirror`] checks that every event is reflected in the mirror
//! with matching ledger fields, and [`registry_state_hash`] summarizes the
//! event log as a single Blake3 hash.

pub mod convergence;
pub mod error;
pub mod indexer;

pub use convergence::{read_event_log, registry_state_hash, verify_mirror, ConvergenceResult};
pub use error::{IndexerError, Result};
pub use indexer::{IndexReport, Indexer, IndexerConfig, MetadataSource};
