//! # Proof-of-Prompt Core
//!
//! Pure primitives for Proof-of-Prompt: canonicalization, fingerprints, proof
//! records and ledger transactions.
//!
//! This crate contains no storage and no networking. It is pure computation
//! over content and cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`ContentDigest`] - Keccak-256 fingerprint of canonical content, the registry key
//! - [`Address`] - 20-byte ledger identity derived from a signer key
//! - [`ProofRecord`] - Registry entry: owner, timestamp, metadata pointer
//! - [`ProofRegistered`] - Event emitted once per successful registration
//! - [`ProofMetadata`] - Off-chain descriptive document
//! - [`SignedTransaction`] - A signed registry call
//!
//! ## Canonicalization
//!
//! Text and images are reduced to canonical bytes before hashing. See the
//! [`canonical`] module for the exact rules.

pub mod canonical;
pub mod cbor;
pub mod content;
pub mod crypto;
pub mod error;
pub mod fingerprint;
pub mod metadata;
pub mod proof;
pub mod tx;
pub mod types;

pub use canonical::{canonicalize, canonicalize_image, canonicalize_text, CanonicalContent};
pub use content::{ContentInput, ContentKind, TEXT_CONTENT_TYPE};
pub use crypto::{keccak256, Ed25519PublicKey, Ed25519Signature, Keypair};
pub use error::{CanonicalizeError, CoreError};
pub use fingerprint::{fingerprint, fingerprint_content, fingerprint_text};
pub use metadata::{ProofMetadata, DEFAULT_MODEL, DEFAULT_MODEL_VERSION};
pub use proof::{LoggedEvent, ProofRecord, ProofRegistered};
pub use tx::{
    RegistryCall, SignedTransaction, Transaction, TransactionReceipt, TxStatus,
    ALREADY_REGISTERED_REASON,
};
pub use types::{Address, ChainId, ContentDigest, TxHash};
