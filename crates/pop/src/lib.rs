//! # Proof-of-Prompt
//!
//! Register AI-generated content against its prompt on a shared ledger, and
//! verify who registered a piece of content first.
//!
//! ## Overview
//!
//! - **Fingerprinting**: content is canonicalized, then hashed with
//!   Keccak-256. Incidental differences (line endings, trailing spaces,
//!   image container format) do not change the fingerprint.
//! - **Registry**: the first account to register a fingerprint owns it for
//!   good. Later attempts fail with [`ClientError::AlreadyRegistered`].
//! - **Metadata**: the prompt, model and notes live in a [`MetadataStore`];
//!   the ledger records only a pointer to them.
//! - **Generation**: content can be produced from the prompt by a
//!   [`ContentGenerator`], which also names the model that answered.
//! - **Mirror**: a queryable projection for owner listings, kept in step by
//!   the indexer.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pop::{ProofService, RegisterRequest, RegistryClient, LocalWallet, MemoryMetadataStore};
//! use pop::core::{ChainId, ContentInput, Keypair};
//! use pop::ledger::DevChain;
//! use pop::store::MemoryStore;
//!
//! async fn example() {
//!     let ledger = Arc::new(DevChain::with_store(MemoryStore::new()).await.unwrap());
//!     let wallet = Arc::new(LocalWallet::new(Keypair::generate(), ledger.clone()));
//!     let client = RegistryClient::connect(wallet, ledger, ChainId::SEPOLIA).await.unwrap();
//!
//!     let service = ProofService::new(
//!         client,
//!         Arc::new(MemoryMetadataStore::new()),
//!         Arc::new(MemoryStore::new()),
//!     );
//!
//!     let request = RegisterRequest::new(ContentInput::text("Hello, World!"), "say hello");
//!     let registration = service.register(request).await.unwrap();
//!     println!("registered {}", registration.fingerprint);
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `pop::core` - Canonicalization, fingerprints, transactions
//! - `pop::store` - Registry and mirror storage
//! - `pop::ledger` - Registry state machine and the local ledger
//! - `pop::indexer` - Mirror projection

pub mod client;
pub mod config;
pub mod error;
pub mod generator;
pub mod loader;
pub mod metadata;
pub mod service;
pub mod wallet;

#[cfg(test)]
mod test_http;

pub use pop_core as core;
pub use pop_indexer as indexer;
pub use pop_ledger as ledger;
pub use pop_store as store;

pub use client::RegistryClient;
pub use config::{ClientConfig, GeneratorConfig, MetadataStoreConfig};
pub use error::{ClientError, Result};
pub use generator::{
    build_content_generator, ContentGenerator, FixedGenerator, GeminiGenerator, GeneratedContent,
};
pub use loader::load_content;
pub use metadata::{
    build_metadata_store, IpfsMetadataStore, MemoryMetadataStore, MetadataLookup, MetadataStore,
};
pub use service::{
    ProofService, RegisterRequest, Registration, Verification, VerificationCertificate,
};
pub use wallet::{LocalWallet, SigningIdentity};

pub use pop_core::{Address, ChainId, ContentDigest, ContentInput, Keypair, ProofRecord};
