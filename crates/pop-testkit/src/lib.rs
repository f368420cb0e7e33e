//! # Proof-of-Prompt Testkit
//!
//! Testing utilities for Proof-of-Prompt.
//!
//! ## Overview
//!
//! - **Golden vectors**: canonicalization and fingerprint cases with fixed
//!   expected outputs
//! - **Generators**: proptest strategies for content and registry inputs
//! - **Fixtures**: a ready-made local ledger with wallets and stores
//!
//! ## Golden Vectors
//!
//! ```rust
//! use pop_testkit::vectors::verify_all_vectors;
//!
//! verify_all_vectors().unwrap();
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use pop_testkit::generators::messy_text;
//!
//! proptest! {
//!     #[test]
//!     fn canonical_text_is_stable(text in messy_text()) {
//!         let once = pop_core::canonicalize_text(&text);
//!         prop_assert_eq!(pop_core::canonicalize_text(&once), once);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use pop_testkit::fixtures::TestFixture;
//!
//! async fn example() {
//!     let fixture = TestFixture::new().await;
//!     let alice = fixture.service(&fixture.alice).await;
//!     let bob = fixture.service(&fixture.bob).await;
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::TestFixture;
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
