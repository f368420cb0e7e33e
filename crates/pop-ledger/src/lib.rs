//! # Proof-of-Prompt Ledger
//!
//! The on-ledger side of Proof-of-Prompt: the [`ProofRegistry`] state
//! machine, the [`Ledger`] interface clients submit to, and [`DevChain`], a
//! local single-lane ledger that hosts the registry.
//!
//! ## Guarantees
//!
//! - **First writer wins**: a digest is registered at most once. Later
//!   attempts revert with `"Already registered"` and leave the record intact.
//! - **Caller-bound ownership**: the owner is the address of the verified
//!   signer, never a value supplied in the call.
//! - **Serialized execution**: transactions run one at a time; block numbers
//!   increase by one and block timestamps never decrease and are never zero.
//! - **One event per registration**, delivered both through
//!   [`Ledger::events_since`] and the live [`Ledger::subscribe`] feed.

pub mod clock;
pub mod devchain;
pub mod error;
pub mod ledger;
pub mod registry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use devchain::{DevChain, DevChainConfig};
pub use error::{LedgerError, RegistryError, Result};
pub use ledger::Ledger;
pub use registry::{CallContext, ProofRegistry};
