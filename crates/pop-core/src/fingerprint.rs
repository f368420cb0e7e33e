//! Content fingerprinting.
//!
//! A fingerprint is Keccak-256 over canonical content bytes. It is a pure
//! function: no keys, no clock, no network.

use crate::canonical::{canonicalize, canonicalize_text};
use crate::content::ContentInput;
use crate::crypto::keccak256;
use crate::error::CanonicalizeError;
use crate::types::ContentDigest;

/// Fingerprint already-canonical bytes.
pub fn fingerprint(canonical: &[u8]) -> ContentDigest {
    ContentDigest(keccak256(&[canonical]))
}

/// Canonicalize a text document and fingerprint it.
pub fn fingerprint_text(text: &str) -> ContentDigest {
    fingerprint(canonicalize_text(text).as_bytes())
}

/// Canonicalize any supported content and fingerprint it.
pub fn fingerprint_content(input: &ContentInput) -> Result<ContentDigest, CanonicalizeError> {
    let canonical = canonicalize(input)?;
    Ok(fingerprint(canonical.bytes()))
}
