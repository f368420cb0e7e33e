//! Golden test vectors for deterministic verification.
//!
//! Canonicalization and fingerprinting are frozen: every implementation must
//! reproduce these outputs byte for byte.

use pop_core::{canonicalize_text, fingerprint_text};

/// A golden text vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Raw input text.
    pub input: &'static str,
    /// Expected canonical text.
    pub canonical: &'static str,
    /// Expected fingerprint (hex), when pinned.
    pub fingerprint: Option<&'static str>,
}

/// Keccak-256 of the empty string.
pub const EMPTY_FINGERPRINT: &str =
    "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470";

/// Keccak-256 of `hello world`.
pub const HELLO_WORLD_FINGERPRINT: &str =
    "0x47173285a8d7341e5e972fc677286384f802f8ef42a5ec5f03bbfa254cb01fad";

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "empty document",
            input: "",
            canonical: "",
            fingerprint: Some(EMPTY_FINGERPRINT),
        },
        GoldenVector {
            name: "whitespace only",
            input: " \t\r\n\u{feff}\n ",
            canonical: "",
            fingerprint: Some(EMPTY_FINGERPRINT),
        },
        GoldenVector {
            name: "trailing blank lines",
            input: "hello world\r\n\n\n\n",
            canonical: "hello world",
            fingerprint: Some(HELLO_WORLD_FINGERPRINT),
        },
        GoldenVector {
            name: "trailing newline",
            input: "hello world\n",
            canonical: "hello world",
            fingerprint: Some(HELLO_WORLD_FINGERPRINT),
        },
        GoldenVector {
            name: "trailing spaces per line",
            input: "foo   \nbar",
            canonical: "foo\nbar",
            fingerprint: None,
        },
        GoldenVector {
            name: "blank line run collapses to one",
            input: "Hello, World!  \n\n\n\nBye.",
            canonical: "Hello, World!\n\nBye.",
            fingerprint: None,
        },
        GoldenVector {
            name: "classic mac line endings",
            input: "one\rtwo\r\rthree",
            canonical: "one\ntwo\n\nthree",
            fingerprint: None,
        },
        GoldenVector {
            name: "inner indentation survives",
            input: "\n\n  indented\n    deeper  \n",
            canonical: "indented\n    deeper",
            fingerprint: None,
        },
        GoldenVector {
            name: "interior spacing survives",
            input: "a  b\t c",
            canonical: "a  b\t c",
            fingerprint: None,
        },
    ]
}

/// Check every vector, returning the name of the first mismatch.
pub fn verify_all_vectors() -> Result<(), String> {
    for vector in all_vectors() {
        let canonical = canonicalize_text(vector.input);
        if canonical != vector.canonical {
            return Err(format!(
                "{}: canonical {:?}, expected {:?}",
                vector.name, canonical, vector.canonical
            ));
        }

        let digest = fingerprint_text(vector.input).to_hex();
        if let Some(expected) = vector.fingerprint {
            if digest != expected {
                return Err(format!("{}: fingerprint {}, expected {}", vector.name, digest, expected));
            }
        }
        if digest != fingerprint_text(vector.canonical).to_hex() {
            return Err(format!("{}: canonical text fingerprints differently", vector.name));
        }
    }
    Ok(())
}
