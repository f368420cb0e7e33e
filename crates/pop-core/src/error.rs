//! Error types for Proof-of-Prompt core.

use thiserror::Error;

/// Errors raised while turning raw input into canonical bytes.
///
/// Both variants are unrecoverable for the submission at hand: the input has
/// to be fixed and the whole sequence restarted.
#[derive(Debug, Error)]
pub enum CanonicalizeError {
    /// The bytes are not a valid payload of the declared content type.
    #[error("decode error: {0}")]
    Decode(String),

    /// The source bytes could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Core errors for encoding, parsing and signatures.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),
}
