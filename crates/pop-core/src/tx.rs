//! Ledger transactions and receipts.
//!
//! A [`Transaction`] is a registry call bound to a chain and a sender nonce.
//! It is encoded to canonical CBOR, signed with Ed25519 over a
//! domain-separated message, and identified by a Keccak-256 [`TxHash`].
//!
//! Wire format (canonical CBOR map, integer keys):
//!
//! | key | field            | type  |
//! |-----|------------------|-------|
//! | 0   | chain_id         | uint  |
//! | 1   | nonce            | uint  |
//! | 2   | call selector    | uint  |
//! | 3   | digest           | bytes(32) |
//! | 4   | metadata_pointer | text  |

use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use crate::cbor::{as_fixed_bytes, as_u64, decode_canonical, encode_canonical, key, map_get};
use crate::crypto::{keccak256, Ed25519PublicKey, Ed25519Signature, Keypair};
use crate::error::CoreError;
use crate::proof::ProofRegistered;
use crate::types::{Address, ChainId, ContentDigest, TxHash};

/// Domain separator for transaction signatures.
pub const TX_SIGNATURE_DOMAIN: &[u8] = b"pop/tx-sig/v1";

/// Domain separator for transaction hashes.
pub const TX_HASH_DOMAIN: &[u8] = b"pop/tx-id/v1";

/// Revert reason for a digest that already has an owner.
pub const ALREADY_REGISTERED_REASON: &str = "Already registered";

mod keys {
    pub const CHAIN_ID: u64 = 0;
    pub const NONCE: u64 = 1;
    pub const SELECTOR: u64 = 2;
    pub const DIGEST: u64 = 3;
    pub const METADATA_POINTER: u64 = 4;

    pub const SIGNED_TX: u64 = 0;
    pub const SIGNER: u64 = 1;
    pub const SIGNATURE: u64 = 2;
}

const SELECTOR_REGISTER: u64 = 1;

/// A call into the proof registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryCall {
    /// Claim `digest` for the sender, pointing at `metadata_pointer`.
    Register {
        digest: ContentDigest,
        metadata_pointer: String,
    },
}

impl RegistryCall {
    /// The digest this call touches.
    pub fn digest(&self) -> ContentDigest {
        match self {
            RegistryCall::Register { digest, .. } => *digest,
        }
    }
}

/// An unsigned transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub chain_id: ChainId,
    pub nonce: u64,
    pub call: RegistryCall,
}

impl Transaction {
    /// Canonical CBOR bytes of this transaction.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CoreError> {
        encode_canonical(&self.to_cbor_value())
    }

    /// The message a sender signs.
    pub fn signing_message(&self) -> Result<Vec<u8>, CoreError> {
        let mut msg = TX_SIGNATURE_DOMAIN.to_vec();
        msg.extend_from_slice(&self.canonical_bytes()?);
        Ok(msg)
    }

    /// Sign this transaction.
    pub fn sign(self, keypair: &Keypair) -> Result<SignedTransaction, CoreError> {
        let signature = keypair.sign(&self.signing_message()?);
        Ok(SignedTransaction {
            transaction: self,
            signer: keypair.public_key(),
            signature,
        })
    }

    /// Decode canonical transaction bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        Self::from_cbor_value(&decode_canonical(bytes)?)
    }

    fn to_cbor_value(&self) -> Value {
        let mut entries = vec![
            (key(keys::CHAIN_ID), Value::Integer(self.chain_id.0.into())),
            (key(keys::NONCE), Value::Integer(self.nonce.into())),
        ];

        match &self.call {
            RegistryCall::Register {
                digest,
                metadata_pointer,
            } => {
                entries.push((key(keys::SELECTOR), Value::Integer(SELECTOR_REGISTER.into())));
                entries.push((key(keys::DIGEST), Value::Bytes(digest.0.to_vec())));
                entries.push((
                    key(keys::METADATA_POINTER),
                    Value::Text(metadata_pointer.clone()),
                ));
            }
        }

        Value::Map(entries)
    }

    fn from_cbor_value(value: &Value) -> Result<Self, CoreError> {
        let map = match value {
            Value::Map(m) => m,
            _ => return Err(CoreError::MalformedTransaction("expected map".into())),
        };

        let chain_id = map_get(map, keys::CHAIN_ID)
            .and_then(as_u64)
            .ok_or_else(|| CoreError::MalformedTransaction("missing chain_id".into()))?;

        let nonce = map_get(map, keys::NONCE)
            .and_then(as_u64)
            .ok_or_else(|| CoreError::MalformedTransaction("missing nonce".into()))?;

        let selector = map_get(map, keys::SELECTOR)
            .and_then(as_u64)
            .ok_or_else(|| CoreError::MalformedTransaction("missing call selector".into()))?;

        let call = match selector {
            SELECTOR_REGISTER => {
                let digest = map_get(map, keys::DIGEST)
                    .and_then(as_fixed_bytes::<32>)
                    .map(ContentDigest)
                    .ok_or_else(|| CoreError::MalformedTransaction("invalid digest".into()))?;

                let metadata_pointer = match map_get(map, keys::METADATA_POINTER) {
                    Some(Value::Text(s)) => s.clone(),
                    _ => {
                        return Err(CoreError::MalformedTransaction(
                            "invalid metadata_pointer".into(),
                        ))
                    }
                };

                if map.len() != 5 {
                    return Err(CoreError::MalformedTransaction("unexpected fields".into()));
                }

                RegistryCall::Register {
                    digest,
                    metadata_pointer,
                }
            }
            other => {
                return Err(CoreError::MalformedTransaction(format!(
                    "unknown call selector: {}",
                    other
                )))
            }
        };

        Ok(Self {
            chain_id: ChainId(chain_id),
            nonce,
            call,
        })
    }
}

/// A transaction with its sender's signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signer: Ed25519PublicKey,
    pub signature: Ed25519Signature,
}

impl SignedTransaction {
    /// The sender's address.
    pub fn from(&self) -> Address {
        self.signer.address()
    }

    /// Check the signature against the signer key.
    pub fn verify(&self) -> Result<(), CoreError> {
        self.signer
            .verify(&self.transaction.signing_message()?, &self.signature)
    }

    /// The transaction hash: Keccak-256 over domain, body and signature.
    pub fn hash(&self) -> Result<TxHash, CoreError> {
        let body = self.transaction.canonical_bytes()?;
        Ok(TxHash(keccak256(&[
            TX_HASH_DOMAIN,
            &body,
            self.signature.as_bytes(),
        ])))
    }

    /// Canonical bytes of the signed envelope.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CoreError> {
        encode_canonical(&Value::Map(vec![
            (key(keys::SIGNED_TX), self.transaction.to_cbor_value()),
            (key(keys::SIGNER), Value::Bytes(self.signer.0.to_vec())),
            (key(keys::SIGNATURE), Value::Bytes(self.signature.0.to_vec())),
        ]))
    }

    /// Decode a signed envelope. The signature is not checked.
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let value = decode_canonical(bytes)?;
        let map = match &value {
            Value::Map(m) if m.len() == 3 => m,
            _ => return Err(CoreError::MalformedTransaction("expected 3-entry map".into())),
        };

        let transaction = map_get(map, keys::SIGNED_TX)
            .ok_or_else(|| CoreError::MalformedTransaction("missing transaction".into()))
            .and_then(Transaction::from_cbor_value)?;

        let signer = map_get(map, keys::SIGNER)
            .and_then(as_fixed_bytes::<32>)
            .map(Ed25519PublicKey)
            .ok_or_else(|| CoreError::MalformedTransaction("invalid signer".into()))?;

        let signature = map_get(map, keys::SIGNATURE)
            .and_then(as_fixed_bytes::<64>)
            .map(Ed25519Signature)
            .ok_or_else(|| CoreError::MalformedTransaction("invalid signature".into()))?;

        Ok(Self {
            transaction,
            signer,
            signature,
        })
    }
}

/// Outcome of executing a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TxStatus {
    Success,
    Reverted { reason: String },
}

impl TxStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TxStatus::Success)
    }
}

/// Result of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// Block time in Unix seconds.
    pub block_timestamp: u64,
    pub from: Address,
    pub status: TxStatus,
    /// Events emitted; empty unless `status` is `Success`.
    pub events: Vec<ProofRegistered>,
}

impl TransactionReceipt {
    /// The revert reason, if the transaction reverted.
    pub fn revert_reason(&self) -> Option<&str> {
        match &self.status {
            TxStatus::Reverted { reason } => Some(reason),
            TxStatus::Success => None,
        }
    }
}
