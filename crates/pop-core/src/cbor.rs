//! Canonical CBOR encoding for deterministic serialization.
//!
//! Implements RFC 8949 Core Deterministic Encoding for the subset of CBOR
//! that ledger transactions use:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats, no tags
//!
//! Transaction hashes and signatures are computed over these bytes, so the
//! same transaction must encode identically on every platform.

use ciborium::value::{Integer, Value};

use crate::error::CoreError;

/// Encode a CBOR value to canonical bytes.
pub fn encode_canonical(value: &Value) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value)?;
    Ok(buf)
}

/// Decode bytes that must already be in canonical form.
///
/// Re-encodes the parsed value and rejects the input if the bytes differ, so
/// every accepted byte string has exactly one meaning and one hash.
pub fn decode_canonical(bytes: &[u8]) -> Result<Value, CoreError> {
    let value: Value = ciborium::from_reader(bytes)
        .map_err(|e| CoreError::DecodingError(e.to_string()))?;

    let reencoded = encode_canonical(&value)?;
    if reencoded != bytes {
        return Err(CoreError::DecodingError("non-canonical CBOR encoding".into()));
    }
    Ok(value)
}

/// Look up a map entry by integer key.
pub fn map_get(entries: &[(Value, Value)], key: u64) -> Option<&Value> {
    entries
        .iter()
        .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == i128::from(key)))
        .map(|(_, v)| v)
}

/// Read an unsigned integer value.
pub fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Integer(i) => u64::try_from(i128::from(*i)).ok(),
        _ => None,
    }
}

/// Read a fixed-width byte string.
pub fn as_fixed_bytes<const N: usize>(value: &Value) -> Option<[u8; N]> {
    match value {
        Value::Bytes(b) => b.as_slice().try_into().ok(),
        _ => None,
    }
}

/// Integer map key.
pub fn key(k: u64) -> Value {
    Value::Integer(k.into())
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<(), CoreError> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item)?;
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries)?,
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(_) => {
            return Err(CoreError::EncodingError(
                "floats not supported in canonical encoding".into(),
            ))
        }
        _ => {
            return Err(CoreError::EncodingError("unsupported CBOR value type".into()));
        }
    }
    Ok(())
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison. Duplicate keys are an
/// error.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<(), CoreError> {
    let mut pairs: Vec<(Vec<u8>, &Value)> = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        pairs.push((key_buf, v));
    }

    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    if pairs.windows(2).any(|w| w[0].0 == w[1].0) {
        return Err(CoreError::EncodingError("duplicate map key".into()));
    }

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_encoding() {
        let mut buf = Vec::new();

        // 0-23: single byte
        encode_uint(&mut buf, 0, 0);
        assert_eq!(buf, vec![0x00]);

        buf.clear();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        // 24-255: two bytes
        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        // 256-65535: three bytes
        buf.clear();
        encode_uint(&mut buf, 0, 256);
        assert_eq!(buf, vec![0x19, 0x01, 0x00]);

        // Sepolia chain id needs four bytes of payload.
        buf.clear();
        encode_uint(&mut buf, 0, 11_155_111);
        assert_eq!(buf, vec![0x1a, 0x00, 0xaa, 0x36, 0xa7]);
    }

    #[test]
    fn test_map_key_ordering() {
        let entries = vec![
            (key(8), Value::Integer(80.into())),
            (key(0), Value::Integer(0.into())),
            (key(5), Value::Integer(50.into())),
        ];
        let buf = encode_canonical(&Value::Map(entries)).unwrap();

        assert_eq!(buf[0], 0xa3);
        assert_eq!(&buf[1..], &[0x00, 0x00, 0x05, 0x18, 50, 0x08, 0x18, 80]);
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let entries = vec![(key(1), Value::Null), (key(1), Value::Bool(true))];
        assert!(encode_canonical(&Value::Map(entries)).is_err());
    }

    #[test]
    fn test_floats_rejected() {
        assert!(encode_canonical(&Value::Float(1.5)).is_err());
    }

    #[test]
    fn test_decode_rejects_non_canonical() {
        // 5 encoded with a needless one-byte length.
        assert!(decode_canonical(&[0x18, 0x05]).is_err());
        assert_eq!(as_u64(&decode_canonical(&[0x05]).unwrap()), Some(5));
    }

    #[test]
    fn test_decode_rejects_unsorted_map() {
        // {1: null, 0: null}
        assert!(decode_canonical(&[0xa2, 0x01, 0xf6, 0x00, 0xf6]).is_err());
        assert!(decode_canonical(&[0xa2, 0x00, 0xf6, 0x01, 0xf6]).is_ok());
    }

    #[test]
    fn test_accessors() {
        let entries = vec![
            (key(0), Value::Bytes(vec![7; 4])),
            (key(1), Value::Integer(42.into())),
        ];
        assert_eq!(as_fixed_bytes::<4>(map_get(&entries, 0).unwrap()), Some([7; 4]));
        assert_eq!(as_fixed_bytes::<5>(map_get(&entries, 0).unwrap()), None);
        assert_eq!(as_u64(map_get(&entries, 1).unwrap()), Some(42));
        assert!(map_get(&entries, 2).is_none());
    }
}
