//! Off-chain proof metadata.
//!
//! The document a registration's `metadata_pointer` refers to. It is
//! descriptive only: the ledger's [`ProofRecord`](crate::proof::ProofRecord)
//! is the authority on who registered what and when.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Address, ContentDigest};

/// Model name recorded when the user does not say which model they used.
pub const DEFAULT_MODEL: &str = "user-provided";

/// Model version recorded when the user does not give one.
pub const DEFAULT_MODEL_VERSION: &str = "unknown";

/// Descriptive metadata stored alongside a registration.
///
/// Serializes as a JSON object with snake_case keys. Optional fields are
/// omitted when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofMetadata {
    /// `0x`-prefixed fingerprint of the canonical content.
    pub fingerprint: ContentDigest,

    /// The prompt that produced the content.
    pub prompt: String,

    /// Inline content, for text submissions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Generation model identifier.
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,

    /// Identity that is registering the content.
    pub author_address: Address,

    /// Client-assigned creation time. Untrusted.
    pub timestamp: DateTime<Utc>,

    /// Content identifier of separately stored content, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_cid: Option<String>,

    /// MIME type of the submitted content.
    pub content_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ProofMetadata {
    /// Start a metadata document with defaults for everything optional.
    pub fn new(
        fingerprint: ContentDigest,
        prompt: impl Into<String>,
        author_address: Address,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            fingerprint,
            prompt: prompt.into(),
            content: None,
            model: DEFAULT_MODEL.to_string(),
            model_version: Some(DEFAULT_MODEL_VERSION.to_string()),
            author_address,
            // Millisecond precision, matching the ISO-8601 timestamps other
            // clients write.
            timestamp: Utc::now().trunc_subsecs(3),
            content_cid: None,
            content_type: content_type.into(),
            notes: None,
        }
    }

    /// Set the model, ignoring blank values.
    pub fn with_model(mut self, model: Option<&str>) -> Self {
        if let Some(model) = non_blank(model) {
            self.model = model.to_string();
        }
        self
    }

    /// Set the model version, ignoring blank values.
    pub fn with_model_version(mut self, version: Option<&str>) -> Self {
        if let Some(version) = non_blank(version) {
            self.model_version = Some(version.to_string());
        }
        self
    }

    /// Attach free-form notes, ignoring blank values.
    pub fn with_notes(mut self, notes: Option<&str>) -> Self {
        self.notes = non_blank(notes).map(str::to_string);
        self
    }

    /// Attach inline content.
    pub fn with_content(mut self, content: Option<String>) -> Self {
        self.content = content.filter(|c| !c.is_empty());
        self
    }

    /// Override the client timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> ProofMetadata {
        ProofMetadata::new(
            ContentDigest::from_bytes([0xab; 32]),
            "write a haiku",
            Address::from_bytes([0x11; 20]),
            "text/plain",
        )
        .with_timestamp(Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_defaults() {
        let meta = sample();
        assert_eq!(meta.model, DEFAULT_MODEL);
        assert_eq!(meta.model_version.as_deref(), Some(DEFAULT_MODEL_VERSION));
        assert!(meta.notes.is_none());
        assert!(meta.content.is_none());
    }

    #[test]
    fn test_blank_overrides_are_ignored() {
        let meta = sample()
            .with_model(Some("  "))
            .with_model_version(None)
            .with_notes(Some(""));
        assert_eq!(meta.model, DEFAULT_MODEL);
        assert_eq!(meta.model_version.as_deref(), Some(DEFAULT_MODEL_VERSION));
        assert!(meta.notes.is_none());

        let meta = meta.with_model(Some("gpt-4o")).with_notes(Some("draft 2"));
        assert_eq!(meta.model, "gpt-4o");
        assert_eq!(meta.notes.as_deref(), Some("draft 2"));
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(sample().with_content(Some("an old pond".into()))).unwrap();
        assert_eq!(json["fingerprint"], format!("0x{}", "ab".repeat(32)));
        assert_eq!(json["author_address"], format!("0x{}", "11".repeat(20)));
        assert_eq!(json["timestamp"], "2025-01-15T12:00:00Z");
        assert_eq!(json["content"], "an old pond");
        assert!(json.get("notes").is_none());
        assert!(json.get("content_cid").is_none());
    }

    #[test]
    fn test_json_roundtrip() {
        let meta = sample().with_notes(Some("n"));
        let bytes = serde_json::to_vec(&meta).unwrap();
        let back: ProofMetadata = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, meta);
    }
}
