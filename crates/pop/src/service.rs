//! Register, verify and list flows.
//!
//! [`ProofService`] composes the registry client, the metadata store and the
//! mirror. [`RegisterRequest::generated`] fills a request from a
//! [`ContentGenerator`]. The ledger is authoritative for ownership; the mirror and metadata
//! store only add description, and their failures never change whether a
//! registration happened.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use pop_core::{
    canonicalize, fingerprint, Address, CanonicalizeError, ContentDigest, ContentInput,
    ProofMetadata, ProofRecord, TransactionReceipt,
};
use pop_store::{MirrorStore, ProofSummary};

use crate::client::RegistryClient;
use crate::error::{ClientError, Result};
use crate::generator::ContentGenerator;
use crate::metadata::MetadataStore;

/// What the caller supplies to register content.
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub content: ContentInput,
    /// Required and must not be blank.
    pub prompt: String,
    pub model: Option<String>,
    pub model_version: Option<String>,
    pub notes: Option<String>,
}

impl RegisterRequest {
    pub fn new(content: ContentInput, prompt: impl Into<String>) -> Self {
        Self {
            content,
            prompt: prompt.into(),
            model: None,
            model_version: None,
            notes: None,
        }
    }

    /// A request for text that `generator` writes from `prompt`, recording
    /// the model and version that answered.
    pub async fn generated(generator: &dyn ContentGenerator, prompt: impl Into<String>) -> Result<Self> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(ClientError::InvalidRequest("a prompt is required".into()));
        }

        let generated = generator.generate(&prompt).await?;
        Ok(Self::new(ContentInput::text(generated.content), prompt)
            .model(generated.model)
            .model_version(generated.model_version))
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = Some(version.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// A completed registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub fingerprint: ContentDigest,
    pub metadata_pointer: String,
    pub metadata: ProofMetadata,
    pub receipt: TransactionReceipt,
}

/// Outcome of verifying a piece of content.
#[derive(Debug, Clone)]
pub struct Verification {
    pub fingerprint: ContentDigest,
    /// The registry record, if the content is registered.
    pub record: Option<ProofRecord>,
    pub summary: Option<ProofSummary>,
    pub metadata: Option<ProofMetadata>,
}

impl Verification {
    pub fn is_registered(&self) -> bool {
        self.record.is_some()
    }

    /// Exportable certificate, stamped with `verified_at`.
    pub fn certificate(&self, verified_at: DateTime<Utc>) -> VerificationCertificate {
        let record = self.record.as_ref();
        let metadata = self.metadata.as_ref();
        let summary = self.summary.as_ref();

        VerificationCertificate {
            verified: self.is_registered(),
            fingerprint: self.fingerprint,
            owner: record.map(|r| r.owner),
            timestamp: record.and_then(|r| Utc.timestamp_opt(r.timestamp as i64, 0).single()),
            metadata_cid: record.map(|r| r.metadata_pointer.clone()),
            prompt: metadata
                .map(|m| m.prompt.clone())
                .or_else(|| summary.and_then(|s| s.prompt.clone())),
            model: metadata
                .map(|m| m.model.clone())
                .or_else(|| summary.and_then(|s| s.model.clone())),
            notes: metadata
                .and_then(|m| m.notes.clone())
                .or_else(|| summary.and_then(|s| s.notes.clone())),
            verified_at,
        }
    }
}

/// JSON certificate of a verification result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationCertificate {
    pub verified: bool,
    pub fingerprint: ContentDigest,
    pub owner: Option<Address>,
    /// Ledger registration time.
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "metadataCID")]
    pub metadata_cid: Option<String>,
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub notes: Option<String>,
    #[serde(rename = "verifiedAt")]
    pub verified_at: DateTime<Utc>,
}

impl VerificationCertificate {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ClientError::Metadata(e.to_string()))
    }

    /// Suggested file name, keyed by the fingerprint prefix.
    pub fn file_name(&self) -> String {
        let hex = self.fingerprint.to_hex();
        format!("proof-certificate-{}.json", &hex[..10])
    }
}

/// The client-side proof workflows.
pub struct ProofService {
    client: RegistryClient,
    metadata: Arc<dyn MetadataStore>,
    mirror: Arc<dyn MirrorStore>,
}

impl ProofService {
    pub fn new(
        client: RegistryClient,
        metadata: Arc<dyn MetadataStore>,
        mirror: Arc<dyn MirrorStore>,
    ) -> Self {
        Self {
            client,
            metadata,
            mirror,
        }
    }

    pub fn client(&self) -> &RegistryClient {
        &self.client
    }

    /// Consume the service and disconnect its client.
    pub fn disconnect(self) {
        self.client.disconnect();
    }

    /// Digest of `content` without touching the ledger.
    pub fn fingerprint(content: &ContentInput) -> std::result::Result<ContentDigest, CanonicalizeError> {
        let canonical = canonicalize(content)?;
        debug!(kind = %canonical.kind(), size = canonical.bytes().len(), "canonicalized content");
        Ok(fingerprint(canonical.bytes()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Register
    // ─────────────────────────────────────────────────────────────────────────

    /// Register content as the connected account.
    ///
    /// Order: network check, fingerprint, registry lookup, metadata upload,
    /// submit, mirror write. Content that is already registered fails
    /// before anything is uploaded.
    pub async fn register(&self, request: RegisterRequest) -> Result<Registration> {
        if request.prompt.trim().is_empty() {
            return Err(ClientError::InvalidRequest("a prompt is required".into()));
        }

        self.client.ensure_network().await?;

        let digest = Self::fingerprint(&request.content)?;

        if let Some(existing) = self.client.lookup(&digest).await? {
            return Err(ClientError::AlreadyRegistered {
                digest,
                owner: existing.owner,
                timestamp: existing.timestamp,
            });
        }

        let metadata = ProofMetadata::new(
            digest,
            request.prompt.clone(),
            self.client.address(),
            request.content.content_type(),
        )
        .with_content(request.content.as_text().map(str::to_string))
        .with_model(request.model.as_deref())
        .with_model_version(request.model_version.as_deref())
        .with_notes(request.notes.as_deref());

        let pointer = self.metadata.put(&metadata).await?;
        debug!(digest = %digest, pointer = %pointer, "metadata stored");

        let receipt = self.client.register_proof(digest, &pointer).await?;

        if let Some(summary) = ProofSummary::from_receipt(&receipt) {
            let summary = summary.with_metadata(&metadata);
            if let Err(err) = self.mirror.upsert_summary(&summary).await {
                warn!(digest = %digest, error = %err, "mirror write failed after registration");
            }
        }

        info!(digest = %digest, owner = %receipt.from, "registration complete");
        Ok(Registration {
            fingerprint: digest,
            metadata_pointer: pointer,
            metadata,
            receipt,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Verify
    // ─────────────────────────────────────────────────────────────────────────

    /// Look up who registered `content`, if anyone.
    pub async fn verify(&self, content: &ContentInput) -> Result<Verification> {
        let digest = Self::fingerprint(content)?;
        self.verify_digest(digest).await
    }

    /// Verify by digest.
    pub async fn verify_digest(&self, digest: ContentDigest) -> Result<Verification> {
        let record = match self.client.lookup(&digest).await? {
            Some(record) => record,
            None => {
                return Ok(Verification {
                    fingerprint: digest,
                    record: None,
                    summary: None,
                    metadata: None,
                })
            }
        };

        let summary = match self.mirror.find_by_fingerprint(&digest).await {
            Ok(summary) => summary,
            Err(err) => {
                warn!(digest = %digest, error = %err, "mirror lookup failed");
                None
            }
        };

        let metadata = match self.metadata.get(&record.metadata_pointer).await {
            Ok(document) => Some(document),
            Err(err) => {
                warn!(pointer = %record.metadata_pointer, error = %err, "metadata fetch failed");
                None
            }
        };

        Ok(Verification {
            fingerprint: digest,
            record: Some(record),
            summary,
            metadata,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Listings
    // ─────────────────────────────────────────────────────────────────────────

    /// Proofs owned by the connected account, newest first.
    pub async fn my_proofs(&self) -> Result<Vec<ProofSummary>> {
        self.proofs_of(&self.client.address()).await
    }

    /// Proofs owned by `owner`, newest first.
    pub async fn proofs_of(&self, owner: &Address) -> Result<Vec<ProofSummary>> {
        Ok(self.mirror.list_by_owner(owner).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::FixedGenerator;
    use crate::metadata::MemoryMetadataStore;
    use crate::wallet::LocalWallet;
    use pop_core::{ChainId, Keypair, DEFAULT_MODEL, DEFAULT_MODEL_VERSION};
    use pop_ledger::{DevChain, DevChainConfig, ManualClock};
    use pop_store::MemoryStore;

    struct Setup {
        ledger: Arc<DevChain<MemoryStore>>,
        metadata: Arc<MemoryMetadataStore>,
        mirror: Arc<MemoryStore>,
    }

    impl Setup {
        async fn new() -> Self {
            let ledger = Arc::new(
                DevChain::open(
                    MemoryStore::new(),
                    Arc::new(ManualClock::new(1_700_000_000)),
                    DevChainConfig::default(),
                )
                .await
                .unwrap(),
            );
            Self {
                ledger,
                metadata: Arc::new(MemoryMetadataStore::new()),
                mirror: Arc::new(MemoryStore::new()),
            }
        }

        async fn service(&self, seed: u8) -> ProofService {
            let wallet = Arc::new(LocalWallet::new(Keypair::from_seed(&[seed; 32]), self.ledger.clone()));
            let client = RegistryClient::connect(wallet, self.ledger.clone(), ChainId::SEPOLIA)
                .await
                .unwrap();
            ProofService::new(client, self.metadata.clone(), self.mirror.clone())
        }
    }

    #[tokio::test]
    async fn test_register_requires_prompt() {
        let setup = Setup::new().await;
        let service = setup.service(1).await;

        let err = service
            .register(RegisterRequest::new(ContentInput::text("hello"), "   "))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
        assert!(setup.metadata.is_empty());
    }

    #[tokio::test]
    async fn test_register_builds_metadata_with_defaults() {
        let setup = Setup::new().await;
        let service = setup.service(1).await;

        let registration = service
            .register(RegisterRequest::new(ContentInput::text("Hello  \n"), "say hi").notes("  "))
            .await
            .unwrap();

        let doc = &registration.metadata;
        assert_eq!(doc.model, DEFAULT_MODEL);
        assert_eq!(doc.model_version.as_deref(), Some(DEFAULT_MODEL_VERSION));
        assert_eq!(doc.author_address, service.client().address());
        assert_eq!(doc.content.as_deref(), Some("Hello  \n"));
        assert_eq!(doc.content_type, "text/plain");
        assert!(doc.notes.is_none());

        let stored = setup.metadata.get(&registration.metadata_pointer).await.unwrap();
        assert_eq!(&stored, doc);

        let rows = service.my_proofs().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].prompt.as_deref(), Some("say hi"));
        assert_eq!(rows[0].tx_hash, Some(registration.receipt.tx_hash));
    }

    #[tokio::test]
    async fn test_register_generated_content() {
        let setup = Setup::new().await;
        let service = setup.service(1).await;
        let generator = FixedGenerator::new("A haiku about locks.\n", "gemini-2.0-flash-exp", "2.0");

        let request = RegisterRequest::generated(&generator, "write a haiku").await.unwrap();
        assert_eq!(request.content.as_text(), Some("A haiku about locks.\n"));
        let registration = service.register(request).await.unwrap();

        let doc = &registration.metadata;
        assert_eq!(doc.model, "gemini-2.0-flash-exp");
        assert_eq!(doc.model_version.as_deref(), Some("2.0"));
        assert_eq!(doc.prompt, "write a haiku");
        assert_eq!(
            registration.fingerprint,
            ProofService::fingerprint(&ContentInput::text("A haiku about locks.")).unwrap()
        );
        assert_eq!(generator.prompts(), vec!["write a haiku"]);
    }

    #[tokio::test]
    async fn test_generated_requires_prompt() {
        let generator = FixedGenerator::new("unused", "m", "v");
        let err = RegisterRequest::generated(&generator, "  \n").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_fails_before_upload() {
        let setup = Setup::new().await;
        let alice = setup.service(1).await;
        let bob = setup.service(2).await;

        alice
            .register(RegisterRequest::new(ContentInput::text("same"), "p"))
            .await
            .unwrap();
        assert_eq!(setup.metadata.len(), 1);

        let err = bob
            .register(RegisterRequest::new(ContentInput::text("same\n\n"), "other prompt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::AlreadyRegistered { owner, .. } if owner == alice.client().address()));
        assert_eq!(setup.metadata.len(), 1);
        assert!(bob.my_proofs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_verify_unregistered() {
        let setup = Setup::new().await;
        let service = setup.service(1).await;

        let verification = service.verify(&ContentInput::text("nobody")).await.unwrap();
        assert!(!verification.is_registered());

        let certificate = verification.certificate(Utc::now());
        assert!(!certificate.verified);
        assert!(certificate.owner.is_none());
    }

    #[tokio::test]
    async fn test_verify_survives_missing_metadata() {
        let setup = Setup::new().await;
        let service = setup.service(1).await;

        // Registered directly, with a pointer the store has never seen.
        let digest = ProofService::fingerprint(&ContentInput::text("orphan")).unwrap();
        service.client().register_proof(digest, "mem-dangling").await.unwrap();

        let verification = service.verify(&ContentInput::text("orphan")).await.unwrap();
        assert!(verification.is_registered());
        assert!(verification.metadata.is_none());
        assert_eq!(verification.record.unwrap().metadata_pointer, "mem-dangling");
    }

    #[tokio::test]
    async fn test_certificate_json_shape() {
        let setup = Setup::new().await;
        let service = setup.service(1).await;
        service
            .register(RegisterRequest::new(ContentInput::text("certified"), "prompt").model("gpt-4"))
            .await
            .unwrap();

        let verification = service.verify(&ContentInput::text("certified")).await.unwrap();
        let verified_at = Utc.timestamp_opt(1_700_000_500, 0).unwrap();
        let certificate = verification.certificate(verified_at);

        let json: serde_json::Value = serde_json::from_str(&certificate.to_json().unwrap()).unwrap();
        assert_eq!(json["verified"], true);
        assert_eq!(json["model"], "gpt-4");
        assert_eq!(json["prompt"], "prompt");
        assert_eq!(json["fingerprint"], verification.fingerprint.to_hex());
        assert!(json["metadataCID"].as_str().unwrap().starts_with("mem-"));
        assert_eq!(json["verifiedAt"], "2023-11-14T22:21:40Z");
        assert_eq!(json["timestamp"], "2023-11-14T22:13:20Z");

        assert!(certificate.file_name().starts_with("proof-certificate-0x"));
    }
}
