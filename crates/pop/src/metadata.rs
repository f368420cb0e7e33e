//! Metadata stores.
//!
//! A store maps a [`ProofMetadata`] document to an opaque pointer and back,
//! with `get(put(doc)) == doc`. The registry records only the pointer.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info, warn};

use pop_core::ProofMetadata;
use pop_indexer::MetadataSource;

use crate::config::MetadataStoreConfig;
use crate::error::{ClientError, Result};

/// Content-addressed storage for metadata documents.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Store `document` and return its pointer.
    async fn put(&self, document: &ProofMetadata) -> Result<String>;

    /// Fetch the document behind `pointer`.
    async fn get(&self, pointer: &str) -> Result<ProofMetadata>;
}

/// Build the store selected by `config`.
pub fn build_metadata_store(config: &MetadataStoreConfig) -> Result<Arc<dyn MetadataStore>> {
    config.validate()?;
    match config {
        MetadataStoreConfig::Memory => Ok(Arc::new(MemoryMetadataStore::new())),
        MetadataStoreConfig::Ipfs {
            upload_url,
            gateway_url,
            token,
            timeout,
        } => {
            let token = token
                .clone()
                .ok_or_else(|| ClientError::Config("missing ipfs token".into()))?;
            Ok(Arc::new(IpfsMetadataStore::new(
                upload_url.clone(),
                gateway_url.clone(),
                token,
                *timeout,
            )?))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory store
// ─────────────────────────────────────────────────────────────────────────────

/// Process-local store. Pointers are `mem-` plus the Blake3 hash of the
/// serialized document, so equal documents share a pointer.
#[derive(Default)]
pub struct MemoryMetadataStore {
    documents: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.read().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn put(&self, document: &ProofMetadata) -> Result<String> {
        let bytes = serde_json::to_vec(document).map_err(|e| ClientError::Metadata(e.to_string()))?;
        let pointer = format!("mem-{}", blake3::hash(&bytes).to_hex());

        self.documents
            .write()
            .map_err(|_| ClientError::Metadata("metadata store lock poisoned".into()))?
            .insert(pointer.clone(), bytes);

        debug!(pointer = %pointer, "stored metadata in memory");
        Ok(pointer)
    }

    async fn get(&self, pointer: &str) -> Result<ProofMetadata> {
        let documents = self
            .documents
            .read()
            .map_err(|_| ClientError::Metadata("metadata store lock poisoned".into()))?;
        let bytes = documents
            .get(pointer)
            .ok_or_else(|| ClientError::Metadata(format!("unknown pointer: {}", pointer)))?;
        serde_json::from_slice(bytes).map_err(|e| ClientError::Metadata(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// IPFS store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct UploadResponse {
    cid: String,
}

/// Uploads documents to an IPFS pinning service and reads them back through
/// a public gateway. Pointers are CIDs.
pub struct IpfsMetadataStore {
    http: reqwest::Client,
    upload_url: String,
    gateway_url: String,
    token: String,
}

impl IpfsMetadataStore {
    pub fn new(
        upload_url: impl Into<String>,
        gateway_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            upload_url: upload_url.into(),
            gateway_url: gateway_url.into(),
            token: token.into(),
        })
    }

    /// Gateway URL for a CID.
    pub fn gateway_url_for(&self, cid: &str) -> String {
        format!("{}/ipfs/{}", self.gateway_url.trim_end_matches('/'), cid)
    }
}

#[async_trait]
impl MetadataStore for IpfsMetadataStore {
    async fn put(&self, document: &ProofMetadata) -> Result<String> {
        let json =
            serde_json::to_vec_pretty(document).map_err(|e| ClientError::Metadata(e.to_string()))?;
        let part = Part::bytes(json)
            .file_name("metadata.json")
            .mime_str("application/json")?;

        let response = self
            .http
            .post(&self.upload_url)
            .bearer_auth(&self.token)
            .multipart(Form::new().part("file", part))
            .send()
            .await?
            .error_for_status()?
            .json::<UploadResponse>()
            .await?;

        if response.cid.is_empty() {
            return Err(ClientError::Metadata("upload returned an empty CID".into()));
        }
        info!(cid = %response.cid, fingerprint = %document.fingerprint, "uploaded metadata");
        Ok(response.cid)
    }

    async fn get(&self, pointer: &str) -> Result<ProofMetadata> {
        let url = self.gateway_url_for(pointer);
        debug!(url = %url, "fetching metadata");
        Ok(self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<ProofMetadata>()
            .await?)
    }
}

/// Lets the indexer enrich mirror rows from a [`MetadataStore`].
pub struct MetadataLookup(pub Arc<dyn MetadataStore>);

#[async_trait]
impl MetadataSource for MetadataLookup {
    async fn fetch_metadata(&self, pointer: &str) -> Option<ProofMetadata> {
        match self.0.get(pointer).await {
            Ok(document) => Some(document),
            Err(err) => {
                warn!(pointer = %pointer, error = %err, "metadata fetch failed");
                None
            }
        }
    }
}
