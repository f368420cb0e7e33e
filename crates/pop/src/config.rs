//! Client configuration.
//!
//! Everything has a `Default` suitable for local use. [`ClientConfig::from_env`]
//! reads the `POP_*` variables plus the service tokens; the binary loads a
//! `.env` file first.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use pop_core::ChainId;

use crate::error::{ClientError, Result};
use crate::generator::{DEFAULT_GEMINI_ENDPOINT, DEFAULT_GEMINI_MODEL, DEFAULT_GEMINI_MODEL_VERSION};

pub const DEFAULT_IPFS_UPLOAD_URL: &str = "https://api.web3.storage/upload";
pub const DEFAULT_IPFS_GATEWAY_URL: &str = "https://w3s.link";

/// Which metadata store to use.
#[derive(Clone, PartialEq, Eq)]
pub enum MetadataStoreConfig {
    /// Process-local store, for tests and offline use.
    Memory,
    /// Pinning service upload plus gateway reads.
    Ipfs {
        upload_url: String,
        gateway_url: String,
        token: Option<String>,
        timeout: Duration,
    },
}

impl MetadataStoreConfig {
    /// IPFS with the default endpoints.
    pub fn ipfs(token: impl Into<String>) -> Self {
        MetadataStoreConfig::Ipfs {
            upload_url: DEFAULT_IPFS_UPLOAD_URL.to_string(),
            gateway_url: DEFAULT_IPFS_GATEWAY_URL.to_string(),
            token: Some(token.into()),
            timeout: Duration::from_secs(30),
        }
    }

    /// Reject configurations that cannot work.
    ///
    /// An IPFS store without a token is an error; it never degrades to the
    /// memory store.
    pub fn validate(&self) -> Result<()> {
        match self {
            MetadataStoreConfig::Memory => Ok(()),
            MetadataStoreConfig::Ipfs { token, upload_url, gateway_url, .. } => {
                if token.as_deref().map(str::trim).unwrap_or("").is_empty() {
                    return Err(ClientError::Config(
                        "ipfs metadata store selected but WEB3_STORAGE_TOKEN is not set".into(),
                    ));
                }
                if upload_url.is_empty() || gateway_url.is_empty() {
                    return Err(ClientError::Config("ipfs endpoints must not be empty".into()));
                }
                Ok(())
            }
        }
    }
}

impl Default for MetadataStoreConfig {
    fn default() -> Self {
        MetadataStoreConfig::Memory
    }
}

impl fmt::Debug for MetadataStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataStoreConfig::Memory => write!(f, "Memory"),
            MetadataStoreConfig::Ipfs { upload_url, gateway_url, token, timeout } => f
                .debug_struct("Ipfs")
                .field("upload_url", upload_url)
                .field("gateway_url", gateway_url)
                .field("token", &token.as_ref().map(|_| "<redacted>"))
                .field("timeout", timeout)
                .finish(),
        }
    }
}

/// Which content generator, if any, backs generate mode.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum GeneratorConfig {
    /// Generate mode is unavailable.
    #[default]
    Disabled,
    /// Google Gemini `generateContent`.
    Gemini {
        endpoint: String,
        model: String,
        model_version: String,
        api_key: Option<String>,
        timeout: Duration,
    },
}

impl GeneratorConfig {
    /// Gemini with the default endpoint and model.
    pub fn gemini(api_key: impl Into<String>) -> Self {
        GeneratorConfig::Gemini {
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            model_version: DEFAULT_GEMINI_MODEL_VERSION.to_string(),
            api_key: Some(api_key.into()),
            timeout: Duration::from_secs(60),
        }
    }

    /// Gemini without an API key is an error.
    pub fn validate(&self) -> Result<()> {
        match self {
            GeneratorConfig::Disabled => Ok(()),
            GeneratorConfig::Gemini { api_key, .. } => {
                if api_key.as_deref().map(str::trim).unwrap_or("").is_empty() {
                    return Err(ClientError::Config(
                        "gemini generator selected but GEMINI_API_KEY is not set".into(),
                    ));
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorConfig::Disabled => write!(f, "Disabled"),
            GeneratorConfig::Gemini { endpoint, model, model_version, api_key, timeout } => f
                .debug_struct("Gemini")
                .field("endpoint", endpoint)
                .field("model", model)
                .field("model_version", model_version)
                .field("api_key", &api_key.as_ref().map(|_| "<redacted>"))
                .field("timeout", timeout)
                .finish(),
        }
    }
}

/// Configuration for a client session.
#[derive(Clone)]
pub struct ClientConfig {
    /// The network registrations must go to.
    pub expected_chain_id: ChainId,
    pub metadata: MetadataStoreConfig,
    pub generator: GeneratorConfig,
    /// Ledger database; in-memory when unset.
    pub ledger_db: Option<PathBuf>,
    /// Mirror database; in-memory when unset.
    pub mirror_db: Option<PathBuf>,
    /// Hex-encoded Ed25519 seed of the local wallet.
    pub signer_seed: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            expected_chain_id: ChainId::SEPOLIA,
            metadata: MetadataStoreConfig::default(),
            generator: GeneratorConfig::default(),
            ledger_db: None,
            mirror_db: None,
            signer_seed: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("expected_chain_id", &self.expected_chain_id)
            .field("metadata", &self.metadata)
            .field("generator", &self.generator)
            .field("ledger_db", &self.ledger_db)
            .field("mirror_db", &self.mirror_db)
            .field("signer_seed", &self.signer_seed.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ClientConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(raw) = get("POP_CHAIN_ID") {
            let id = raw
                .parse::<u64>()
                .map_err(|_| ClientError::Config(format!("POP_CHAIN_ID is not a number: {}", raw)))?;
            config.expected_chain_id = ChainId(id);
        }

        config.metadata = match get("POP_METADATA_STORE").as_deref() {
            None | Some("memory") => MetadataStoreConfig::Memory,
            Some("ipfs") => MetadataStoreConfig::Ipfs {
                upload_url: get("POP_IPFS_UPLOAD_URL")
                    .unwrap_or_else(|| DEFAULT_IPFS_UPLOAD_URL.to_string()),
                gateway_url: get("POP_IPFS_GATEWAY_URL")
                    .unwrap_or_else(|| DEFAULT_IPFS_GATEWAY_URL.to_string()),
                token: get("WEB3_STORAGE_TOKEN"),
                timeout: Duration::from_secs(30),
            },
            Some(other) => {
                return Err(ClientError::Config(format!(
                    "POP_METADATA_STORE must be `memory` or `ipfs`, got `{}`",
                    other
                )))
            }
        };
        config.metadata.validate()?;

        config.generator = match get("POP_GENERATOR").as_deref() {
            None | Some("none") => GeneratorConfig::Disabled,
            Some("gemini") => GeneratorConfig::Gemini {
                endpoint: get("POP_GEMINI_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_GEMINI_ENDPOINT.to_string()),
                model: get("POP_GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                model_version: get("POP_GEMINI_MODEL_VERSION")
                    .unwrap_or_else(|| DEFAULT_GEMINI_MODEL_VERSION.to_string()),
                api_key: get("GEMINI_API_KEY"),
                timeout: Duration::from_secs(60),
            },
            Some(other) => {
                return Err(ClientError::Config(format!(
                    "POP_GENERATOR must be `none` or `gemini`, got `{}`",
                    other
                )))
            }
        };
        config.generator.validate()?;

        config.ledger_db = get("POP_LEDGER_DB").map(PathBuf::from);
        config.mirror_db = get("POP_MIRROR_DB").map(PathBuf::from);
        config.signer_seed = get("POP_SIGNER_SEED");

        Ok(config)
    }
}
