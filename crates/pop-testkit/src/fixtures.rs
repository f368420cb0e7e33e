//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::{ImageFormat, Rgba, RgbaImage};

use pop::{LocalWallet, MemoryMetadataStore, ProofService, RegistryClient};
use pop_core::{ChainId, ContentInput, Keypair};
use pop_ledger::{DevChain, DevChainConfig, ManualClock};
use pop_store::MemoryStore;

/// Start time of every fixture clock: 2023-11-14T22:13:20Z.
pub const GENESIS_SECS: u64 = 1_700_000_000;

/// A local ledger with a manual clock, two wallets and shared stores.
pub struct TestFixture {
    pub ledger: Arc<DevChain<MemoryStore>>,
    pub clock: Arc<ManualClock>,
    pub metadata: Arc<MemoryMetadataStore>,
    pub mirror: Arc<MemoryStore>,
    pub alice: Keypair,
    pub bob: Keypair,
}

impl TestFixture {
    /// Fixture on the default chain (Sepolia).
    pub async fn new() -> Self {
        Self::on_chain(ChainId::SEPOLIA).await
    }

    /// Fixture whose ledger reports `chain_id`.
    pub async fn on_chain(chain_id: ChainId) -> Self {
        let clock = Arc::new(ManualClock::new(GENESIS_SECS));
        let ledger = DevChain::open(
            MemoryStore::new(),
            clock.clone(),
            DevChainConfig {
                chain_id,
                ..Default::default()
            },
        )
        .await
        .expect("memory ledger opens");

        Self {
            ledger: Arc::new(ledger),
            clock,
            metadata: Arc::new(MemoryMetadataStore::new()),
            mirror: Arc::new(MemoryStore::new()),
            alice: Keypair::from_seed(&[0xa1; 32]),
            bob: Keypair::from_seed(&[0xb0; 32]),
        }
    }

    /// A wallet for `keypair` on this ledger.
    pub fn wallet(&self, keypair: &Keypair) -> Arc<LocalWallet> {
        Arc::new(LocalWallet::new(keypair.clone(), self.ledger.clone()))
    }

    /// A connected registry client expecting Sepolia.
    pub async fn client(&self, keypair: &Keypair) -> pop::Result<RegistryClient> {
        RegistryClient::connect(self.wallet(keypair), self.ledger.clone(), ChainId::SEPOLIA).await
    }

    /// A proof service sharing this fixture's metadata store and mirror.
    pub async fn service(&self, keypair: &Keypair) -> ProofService {
        let client = self.client(keypair).await.expect("fixture client connects");
        ProofService::new(client, self.metadata.clone(), self.mirror.clone())
    }
}

/// A small deterministic RGBA image.
pub fn sample_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 40) as u8, (y * 40) as u8, ((x + y) * 20) as u8, 255])
    })
}

/// Encode `image` in `format`.
pub fn encode_image(image: &RgbaImage, format: ImageFormat) -> Bytes {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, format)
        .expect("in-memory image encodes");
    Bytes::from(out.into_inner())
}

/// `image` as PNG content input.
pub fn png_content(image: &RgbaImage) -> ContentInput {
    ContentInput::from_bytes(encode_image(image, ImageFormat::Png)).expect("png sniffs as image")
}
