//! `pop` command-line client.
//!
//! ```text
//! pop fingerprint (<file> | --text <text>)
//! pop register (<file> | --text <text>) --prompt <prompt> [--model <m>] [--model-version <v>] [--notes <n>]
//! pop register --generate --prompt <prompt> [--notes <n>]
//! pop verify (<file> | --text <text>) [--certificate <out.json>]
//! pop proofs [--owner <0x address>]
//! pop index
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pop::core::{Address, ContentInput, Keypair};
use pop::indexer::{verify_mirror, Indexer, IndexerConfig};
use pop::ledger::{DevChain, DevChainConfig, Ledger, SystemClock};
use pop::store::{MirrorStore, SqliteStore};
use pop::{
    build_content_generator, build_metadata_store, load_content, ClientConfig, ClientError,
    LocalWallet, MetadataLookup, ProofService, RegisterRequest, RegistryClient,
};

const USAGE: &str = "usage: pop <fingerprint|register|verify|proofs|index> [args]";

/// Flags that take no value.
const SWITCHES: &[&str] = &["generate"];

/// Positional arguments and `--flag value` pairs.
struct Args {
    command: String,
    positional: Vec<String>,
    flags: HashMap<String, String>,
}

impl Args {
    fn parse(mut raw: impl Iterator<Item = String>) -> Result<Self> {
        let command = raw.next().ok_or_else(|| anyhow!(USAGE))?;
        let mut positional = Vec::new();
        let mut flags = HashMap::new();

        while let Some(arg) = raw.next() {
            match arg.strip_prefix("--") {
                Some(name) if SWITCHES.contains(&name) => {
                    flags.insert(name.to_string(), String::new());
                }
                Some(name) => {
                    let value = raw
                        .next()
                        .ok_or_else(|| anyhow!("--{} needs a value", name))?;
                    flags.insert(name.to_string(), value);
                }
                None => positional.push(arg),
            }
        }

        Ok(Self {
            command,
            positional,
            flags,
        })
    }

    fn flag(&self, name: &str) -> Option<&str> {
        self.flags.get(name).map(String::as_str)
    }

    async fn content(&self) -> Result<ContentInput> {
        match (self.flag("text"), self.positional.first()) {
            (Some(text), _) => Ok(ContentInput::text(text)),
            (None, Some(path)) => load_content(path)
                .await
                .map_err(ClientError::from)
                .with_context(|| format!("reading {}", path)),
            (None, None) => bail!("give a file or --text <text>"),
        }
    }
}

/// Everything a command might need.
struct Session {
    config: ClientConfig,
    ledger: Arc<DevChain<SqliteStore>>,
    mirror: Arc<SqliteStore>,
}

impl Session {
    async fn open(config: ClientConfig) -> Result<Self> {
        let ledger_store = match &config.ledger_db {
            Some(path) => SqliteStore::open(path)?,
            None => SqliteStore::open_memory()?,
        };

        let mirror = match &config.mirror_db {
            Some(path) if Some(path) == config.ledger_db.as_ref() => ledger_store.clone(),
            Some(path) => SqliteStore::open(path)?,
            None => SqliteStore::open_memory()?,
        };

        let ledger = DevChain::open(ledger_store, Arc::new(SystemClock), DevChainConfig::default())
            .await?;

        Ok(Self {
            config,
            ledger: Arc::new(ledger),
            mirror: Arc::new(mirror),
        })
    }

    fn keypair(&self) -> Result<Keypair> {
        match &self.config.signer_seed {
            Some(seed) => Keypair::from_seed_hex(seed).context("POP_SIGNER_SEED is not a valid seed"),
            None => {
                warn!("POP_SIGNER_SEED not set, using a throwaway key");
                Ok(Keypair::generate())
            }
        }
    }

    async fn service(&self) -> Result<ProofService> {
        let wallet = Arc::new(LocalWallet::new(self.keypair()?, self.ledger.clone()));
        let client =
            RegistryClient::connect(wallet, self.ledger.clone(), self.config.expected_chain_id).await?;
        let metadata = build_metadata_store(&self.config.metadata)?;
        Ok(ProofService::new(client, metadata, self.mirror.clone()))
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        match err.downcast_ref::<ClientError>() {
            Some(client_err) => eprintln!("error: {}", client_err.user_message()),
            None => eprintln!("error: {:#}", err),
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse(std::env::args().skip(1))?;

    if args.command == "fingerprint" {
        let digest = ProofService::fingerprint(&args.content().await?).map_err(ClientError::from)?;
        println!("{}", digest);
        return Ok(());
    }

    let config = ClientConfig::from_env()?;
    info!(?config, "configuration loaded");
    let session = Session::open(config).await?;

    match args.command.as_str() {
        "register" => {
            let prompt = args
                .flag("prompt")
                .ok_or_else(|| anyhow!("register needs --prompt <prompt>"))?;
            let mut request = if args.flag("generate").is_some() {
                let generator = build_content_generator(&session.config.generator)?.ok_or_else(|| {
                    ClientError::Config("--generate needs POP_GENERATOR to be set".into())
                })?;
                let request = RegisterRequest::generated(generator.as_ref(), prompt).await?;
                if let Some(text) = request.content.as_text() {
                    println!("{}\n", text);
                }
                request
            } else {
                let mut request = RegisterRequest::new(args.content().await?, prompt);
                request.model = args.flag("model").map(str::to_string);
                request.model_version = args.flag("model-version").map(str::to_string);
                request
            };
            request.notes = args.flag("notes").map(str::to_string);

            let service = session.service().await?;
            let registration = service.register(request).await?;
            println!("fingerprint  {}", registration.fingerprint);
            println!("owner        {}", registration.receipt.from);
            println!("metadata     {}", registration.metadata_pointer);
            println!("transaction  {}", registration.receipt.tx_hash);
            println!("block        {}", registration.receipt.block_number);
            service.disconnect();
        }
        "verify" => {
            let service = session.service().await?;
            let verification = service.verify(&args.content().await?).await?;
            let certificate = verification.certificate(Utc::now());

            match &verification.record {
                Some(record) => {
                    println!("registered   yes");
                    println!("owner        {}", record.owner);
                    println!("timestamp    {}", record.timestamp);
                    println!("metadata     {}", record.metadata_pointer);
                    if let Some(prompt) = &certificate.prompt {
                        println!("prompt       {}", prompt);
                    }
                }
                None => println!("registered   no"),
            }

            if let Some(path) = args.flag("certificate") {
                tokio::fs::write(path, certificate.to_json()?)
                    .await
                    .with_context(|| format!("writing {}", path))?;
                println!("certificate  {}", path);
            }
            service.disconnect();
        }
        "proofs" => {
            let service = session.service().await?;
            let rows = match args.flag("owner") {
                Some(owner) => service.proofs_of(&Address::from_hex(owner)?).await?,
                None => service.my_proofs().await?,
            };
            for row in &rows {
                println!(
                    "{}  {}  {}",
                    row.fingerprint,
                    row.timestamp,
                    row.prompt.as_deref().unwrap_or("-")
                );
            }
            println!("{} proof(s)", rows.len());
            service.disconnect();
        }
        "index" => {
            let config = IndexerConfig::default();
            let metadata = build_metadata_store(&session.config.metadata)?;
            let indexer = Indexer::new(session.ledger.clone(), session.mirror.clone(), config.clone())
                .with_metadata(Arc::new(MetadataLookup(metadata)));

            let report = indexer.catch_up().await?;
            println!("applied {} event(s), cursor {}", report.applied, report.cursor);

            let ledger: &dyn Ledger = session.ledger.as_ref();
            let result = verify_mirror(ledger, session.mirror.as_ref(), &config.cursor_name).await?;
            println!("convergence  {:?}", result);
            println!("mirror rows  {}", session.mirror.summary_count().await?);
        }
        other => bail!("unknown command `{}`\n{}", other, USAGE),
    }

    Ok(())
}
