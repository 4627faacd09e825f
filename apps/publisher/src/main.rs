//! hashpub entry point.

mod config;

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use hashpub_deploy::{
    AddressMode, Deployer, DeployerConfig, GraphCompiler, UpdateRequest, Variant, Variants,
};
use hashpub_protocol::{CacheManifest, ProgressMessage};
use hashpub_storage::LocalStore;

#[derive(Parser)]
#[command(name = "hashpub")]
#[command(about = "Publish compiled package graphs to a content-addressed store")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(long, global = true, env = "HASHPUB_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Source {
    /// Package graph JSON produced by the compiler
    #[arg(long)]
    graph: PathBuf,

    /// Output directory; one subdirectory per bucket
    #[arg(long)]
    out: PathBuf,

    /// JSON file with prelude and standard package hashes
    #[arg(long)]
    standard: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a command package and everything it imports
    Deploy {
        /// Import path of the entry package
        entry: String,

        #[command(flatten)]
        source: Source,

        /// Variants to build
        #[arg(long, value_enum, default_value_t = VariantArg::Both)]
        variant: VariantArg,

        /// How entry documents are named
        #[arg(long, value_enum, default_value_t = AddressArg::Hash)]
        address: AddressArg,
    },
    /// Archive the dependencies of packages being edited
    Update {
        /// Import paths of the packages being edited
        #[arg(required = true)]
        paths: Vec<String>,

        #[command(flatten)]
        source: Source,

        /// Client cache manifest (import path to hash)
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Archive unminified packages
        #[arg(long)]
        max: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum VariantArg {
    Min,
    Max,
    Both,
}

impl From<VariantArg> for Variants {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Min => Variants::only(Variant::Optimized),
            VariantArg::Max => Variants::only(Variant::Unoptimized),
            VariantArg::Both => Variants::both(),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum AddressArg {
    Hash,
    Path,
}

impl From<AddressArg> for AddressMode {
    fn from(arg: AddressArg) -> Self {
        match arg {
            AddressArg::Hash => AddressMode::Hash,
            AddressArg::Path => AddressMode::Path,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Deploy {
            entry,
            source,
            variant,
            address,
        } => {
            let mut deployer = open(&source, config).await?;
            let printer = print_events(&mut deployer);
            let outputs = deployer.deploy(&entry, address.into(), variant.into()).await;
            drop(deployer);
            printer.await??;

            for (variant, output) in outputs? {
                tracing::info!(
                    entry = %entry,
                    variant = variant.label(),
                    loader = %output.loader_hash,
                    document = %output.entry_hash,
                    "published"
                );
            }
        }
        Commands::Update {
            paths,
            source,
            cache,
            max,
        } => {
            let request = UpdateRequest {
                source: paths.into_iter().collect::<BTreeSet<_>>(),
                cache: read_cache(cache.as_deref())?,
                minified: !max,
            };
            let mut deployer = open(&source, config).await?;
            let printer = print_events(&mut deployer);
            let index = deployer.update(&request).await;
            drop(deployer);
            printer.await??;

            let index = index?;
            let changed = index.iter().filter(|(_, item)| !item.unchanged).count();
            tracing::info!(packages = index.len(), changed, "cache updated");
        }
    }

    Ok(())
}

async fn open(source: &Source, config: DeployerConfig) -> anyhow::Result<Deployer> {
    let graph = GraphCompiler::load(&source.graph)
        .await
        .with_context(|| format!("loading graph {}", source.graph.display()))?;
    let standard = config::StandardFile::load(source.standard.as_deref())?;
    let store = LocalStore::new(source.out.clone());
    tracing::debug!(out = %source.out.display(), "publishing to local store");

    Ok(Deployer::new(Arc::new(graph), Arc::new(store), config, standard.prelude)
        .with_standard(standard.packages))
}

fn read_cache(path: Option<&Path>) -> anyhow::Result<CacheManifest> {
    let Some(path) = path else {
        return Ok(CacheManifest::new());
    };
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Prints progress messages to stdout as JSON lines until the deployer is dropped.
fn print_events(deployer: &mut Deployer) -> tokio::task::JoinHandle<anyhow::Result<()>> {
    let rx = deployer.take_events();
    tokio::spawn(async move {
        let Some(mut rx) = rx else {
            return Ok(());
        };
        print_lines(&mut rx).await
    })
}

async fn print_lines(rx: &mut mpsc::UnboundedReceiver<ProgressMessage>) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    while let Some(message) = rx.recv().await {
        let line = serde_json::to_string(&message)?;
        writeln!(stdout.lock(), "{line}")?;
    }
    Ok(())
}
