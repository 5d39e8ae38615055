use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use defcache_engine::{LoaderConfig, ResourceLoader, load_registrations_file};
use futures_util::future::join_all;
use indexmap::IndexMap;
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[command(name = "defcache", version, about = "Resolve registered resources into definitions")]
struct Cli {
    /// Loader configuration file (JSON). Defaults to $DEFCACHE_CONFIG_PATH or the user config dir.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Registrations document (YAML or JSON). May be given more than once.
    #[arg(long, short = 'r', global = true)]
    registrations: Vec<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve names and print their definitions as JSON (`null` when unresolvable)
    Resolve {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// List registered names
    List,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let loader = build_loader(&cli)?;

    match cli.command {
        Command::Resolve { names } => resolve_names(&loader, &names).await,
        Command::List => {
            for name in loader.registered_names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_loader(cli: &Cli) -> Result<ResourceLoader> {
    let config = match &cli.config {
        Some(path) => LoaderConfig::load_from(path)?,
        None => LoaderConfig::load()?,
    };
    let loader = ResourceLoader::with_config(&config).context("failed to apply loader configuration")?;

    for path in &cli.registrations {
        let registrations = load_registrations_file(path)?;
        let count = loader
            .register_all(registrations)
            .with_context(|| format!("failed to register resources from {}", path.display()))?;
        info!(path = %path.display(), count, "registered resources from file");
    }
    debug!(registration_count = loader.registered_names().len(), "loader ready");
    Ok(loader)
}

async fn resolve_names(loader: &ResourceLoader, names: &[String]) -> Result<()> {
    let resolutions = join_all(names.iter().map(|name| loader.get(name))).await;

    let output: IndexMap<&str, _> = names.iter().map(String::as_str).zip(resolutions).collect();
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
