//! Dynamic security configuration tool
//!
//! # Architecture Overview
//!
//! ```text
//!   security config file (TOML / JSON)
//!            │
//!            ▼
//!   ┌─────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//!   │  config loader  │────▶│ snapshot builder │────▶│  ConfigManager   │
//!   │  + validation   │     │  alias registry  │     │  (atomic swap)   │
//!   └────────▲────────┘     │  backend factory │     └────────┬─────────┘
//!            │              └────────┬─────────┘              │
//!   ┌────────┴────────┐              │                        ▼
//!   │  file watcher   │     ┌────────▼─────────┐     ┌──────────────────┐
//!   │  (hot reload)   │     │  listener store  │◀────│ request threads  │
//!   └─────────────────┘     │  (rate limiters) │     │ (auth chain)     │
//!                           └──────────────────┘     └──────────────────┘
//! ```
//!
//! # Commands
//! - `check`: load a document, resolve every alias and print the chain
//! - `watch`: keep a live snapshot in sync with a document and expose metrics
//! - `aliases`: list the alias table

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use dynamic_security::auth::{AliasRegistry, BuiltinFactory, Protocol};
use dynamic_security::config::loader::load_config;
use dynamic_security::config::watcher::ConfigWatcher;
use dynamic_security::observability::logging::{init_logging, DEFAULT_DIRECTIVE};
use dynamic_security::observability::metrics::init_metrics;
use dynamic_security::snapshot::{ConfigManager, SnapshotBuilder};

#[derive(Parser)]
#[command(name = "dynamic-security")]
#[command(about = "Validate and hot-reload dynamic security configuration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration document and print the resolved chain
    Check {
        /// Path to the configuration document
        file: PathBuf,
    },
    /// Keep a live snapshot in sync with a configuration document
    Watch {
        /// Path to the configuration document
        file: PathBuf,

        /// Prometheus scrape address
        #[arg(long)]
        metrics_address: Option<SocketAddr>,
    },
    /// List every registered alias
    Aliases,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let registry = Arc::new(AliasRegistry::builtin());

    match cli.command {
        Commands::Check { file } => check(&registry, &file)?,
        Commands::Watch {
            file,
            metrics_address,
        } => watch(registry, file, metrics_address).await?,
        Commands::Aliases => {
            for binding in registry.bindings() {
                println!(
                    "{:<32} {:<26} {}",
                    binding.alias,
                    binding.direction.to_string(),
                    binding.implementation
                );
            }
        }
    }

    Ok(())
}

fn check(registry: &AliasRegistry, file: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(file)?;
    let factory = BuiltinFactory::new();
    let plan = SnapshotBuilder::new(registry, &factory).plan(&config.dynamic)?;

    for protocol in [Protocol::Rest, Protocol::Transport] {
        println!("{} authentication domains:", protocol.as_str());
        for domain in plan.domains.iter().filter(|d| d.is_enabled(protocol)) {
            println!(
                "  {:>4}  {:<24} {:?} -> {}",
                domain.config.order,
                domain.name,
                domain.http_kind,
                domain.backend_kind.name()
            );
        }
    }

    println!("authorizers:");
    for authorizer in &plan.authorizers {
        println!("  {:<24} {:?}", authorizer.name, authorizer.kind);
    }

    println!("auth failure listeners:");
    for listener in &plan.listeners {
        println!(
            "  {:<24} {:<8} {:<10} {} tries / {}s, blocked for {}s",
            listener.name,
            listener.kind.to_string(),
            listener.backend.as_deref().unwrap_or("global"),
            listener.settings.allowed_tries,
            listener.settings.time_window.as_secs(),
            listener.settings.block_expiry.as_secs()
        );
    }

    println!("configuration is valid");
    Ok(())
}

async fn watch(
    registry: Arc<AliasRegistry>,
    file: PathBuf,
    metrics_address: Option<SocketAddr>,
) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(DEFAULT_DIRECTIVE);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dynamic-security starting");

    if let Some(addr) = metrics_address {
        init_metrics(addr);
    }

    let manager = ConfigManager::new(registry, Arc::new(BuiltinFactory::new()));

    match load_config(&file) {
        Ok(config) => {
            if let Err(e) = manager.reload(&config.dynamic) {
                tracing::debug!(error = %e, "Initial security config not applied");
            }
        }
        Err(e) => tracing::error!(path = ?file, error = %e, "Failed to load initial security config"),
    }

    let (watcher, mut updates) = ConfigWatcher::new(&file);
    let _watcher = watcher.run()?;

    loop {
        tokio::select! {
            Some(config) = updates.recv() => {
                if let Err(e) = manager.reload(&config.dynamic) {
                    tracing::debug!(error = %e, "Security config update not applied");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    tracing::info!(generation = manager.current().generation(), "Shutdown complete");
    Ok(())
}
