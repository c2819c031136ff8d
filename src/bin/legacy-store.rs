//! Inspect the legacy storage backends of a platform.

use std::path::PathBuf;
use std::sync::Arc;

use chat_storage::logging::init_logging;
use chat_storage::prelude::*;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result, WrapErr};

/// Inspect chat client storage left behind by older versions.
#[derive(Parser)]
#[command(name = "legacy-store", version, about)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides the configuration file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Platform to select backends for: desktop, mobile or web
    #[arg(long, global = true)]
    platform: Option<Platform>,

    /// Read from this backend instead of the discovered one (e.g. LOCAL_STORAGE)
    #[arg(long, global = true)]
    backend: Option<StorageType>,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the backends of the platform in probe order
    Backends,
    /// Print the first backend holding data
    Discover,
    /// List keys
    Keys,
    /// Print one value
    Get {
        /// Store key, e.g. settings or chat-sessions
        key: String,
    },
    /// Print every value as one JSON object
    Dump,
}

fn load_config(cli: &Cli) -> Result<StorageConfig> {
    let config = match &cli.config {
        Some(path) => StorageConfig::load(path)
            .wrap_err_with(|| format!("loading {}", path.display()))?,
        None => StorageConfig::default(),
    };
    let mut config = config.apply_env_overrides();
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(platform) = cli.platform {
        config.platform = Some(platform);
    }
    Ok(config)
}

async fn pick_storage(cli: &Cli, manager: &StorageManager) -> Result<Arc<dyn Storage>> {
    if let Some(kind) = cli.backend {
        return Ok(manager.storage(kind).await?);
    }
    manager
        .discover_legacy_storage()
        .await?
        .ok_or_else(|| eyre!("no legacy data found on {}", manager.platform()))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_logging(if cli.verbose { "debug" } else { "warn" });

    let config = load_config(&cli)?;
    let manager = StorageManager::from_config(config)?;

    match &cli.command {
        Commands::Backends => {
            for kind in select_backends_for_platform(manager.platform()) {
                println!("{}", kind);
            }
        }
        Commands::Discover => match manager.discover_legacy_storage().await? {
            Some(storage) => println!("{}", storage.get_storage_type()),
            None => println!("none"),
        },
        Commands::Keys => {
            let storage = pick_storage(&cli, &manager).await?;
            for key in storage.get_all_store_keys().await? {
                println!("{}", key);
            }
        }
        Commands::Get { key } => {
            let storage = pick_storage(&cli, &manager).await?;
            match storage.get_store_value(key).await? {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => return Err(eyre!("{} has no value for {}", storage.get_storage_type(), key)),
            }
        }
        Commands::Dump => {
            let storage = pick_storage(&cli, &manager).await?;
            let values = storage.get_all_store_values().await?;
            println!("{}", serde_json::to_string_pretty(&values)?);
        }
    }

    Ok(())
}
