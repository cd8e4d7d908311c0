use anyhow::Result;
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

mod auth;
mod cache;
mod catalog;
mod collection;
mod config;
mod dedupe;
mod error;
mod prices;
mod projector;
mod sheets;
mod sync;
mod types;
mod utils;
mod writer;

use config::{Config, SourceKind, DEFAULT_CONFIG_PATH};

#[derive(Parser)]
#[command(name = "cardsheets")]
#[command(about = "Sync card catalogs and collection prices into Google Sheets")]
struct Cli {
    /// CONL configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a card catalog into its sheet (e.g. "mtg" or "scryfall")
    Sync {
        #[arg(value_name = "CATALOG")]
        catalog: String,
    },
    /// Look up market prices for every row of the collection sheet
    Prices,
    /// Download and cache a catalog without touching any sheet
    Fetch {
        #[arg(value_name = "CATALOG")]
        catalog: String,
    },
    /// Remove cached catalogs, leftover downloads and the OAuth token
    Clean,
}

fn run_clean(config: &Config) -> Result<()> {
    println!("Cleaning cached files...");

    let mut paths: BTreeSet<&Path> = BTreeSet::new();
    for job in config.catalogs.values() {
        paths.insert(job.cache_path.as_path());
        if job.source == SourceKind::Bulk {
            paths.insert(job.download_path.as_path());
        }
    }
    paths.insert(config.auth.token_path.as_path());

    for path in paths {
        if utils::try_remove_file(path) {
            println!("  Removed {}", path.display());
        }
    }

    println!("Clean complete!");
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Sync { catalog } => sync::run_catalog_sync(&config, &catalog),
        Commands::Prices => sync::run_price_refresh(&config),
        Commands::Fetch { catalog } => sync::run_fetch(&config, &catalog),
        Commands::Clean => run_clean(&config),
    }
}
