// src/bin/cli.rs

//! Command-line entry point for the fiscal ingestion pipeline.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use fiscal_ingest::config::Config;
use fiscal_ingest::error::Result;
use fiscal_ingest::pipeline::{self, UrlImporter};
use fiscal_ingest::storage::SqliteStore;

#[derive(Parser)]
#[command(
    name = "fiscal-ingest",
    about = "Import NFC-e fiscal documents from XML files or SEFAZ consultation URLs",
    version
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "fiscal-ingest.toml")]
    config: PathBuf,

    /// Increase log verbosity
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import a federal-schema XML document
    ImportXml {
        /// Path to the XML file
        file: PathBuf,
    },
    /// Import from an authority consultation URL
    ImportUrl {
        url: String,

        /// Render with the headless browser from the start
        #[arg(long)]
        browser: bool,
    },
    /// Check the configuration file and exit
    Validate,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);
    config.validate()?;

    match cli.command {
        Command::ImportXml { file } => {
            let bytes = tokio::fs::read(&file).await?;
            let store = SqliteStore::connect(&config.storage.database_url).await?;
            let summary = pipeline::import_xml_bytes(&store, &bytes).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::ImportUrl { url, browser } => {
            let store = SqliteStore::connect(&config.storage.database_url).await?;
            let importer = UrlImporter::new(&config)?;
            let summary = pipeline::import_url(&store, &importer, &url, browser).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Validate => {
            println!("configuration ok: {}", cli.config.display());
        }
    }
    Ok(())
}
