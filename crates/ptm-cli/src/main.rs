//! PTM harvester - batch runner for the ptm-core library.
//!
//! Harvests model hub metadata into a SQLite store and reads models back out.

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use ptm_core::{
    harvest, source_for, HarvestConfig, HarvestOptions, LookupTable, MetadataStore, ModelHub,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "ptm")]
#[command(about = "Harvest pre-trained model metadata into SQLite")]
struct Args {
    /// SQLite database file
    #[arg(long, global = true, default_value = HarvestConfig::DB_FILE_NAME)]
    db: PathBuf,

    /// Enable debug logging (RUST_LOG takes precedence when set)
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the schema, optionally dropping existing tables first
    Init {
        #[arg(long)]
        reset: bool,
    },
    /// Extract, map and load one hub
    Harvest(HarvestArgs),
    /// Print one model with its associations and discussions
    Show {
        /// Model id in the store
        #[arg(long, conflicts_with = "context_id")]
        id: Option<i64>,

        /// External identifier, resolved together with --hub
        #[arg(long)]
        context_id: Option<String>,

        #[arg(long, default_value = "huggingface")]
        hub: String,

        /// Print the raw cartesian rows instead of the aggregated view
        #[arg(long)]
        rows: bool,
    },
    /// List the names stored in a lookup table
    Names {
        /// architecture, author, framework, language, library, license, paper or tag
        table: String,
    },
    /// Delete a model with its join rows and discussions
    Delete { id: i64 },
}

#[derive(ClapArgs, Debug)]
struct HarvestArgs {
    /// huggingface or pytorch
    #[arg(long, default_value = "huggingface")]
    hub: String,

    /// Maximum number of rows to extract (0 = everything)
    #[arg(long, default_value_t = 1000)]
    limit: usize,

    /// Harvest HuggingFace datasets instead of models
    #[arg(long)]
    datasets: bool,

    #[arg(long, default_value_t = HarvestConfig::DEFAULT_MIN_DOWNLOADS)]
    min_downloads: u64,

    #[arg(long, default_value_t = HarvestConfig::DEFAULT_MAX_DOWNLOADS)]
    max_downloads: u64,

    #[arg(long)]
    no_commits: bool,

    #[arg(long)]
    no_discussions: bool,

    #[arg(long)]
    no_snapshot: bool,

    /// Write CSV/JSON exports of the mapped batch here
    #[arg(long)]
    export_dir: Option<PathBuf>,

    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    hf_token: Option<String>,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,
}

impl HarvestArgs {
    fn options(&self) -> ptm_core::Result<HarvestOptions> {
        let mut options = HarvestOptions::new(ModelHub::parse(&self.hub)?);
        options.limit = (self.limit > 0).then_some(self.limit);
        options.datasets = self.datasets;
        options.min_downloads = self.min_downloads;
        options.max_downloads = self.max_downloads;
        options.fetch_commits = !self.no_commits;
        options.fetch_discussions = !self.no_discussions;
        options.fetch_snapshot = !self.no_snapshot;
        options.export_dir = self.export_dir.clone();
        options.validate()?;
        Ok(options)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let store = MetadataStore::open(&args.db)
        .with_context(|| format!("Failed to open store at {}", args.db.display()))?;

    match args.command {
        Command::Init { reset } => {
            if reset {
                warn!("Dropping every table in {}", args.db.display());
                store.reset()?;
            }
            info!("Store ready at {}", args.db.display());
        }
        Command::Harvest(harvest_args) => {
            let options = harvest_args.options()?;
            let source = source_for(
                &options,
                harvest_args.hf_token.clone(),
                harvest_args.github_token.clone(),
            )?;
            let report = harvest(source.as_ref(), &store, &options).await?;
            store.checkpoint_wal()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Show {
            id,
            context_id,
            hub,
            rows,
        } => {
            let model_id = match (id, context_id) {
                (Some(id), _) => id,
                (None, Some(context_id)) => {
                    let hub = ModelHub::parse(&hub)?;
                    match store.find_model_id(hub, &context_id)? {
                        Some(id) => id,
                        None => bail!("No {} model named {}", hub, context_id),
                    }
                }
                (None, None) => bail!("Pass --id or --context-id"),
            };

            if rows {
                let rows = store.fetch_model(model_id)?;
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                let view = store.model_view(model_id)?;
                let discussions = store.fetch_discussions(model_id)?;
                let output = serde_json::json!({ "model": view, "discussions": discussions });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        }
        Command::Names { table } => {
            let table = LookupTable::parse(&table)?;
            for name in store.lookup_names(table)? {
                println!("{}", name);
            }
        }
        Command::Delete { id } => {
            if store.delete_model(id)? {
                info!("Deleted model {}", id);
            } else {
                bail!("Model {} not found", id);
            }
        }
    }

    Ok(())
}
