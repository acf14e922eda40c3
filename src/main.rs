use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use uuid::Uuid;

mod artifact;
mod config;
mod error;
mod extract;
mod flatten;
mod load;
mod models;
mod warehouse;

use artifact::ArtifactStore;
use models::{ExtractOutcome, LoadOutcome};
use warehouse::BigQueryLoader;

#[derive(Parser)]
#[command(name = "gradebook-warehouse-sync")]
#[command(about = "Flattens gradebook documents into warehouse rows", long_about = None)]
struct Cli {
    /// Root directory for per-run artifacts.
    #[arg(long, default_value = "/tmp/gradebook-sync")]
    work_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and flatten grade records into a CSV artifact
    Extract {
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Load a previously extracted artifact into the warehouse
    Load {
        #[arg(long)]
        run_id: String,
    },
    /// Run extract then load for one run
    Run {
        #[arg(long)]
        run_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let cli = Cli::parse();
    let store = ArtifactStore::new(&cli.work_dir);

    match cli.command {
        Commands::Extract { run_id } => {
            let run_id = run_id.unwrap_or_else(new_run_id);
            run_extract(&store, &run_id).await?;
        }
        Commands::Load { run_id } => {
            run_load(&store, &run_id).await?;
        }
        Commands::Run { run_id } => {
            let run_id = run_id.unwrap_or_else(new_run_id);
            if run_extract(&store, &run_id).await? {
                run_load(&store, &run_id).await?;
            }
        }
    }

    Ok(())
}

fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Returns whether an artifact was produced, so `run` knows to skip the load
/// step after an empty extract.
async fn run_extract(store: &ArtifactStore, run_id: &str) -> anyhow::Result<bool> {
    let source = config::source_from_env()?;
    match extract::run(&source, store, run_id).await {
        Ok(ExtractOutcome::Written(artifact)) => {
            info!(
                run_id,
                rows = artifact.rows,
                path = %artifact.path.display(),
                "extract complete"
            );
            Ok(true)
        }
        Ok(ExtractOutcome::SourceEmpty) => {
            info!(run_id, "source collection is empty, no artifact produced");
            Ok(false)
        }
        Err(err) => {
            error!(run_id, %err, "extract step failed");
            bail!("extract step failed: {err}");
        }
    }
}

async fn run_load(store: &ArtifactStore, run_id: &str) -> anyhow::Result<()> {
    let warehouse_config = config::warehouse_from_env()?;
    let table_id = warehouse_config.table_id();
    let sink = BigQueryLoader::new(warehouse_config);

    match load::run(store, &sink, run_id).await {
        Ok(LoadOutcome::Loaded { rows }) => {
            info!(run_id, rows, table = %table_id, "load complete");
            Ok(())
        }
        Ok(LoadOutcome::NothingToLoad) => Ok(()),
        Err(err) => {
            error!(run_id, %err, "load step failed");
            bail!("load step failed: {err}");
        }
    }
}
