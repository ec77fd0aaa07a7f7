use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use index_sync::adapters::{FsContentRepository, MemoryIndex};
use index_sync::{
    logging, BatchIndexer, BinaryBatchIndexer, CycleSerializer, MetadataBinaryIndexer,
    ResolvedSyncConfig, SyncConfig, UpdateSet, UpdateStatus,
};

mod cli;

use cli::{Args, Commands, ConfigCommands, OutputFormat, SyncMode};

struct SyncParams {
    root: PathBuf,
    index: PathBuf,
    updates: Vec<String>,
    deletes: Vec<String>,
    changes: Option<PathBuf>,
    mode: SyncMode,
    site: String,
    format: OutputFormat,
}

fn load_config(path: Option<&Path>) -> Result<ResolvedSyncConfig> {
    match path {
        Some(path) => SyncConfig::load_with_file(path),
        None => SyncConfig::load(),
    }
}

fn configured_format(config: &ResolvedSyncConfig) -> OutputFormat {
    if config.format.eq_ignore_ascii_case("json") {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    }
}

fn build_update_set(params: &SyncParams) -> Result<UpdateSet> {
    let mut update_set = match &params.changes {
        Some(path) => {
            let bytes =
                std::fs::read(path).context(format!("Failed to read changes file: {path:?}"))?;
            serde_json::from_slice::<UpdateSet>(&bytes)
                .context(format!("Failed to parse changes file: {path:?}"))?
        }
        None => UpdateSet::default(),
    };

    update_set
        .update_paths
        .extend(params.updates.iter().cloned());
    update_set
        .delete_paths
        .extend(params.deletes.iter().cloned());

    Ok(update_set)
}

fn print_status(status: &UpdateStatus, elapsed_ms: u128) {
    println!(
        "{} {}",
        "Updated:".bold().green(),
        status.successful_updates().len()
    );
    for path in status.successful_updates() {
        println!("  {}", path);
    }
    println!(
        "{} {}",
        "Deleted:".bold().green(),
        status.successful_deletes().len()
    );
    for path in status.successful_deletes() {
        println!("  {}", path);
    }

    if status.has_failures() {
        println!(
            "{} {}",
            "Failed updates:".bold().red(),
            status.failed_updates().len()
        );
        for path in status.failed_updates() {
            println!("  {}", path.red());
        }
        println!(
            "{} {}",
            "Failed deletes:".bold().red(),
            status.failed_deletes().len()
        );
        for path in status.failed_deletes() {
            println!("  {}", path.red());
        }
    }

    println!("{} {} ms", "Time:".bold(), elapsed_ms);
}

async fn handle_sync(params: SyncParams, config: &ResolvedSyncConfig) -> Result<UpdateStatus> {
    let start = Instant::now();
    let update_set = build_update_set(&params)?;

    let repository = Arc::new(
        FsContentRepository::new(&params.root)
            .context(format!("Failed to open repository: {:?}", params.root))?,
    );
    let index = Arc::new(MemoryIndex::load(&params.index, config).await?);

    let indexer: Box<dyn BatchIndexer> = match params.mode {
        SyncMode::Metadata => Box::new(MetadataBinaryIndexer::new(
            config,
            repository,
            index.clone(),
            index.clone(),
        )?),
        SyncMode::Binary => Box::new(BinaryBatchIndexer::new(config, repository, index.clone())?),
    };

    let serializer = CycleSerializer::new();
    let mut status = UpdateStatus::new();
    serializer
        .run(&params.site, indexer.as_ref(), &update_set, &mut status)
        .await?;

    index.save(&params.index).await?;

    match params.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
        OutputFormat::Text => print_status(&status, start.elapsed().as_millis()),
    }

    Ok(status)
}

fn handle_config_show(config: &ResolvedSyncConfig, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", config.to_json_string()?),
        OutputFormat::Text => {
            println!("{}", "Effective configuration".bold().green());
            println!("{}", config.to_json_string()?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    logging::init(&config.log_level);

    match args.command {
        Commands::Sync {
            root,
            index,
            updates,
            deletes,
            changes,
            mode,
            site,
            format,
        } => {
            let format = format.unwrap_or_else(|| configured_format(&config));
            let status = match handle_sync(
                SyncParams {
                    root,
                    index,
                    updates,
                    deletes,
                    changes,
                    mode,
                    site,
                    format,
                },
                &config,
            )
            .await
            {
                Ok(status) => status,
                Err(e) => {
                    error!("Sync failed: {:#}", e);
                    return Err(e);
                }
            };

            if status.has_failures() {
                std::process::exit(1);
            }
        }
        Commands::Config {
            command: ConfigCommands::Show { format },
        } => handle_config_show(&config, format)?,
    }

    Ok(())
}
