use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use registry_lib::honorifics::dictionary::TitleDictionaryDocument;
use registry_lib::models::core::{IdentityRecord, RawObservation};
use registry_lib::models::stats_models::RunSummary;
use registry_lib::pipeline::ResolutionRunner;
use registry_lib::registry::{DictionaryStore, IdentityStore, InMemoryRegistry, PgRegistryStore};
use registry_lib::utils::config::ResolutionConfig;
use registry_lib::utils::db_connect::{connect, get_pool_status};
use registry_lib::utils::env::{load_env, load_env_from_file};
use registry_lib::utils::get_memory_usage;
use registry_lib::utils::progress_config::ProgressConfig;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct ResolveArgs {
    /// JSON array of roster observations to resolve
    input: PathBuf,

    /// Run against an in-memory registry instead of PostgreSQL
    #[arg(long)]
    memory: bool,

    /// Write the resulting registry as pretty JSON
    #[arg(long)]
    export: Option<PathBuf>,

    /// Title dictionary document to start from (in-memory runs only)
    #[arg(long)]
    dictionary: Option<PathBuf>,

    /// Write the run summary as pretty JSON
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Load environment from this file instead of .env
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = ResolveArgs::parse();
    info!("Starting MP identity resolution");

    match &args.env_file {
        Some(path) => load_env_from_file(path),
        None => load_env(),
    }

    let config = ResolutionConfig::from_env();
    config.log_config();
    let progress = ProgressConfig::from_env();
    info!(
        "Progress tracking: enabled={}, detailed={}",
        progress.enabled, progress.detailed
    );

    let observations = read_observations(&args.input)?;
    info!(
        "Read {} observations from {}",
        observations.len(),
        args.input.display()
    );

    let start_time = Instant::now();
    let (summary, identities) = if args.memory {
        let store = InMemoryRegistry::new();
        if let Some(path) = &args.dictionary {
            let document = read_dictionary(path)?;
            info!(
                "Seeding in-memory dictionary from {} ({} honorifics)",
                path.display(),
                document.total_honorifics
            );
            store.put_dictionary(&config.dictionary_key, document).await;
        }
        execute(store, config, progress, observations).await?
    } else {
        if args.dictionary.is_some() {
            warn!("--dictionary only applies to --memory runs; using the stored dictionary");
        }
        let pool = connect().await.context("Failed to connect to database")?;
        info!("Successfully connected to the database");
        let (connections, idle) = get_pool_status(&pool);
        info!("Pool status: {} connections, {} idle", connections, idle);

        let store = PgRegistryStore::new(pool);
        store
            .ensure_schema()
            .await
            .context("Failed to prepare registry schema")?;
        execute(store, config, progress, observations).await?
    };

    if let Some(path) = &args.export {
        write_json(path, &identities)
            .with_context(|| format!("Failed to export registry to {}", path.display()))?;
        info!("Exported {} identities to {}", identities.len(), path.display());
    }
    if let Some(path) = &args.summary {
        write_json(path, &summary)
            .with_context(|| format!("Failed to write run summary to {}", path.display()))?;
        info!("Wrote run summary to {}", path.display());
    }

    print_summary(&summary);
    info!(
        "Identity resolution finished in {:.2?}. Memory: {} MB",
        start_time.elapsed(),
        get_memory_usage().await
    );
    Ok(())
}

async fn execute<S>(
    store: S,
    config: ResolutionConfig,
    progress: ProgressConfig,
    observations: Vec<RawObservation>,
) -> Result<(RunSummary, Vec<IdentityRecord>)>
where
    S: IdentityStore + DictionaryStore,
{
    let mut runner = ResolutionRunner::new(store, config, progress);
    runner
        .initialize()
        .await
        .context("Failed to load registry snapshot")?;
    let summary = runner
        .run(observations)
        .await
        .context("Identity resolution run failed")?;
    let identities = runner.snapshot().identities().to_vec();
    Ok((summary, identities))
}

fn read_observations(path: &Path) -> Result<Vec<RawObservation>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read observations from {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse observations in {}", path.display()))
}

fn read_dictionary(path: &Path) -> Result<TitleDictionaryDocument> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read dictionary from {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse dictionary document in {}", path.display()))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("\n=== Identity resolution summary (run {}) ===", summary.run_id);
    println!("Observations:          {}", summary.observations_total);
    println!("Matched:               {}", summary.matched);
    println!("Created:               {}", summary.created);
    println!("Failed:                {}", summary.failed);
    println!("Degraded extractions:  {}", summary.degraded_extractions);
    println!("Duplicate terms:       {}", summary.duplicate_terms);
    println!("Identities:            {}", summary.identities_total);
    println!("Multi-term identities: {}", summary.multi_term_identities);
    println!("With party changes:    {}", summary.identities_with_party_changes);
    for (term, count) in &summary.identities_per_term {
        println!("  Term {:>2}: {} identities", term, count);
    }
    println!(
        "Dictionary: {} discoveries merged",
        summary.dictionary_discoveries_merged
    );
    if !summary.unclassified_titles.is_empty() {
        println!("Unclassified titles: {}", summary.unclassified_titles.join(", "));
    }
    for failure in &summary.failures {
        match failure.observation_index {
            Some(idx) => println!(
                "  FAILED #{} '{}' ({:?}): {}",
                idx, failure.display_name, failure.kind, failure.message
            ),
            None => println!("  FAILED run ({:?}): {}", failure.kind, failure.message),
        }
    }
}
