// src/bin/score_names.rs
//! Audits a single name comparison: extraction, fingerprints, similarity
//! components, penalties and the final accept/reject decision.
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs;
use std::path::PathBuf;

use registry_lib::honorifics::dictionary::{TitleDictionary, TitleDictionaryDocument};
use registry_lib::honorifics::extractor::HonorificExtractor;
use registry_lib::matching::resolver::{resolve, MatchCandidate, ACCEPTANCE_THRESHOLD};
use registry_lib::matching::scorer::score;
use registry_lib::models::core::RawObservation;
use registry_lib::models::matching::{NameFingerprint, ScoreKind};
use registry_lib::pipeline::prepare::{prepare_one, PreparedObservation};
use registry_lib::registry::{DictionaryStore, PgRegistryStore};
use registry_lib::utils::config::ResolutionConfig;
use registry_lib::utils::db_connect::connect;
use registry_lib::utils::env::load_env;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct ScoreArgs {
    /// Raw display name of the new observation
    new_name: String,

    /// Raw display name of the existing identity
    existing_name: String,

    /// Constituency text of the new observation
    #[arg(long, default_value = "")]
    new_constituency: String,

    /// Constituency text of the existing identity
    #[arg(long, default_value = "")]
    existing_constituency: String,

    /// Title dictionary document to extract with
    #[arg(long)]
    dictionary: Option<PathBuf>,

    /// Load the stored title dictionary from the registry database
    #[arg(long)]
    stored_dictionary: bool,

    /// Print the score outcome as JSON
    #[arg(long)]
    json: bool,
}

struct AuditCandidate<'a>(&'a PreparedObservation);

impl MatchCandidate for AuditCandidate<'_> {
    fn comparison_name(&self) -> &str {
        &self.0.comparison_name
    }

    fn latest_constituency_code(&self) -> Option<&str> {
        self.0.constituency_code.as_deref()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = ScoreArgs::parse();
    load_env();

    let dictionary = load_dictionary(&args).await?;
    info!("Scoring with a dictionary of {} titles", dictionary.len());
    let extractor = HonorificExtractor::new(&dictionary);

    let new_obs = prepare_one(&extractor, 0, observation(&args.new_name, &args.new_constituency));
    let existing = prepare_one(
        &extractor,
        1,
        observation(&args.existing_name, &args.existing_constituency),
    );

    let outcome = score(
        &new_obs.comparison_name,
        &new_obs.fingerprint,
        &existing.comparison_name,
        &existing.fingerprint,
    );
    let candidates = [AuditCandidate(&existing)];
    let resolution = resolve(
        &new_obs.comparison_name,
        &new_obs.fingerprint,
        new_obs.constituency_code.as_deref(),
        &candidates,
    );

    if args.json {
        let json = serde_json::to_string_pretty(&outcome)
            .context("Failed to serialize score outcome")?;
        println!("{}", json);
        return Ok(());
    }

    print_side("New", &new_obs);
    print_side("Existing", &existing);

    println!("\n=== Score ===");
    match &outcome.kind {
        ScoreKind::Disqualified(reason) => println!("Disqualified: {}", reason),
        ScoreKind::ExactMatch => println!("Exact match"),
        ScoreKind::Weighted {
            similarities,
            penalties,
        } => {
            println!("Full ratio:        {:.0}%", similarities.full);
            println!("Token-sort ratio:  {:.0}%", similarities.token_sort);
            println!("Partial ratio:     {:.0}%", similarities.partial);
            println!("Component score:   {:.1}%", similarities.component);
            if penalties.is_empty() {
                println!("Penalties:         none");
            }
            for penalty in penalties {
                println!("Penalty:           {} (x{})", penalty, penalty.factor());
            }
        }
    }
    println!("Name score:        {:.1}", outcome.score);
    println!("Boosted score:     {:.1}", resolution.best_score);
    println!("Reason:            {}", resolution.reason);
    println!(
        "Decision:          {} (threshold {})",
        if resolution.is_match() { "MERGE" } else { "NEW IDENTITY" },
        ACCEPTANCE_THRESHOLD
    );
    Ok(())
}

async fn load_dictionary(args: &ScoreArgs) -> Result<TitleDictionary> {
    if let Some(path) = &args.dictionary {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read dictionary from {}", path.display()))?;
        let document: TitleDictionaryDocument = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse dictionary document in {}", path.display()))?;
        return Ok(TitleDictionary::from_document(&document));
    }
    if args.stored_dictionary {
        let config = ResolutionConfig::from_env();
        let pool = connect().await.context("Failed to connect to database")?;
        let store = PgRegistryStore::new(pool);
        let stored = store
            .load_dictionary(&config.dictionary_key)
            .await
            .context("Failed to load stored title dictionary")?;
        if let Some(document) = stored {
            return Ok(TitleDictionary::from_document(&document));
        }
        info!("No stored dictionary '{}', using the seed", config.dictionary_key);
    }
    Ok(TitleDictionary::seed())
}

fn observation(display_name: &str, constituency_text: &str) -> RawObservation {
    RawObservation {
        display_name: display_name.to_string(),
        constituency_text: constituency_text.to_string(),
        party_text: String::new(),
        state: String::new(),
        term: 0,
    }
}

fn print_side(label: &str, prepared: &PreparedObservation) {
    let extraction = &prepared.extraction;
    println!("\n=== {} ===", label);
    println!("Raw name:          {}", extraction.original_name);
    println!("Titles:            {}", extraction.titles.join(", "));
    println!("Method:            {}", extraction.method.as_str());
    if !extraction.discoveries.is_empty() {
        println!("Discoveries:       {}", extraction.discoveries.join(", "));
    }
    println!(
        "Comparison name:   {}{}",
        prepared.comparison_name,
        if prepared.degraded { " (raw fallback)" } else { "" }
    );
    print_fingerprint(&prepared.fingerprint);
    println!(
        "Constituency code: {}",
        prepared.constituency_code.as_deref().unwrap_or("-")
    );
}

fn print_fingerprint(fp: &NameFingerprint) {
    println!("First token:       {}", fp.first_token);
    println!("Middle tokens:     {}", fp.middle_tokens.join(" "));
    println!("Last token:        {}", fp.last_token);
    println!("Connector:         {}", fp.connector.as_str());
    println!("Gender:            {}", fp.gender.as_str());
    println!("Token count:       {}", fp.token_count);
}
