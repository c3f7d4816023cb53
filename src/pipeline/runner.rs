// src/pipeline/runner.rs
//! Drives a batch of observations through extraction, resolution and
//! consolidation against a store.
//!
//! Resolution is strictly sequential: each observation is resolved against
//! the snapshot and its result is applied before the next one is looked at,
//! so two observations of the same person can never both miss each other.

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, info};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::consolidation::history::{
    consolidate, consolidation_patch, create_identity, TermObservation,
};
use crate::consolidation::term::build_term_entry;
use crate::honorifics::dictionary::TitleDictionary;
use crate::honorifics::extractor::HonorificExtractor;
use crate::matching::resolver::resolve;
use crate::models::core::{IdentityRecord, RawObservation};
use crate::models::stats_models::{
    ExtractionStats, FailureKind, MatchingStats, ObservationDecision, ObservationFailure,
    ObservationState, RunSummary,
};
use crate::pipeline::prepare::{prepare_all, PreparedObservation};
use crate::registry::{DictionaryStore, IdentityStore, RegistrySnapshot};
use crate::utils::config::ResolutionConfig;
use crate::utils::get_memory_usage;
use crate::utils::logging::ResolutionLogger;
use crate::utils::progress_config::ProgressConfig;

const CREATION_CONFIDENCE: f64 = 100.0;

pub struct ResolutionRunner<S> {
    store: S,
    config: ResolutionConfig,
    progress: ProgressConfig,
    dictionary: TitleDictionary,
    snapshot: RegistrySnapshot,
    initialized: bool,
}

/// Counters accumulated while the observations of one run are applied.
#[derive(Default)]
struct RunTally {
    extraction: ExtractionStats,
    matching: MatchingStats,
    decisions: Vec<ObservationDecision>,
    failures: Vec<ObservationFailure>,
    discoveries: Vec<String>,
}

impl RunTally {
    fn push_decision(&mut self, decision: ObservationDecision) {
        debug_assert!(
            decision.state.is_terminal(),
            "observation {} left in {:?}",
            decision.observation_index,
            decision.state
        );
        self.decisions.push(decision);
    }
}

impl<S> ResolutionRunner<S>
where
    S: IdentityStore + DictionaryStore,
{
    pub fn new(store: S, config: ResolutionConfig, progress: ProgressConfig) -> Self {
        Self {
            store,
            config,
            progress,
            dictionary: TitleDictionary::new(),
            snapshot: RegistrySnapshot::default(),
            initialized: false,
        }
    }

    /// Loads the title dictionary (or the seed) and the identity snapshot.
    pub async fn initialize(&mut self) -> Result<()> {
        let logger = ResolutionLogger::new();
        let stored = self
            .store
            .load_dictionary(&self.config.dictionary_key)
            .await
            .context("Failed to load title dictionary")?;
        let seeded = stored.is_none();
        self.dictionary = match stored {
            Some(document) => TitleDictionary::from_document(&document),
            None => TitleDictionary::seed(),
        };
        logger.log_dictionary_loaded(self.dictionary.len(), seeded);

        let identities = self
            .store
            .load_all_identities()
            .await
            .context("Failed to load identity snapshot")?;
        info!("Loaded {} existing identities", identities.len());
        self.snapshot = RegistrySnapshot::new(identities);
        self.initialized = true;
        Ok(())
    }

    pub async fn run(&mut self, observations: Vec<RawObservation>) -> Result<RunSummary> {
        if !self.initialized {
            self.initialize().await?;
        }

        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let logger = ResolutionLogger::new();
        let observations_total = observations.len();
        logger.log_start(&run_id, observations_total, self.snapshot.len());

        logger.log_phase(
            "Pre-processing",
            Some(&format!(
                "{} observations on {} workers",
                observations_total, self.config.prepare_workers
            )),
        );
        let extractor = Arc::new(HonorificExtractor::new(&self.dictionary));
        let mut prepared = prepare_all(extractor, observations, self.config.prepare_workers)
            .await
            .context("Failed to pre-process observations")?;
        prepared.sort_by_key(|p| (p.raw.term, p.index));

        logger.log_phase("Resolution", None);
        let pb = self.progress.create_bar(prepared.len() as u64);
        let mut tally = RunTally::default();
        for observation in &prepared {
            self.apply_observation(observation, &logger, &mut tally).await;

            if let Some(pb) = &pb {
                pb.inc(1);
                if self.progress.should_show_detailed() {
                    let mut message = format!(
                        "term {} | {} identities",
                        observation.raw.term,
                        self.snapshot.len()
                    );
                    if self.progress.should_show_memory() {
                        message.push_str(&format!(" | Memory: {} MB", get_memory_usage().await));
                    }
                    pb.set_message(message);
                }
            }
        }
        if let Some(pb) = &pb {
            pb.finish_with_message("Resolution complete");
        }

        logger.log_phase("Dictionary update", None);
        let report = self.dictionary.merge_discoveries(&tally.discoveries);
        for (category, title) in &report.added {
            info!("New title '{}' added to {}", title, category);
        }
        let document =
            self.dictionary
                .to_document(Utc::now(), report.added.len(), tally.extraction.clone());
        if let Err(e) = self
            .store
            .save_dictionary(&self.config.dictionary_key, &document)
            .await
        {
            let failure = ObservationFailure {
                observation_index: None,
                display_name: self.config.dictionary_key.clone(),
                kind: FailureKind::PersistenceFailure,
                message: format!("{:#}", e),
            };
            logger.log_failure(&failure);
            tally.failures.push(failure);
        }

        let summary = self.summarize(
            run_id,
            started_at,
            observations_total,
            report.added.len(),
            report.unclassified,
            tally,
        );
        logger.log_completion(&summary);
        Ok(summary)
    }

    /// Resolve and consolidate one observation. Nothing here aborts the run.
    async fn apply_observation(
        &mut self,
        observation: &PreparedObservation,
        logger: &ResolutionLogger,
        tally: &mut RunTally,
    ) {
        tally.extraction.merge(&observation.extraction.stats());
        for title in &observation.extraction.discoveries {
            if !tally.discoveries.contains(title) {
                tally.discoveries.push(title.clone());
            }
        }

        let mut decision = ObservationDecision {
            observation_index: observation.index,
            term: observation.raw.term,
            display_name: observation.raw.display_name.clone(),
            comparison_name: observation.comparison_name.clone(),
            state: ObservationState::Observed,
            identity_id: None,
            score: 0.0,
            reason: String::new(),
            degraded: observation.degraded,
            duplicate_term: false,
        };

        if observation.is_unusable() {
            decision.reason = "No usable name".to_string();
            self.fail_observation(
                observation,
                decision,
                FailureKind::ExtractionFailure,
                "Display name is empty after cleanup and has no raw fallback".to_string(),
                logger,
                tally,
            );
            return;
        }
        decision.state = ObservationState::Extracted;
        if observation.degraded {
            logger.log_degraded(&observation.raw.display_name);
        }

        decision.state = ObservationState::Fingerprinted;
        let resolution = resolve(
            &observation.comparison_name,
            &observation.fingerprint,
            observation.constituency_code.as_deref(),
            self.snapshot.identities(),
        );
        tally.matching.merge(&resolution.tally);
        decision.score = resolution.best_score;
        decision.reason = resolution.reason.clone();

        let now = Utc::now();
        match resolution.matched_index {
            Some(idx) => {
                decision.state = ObservationState::Matched;
                let Some(existing) = self.snapshot.get(idx) else {
                    self.fail_observation(
                        observation,
                        decision,
                        FailureKind::PersistenceFailure,
                        format!("Matched identity at position {} is not in the snapshot", idx),
                        logger,
                        tally,
                    );
                    return;
                };
                let term_observation = TermObservation {
                    entry: build_term_entry(
                        &observation.raw,
                        self.config.current_term,
                        resolution.best_score,
                        now,
                    ),
                    titles: observation.extraction.titles.clone(),
                    extraction_method: observation.extraction.method,
                };

                let mut updated = existing.clone();
                let added = consolidate(&mut updated, &term_observation, now);
                decision.identity_id = Some(updated.id.clone());
                decision.duplicate_term = !added;

                if updated != *existing {
                    if let Err(e) = self.persist_consolidation(&updated).await {
                        self.fail_observation(
                            observation,
                            decision,
                            FailureKind::PersistenceFailure,
                            format!("{:#}", e),
                            logger,
                            tally,
                        );
                        return;
                    }
                    logger.log_match(&decision, &updated.canonical_name);
                    self.snapshot.replace(idx, updated);
                } else {
                    logger.log_match(&decision, &updated.canonical_name);
                }
                decision.state = ObservationState::Consolidated;
            }
            None => {
                decision.state = ObservationState::Unmatched;
                if resolution.best_score > self.config.near_miss_floor {
                    logger.log_near_miss(
                        &observation.comparison_name,
                        resolution.best_score,
                        &resolution.reason,
                    );
                }

                let term_observation = TermObservation {
                    entry: build_term_entry(
                        &observation.raw,
                        self.config.current_term,
                        CREATION_CONFIDENCE,
                        now,
                    ),
                    titles: observation.extraction.titles.clone(),
                    extraction_method: observation.extraction.method,
                };
                let identity = create_identity(
                    &observation.raw,
                    &observation.comparison_name,
                    &term_observation,
                    now,
                );
                decision.identity_id = Some(identity.id.clone());

                if let Err(e) = self.store.insert_identity(&identity).await {
                    decision.identity_id = None;
                    self.fail_observation(
                        observation,
                        decision,
                        FailureKind::PersistenceFailure,
                        format!("{:#}", e),
                        logger,
                        tally,
                    );
                    return;
                }
                decision.state = ObservationState::Created;
                logger.log_created(&decision);
                self.snapshot.push(identity);
            }
        }
        tally.push_decision(decision);
    }

    async fn persist_consolidation(&self, identity: &IdentityRecord) -> Result<()> {
        let patch = consolidation_patch(identity)?;
        debug!(
            "Persisting {} fields for identity {}",
            patch.len(),
            identity.id
        );
        self.store
            .update_identity_fields(&identity.id, &patch)
            .await
            .with_context(|| format!("Failed to persist consolidation of {}", identity.id))
    }

    /// Closes out an observation as failed: the failure is recorded and the
    /// decision is still part of the summary.
    fn fail_observation(
        &self,
        observation: &PreparedObservation,
        mut decision: ObservationDecision,
        kind: FailureKind,
        message: String,
        logger: &ResolutionLogger,
        tally: &mut RunTally,
    ) {
        let failure = ObservationFailure {
            observation_index: Some(observation.index),
            display_name: observation.raw.display_name.clone(),
            kind,
            message,
        };
        logger.log_failure(&failure);
        tally.failures.push(failure);
        decision.state = ObservationState::Failed;
        tally.push_decision(decision);
    }

    fn summarize(
        &self,
        run_id: String,
        started_at: chrono::DateTime<Utc>,
        observations_total: usize,
        dictionary_discoveries_merged: usize,
        unclassified_titles: Vec<String>,
        tally: RunTally,
    ) -> RunSummary {
        let count = |state: ObservationState| {
            tally
                .decisions
                .iter()
                .filter(|decision| decision.state == state)
                .count()
        };

        let identities = self.snapshot.identities();
        let mut identities_per_term: BTreeMap<u32, usize> = BTreeMap::new();
        for identity in identities {
            let terms: HashSet<u32> = identity.history.iter().map(|entry| entry.term).collect();
            for term in terms {
                *identities_per_term.entry(term).or_default() += 1;
            }
        }

        RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            observations_total,
            matched: count(ObservationState::Consolidated),
            created: count(ObservationState::Created),
            failed: count(ObservationState::Failed),
            degraded_extractions: tally.decisions.iter().filter(|d| d.degraded).count(),
            duplicate_terms: tally.decisions.iter().filter(|d| d.duplicate_term).count(),
            identities_total: identities.len(),
            multi_term_identities: identities.iter().filter(|i| i.is_multi_term()).count(),
            identities_with_party_changes: identities
                .iter()
                .filter(|i| !i.party_changes.is_empty())
                .count(),
            identities_per_term,
            dictionary_discoveries_merged,
            unclassified_titles,
            extraction_stats: tally.extraction,
            matching_stats: tally.matching,
            decisions: tally.decisions,
            failures: tally.failures,
        }
    }

    pub fn snapshot(&self) -> &RegistrySnapshot {
        &self.snapshot
    }

    pub fn dictionary(&self) -> &TitleDictionary {
        &self.dictionary
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::honorifics::dictionary::TitleDictionaryDocument;
    use crate::models::core::TermStatus;
    use crate::registry::InMemoryRegistry;
    use anyhow::bail;
    use serde_json::{Map, Value};

    fn obs(name: &str, constituency: &str, party: &str, term: u32) -> RawObservation {
        RawObservation {
            display_name: name.to_string(),
            constituency_text: constituency.to_string(),
            party_text: party.to_string(),
            state: "Pulau Pinang".to_string(),
            term,
        }
    }

    fn runner<S: IdentityStore + DictionaryStore>(store: S) -> ResolutionRunner<S> {
        ResolutionRunner::new(store, ResolutionConfig::default(), ProgressConfig::disabled())
    }

    /// Rejects inserts of one canonical name and, optionally, dictionary writes.
    struct FlakyStore {
        inner: InMemoryRegistry,
        reject_name: String,
        reject_dictionary: bool,
    }

    impl IdentityStore for FlakyStore {
        async fn load_all_identities(&self) -> Result<Vec<IdentityRecord>> {
            self.inner.load_all_identities().await
        }

        async fn get_identity(&self, id: &str) -> Result<Option<IdentityRecord>> {
            self.inner.get_identity(id).await
        }

        async fn insert_identity(&self, identity: &IdentityRecord) -> Result<()> {
            if identity.canonical_name == self.reject_name {
                bail!("unique constraint violated for {}", identity.canonical_name);
            }
            self.inner.insert_identity(identity).await
        }

        async fn update_identity_fields(&self, id: &str, fields: &Map<String, Value>) -> Result<()> {
            self.inner.update_identity_fields(id, fields).await
        }
    }

    impl DictionaryStore for FlakyStore {
        async fn load_dictionary(&self, key: &str) -> Result<Option<TitleDictionaryDocument>> {
            self.inner.load_dictionary(key).await
        }

        async fn save_dictionary(&self, key: &str, document: &TitleDictionaryDocument) -> Result<()> {
            if self.reject_dictionary {
                bail!("dictionary store is read-only");
            }
            self.inner.save_dictionary(key, document).await
        }
    }

    #[tokio::test]
    async fn test_same_person_across_terms_is_one_identity() {
        let mut runner = runner(InMemoryRegistry::new());
        let summary = runner
            .run(vec![
                obs("YB Tuan Lim Guan Eng", "P045 Bagan", "PH - DAP", 14),
                obs("Lim Guan Eng, YB", "P045 Bagan", "PH - DAP", 15),
            ])
            .await
            .unwrap();

        assert_eq!(summary.created, 1);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.identities_total, 1);
        assert_eq!(summary.multi_term_identities, 1);
        assert_eq!(summary.identities_per_term.get(&14), Some(&1));
        assert_eq!(summary.identities_per_term.get(&15), Some(&1));

        let stored = runner.store().identities().await;
        assert_eq!(stored.len(), 1);
        let identity = &stored[0];
        assert_eq!(identity.canonical_name, "Lim Guan Eng");
        assert_eq!(identity.history.len(), 2);
        assert_eq!(identity.current_term, 15);
        assert_eq!(identity.current_status, TermStatus::Current);
        assert!(identity.titles.contains("YB"));
        assert!(identity.titles.contains("Tuan"));
        assert_eq!(identity.display_name_with_titles, "Lim Guan Eng, YB");
        assert_eq!(runner.snapshot().identities(), stored.as_slice());

        let merged_into = summary.decisions[1].identity_id.as_deref().unwrap();
        assert_eq!(runner.snapshot().get_by_id(merged_into), Some(identity));
    }

    #[tokio::test]
    async fn test_distinct_people_stay_separate() {
        let mut runner = runner(InMemoryRegistry::new());
        let summary = runner
            .run(vec![
                obs("Ahmad bin Ali", "P010 Kuala Kedah", "PN - PAS", 14),
                obs("Ahmad binti Ali", "P010 Kuala Kedah", "PN - PAS", 15),
                obs("Anwar Ibrahim", "P063 Tambun", "PH - PKR", 15),
            ])
            .await
            .unwrap();

        assert_eq!(summary.created, 3);
        assert_eq!(summary.matched, 0);
        assert_eq!(summary.matching_stats.gender_mismatches, 1);
    }

    #[tokio::test]
    async fn test_observations_resolve_in_term_order() {
        let mut runner = runner(InMemoryRegistry::new());
        let summary = runner
            .run(vec![
                obs("Muhyiddin Yassin", "P143 Pagoh", "PN - BERSATU", 15),
                obs("Muhyiddin Yassin", "P143 Pagoh", "BN - UMNO", 14),
            ])
            .await
            .unwrap();

        assert_eq!(summary.decisions[0].term, 14);
        assert_eq!(summary.decisions[0].state, ObservationState::Created);
        assert_eq!(summary.decisions[1].state, ObservationState::Consolidated);
        assert_eq!(summary.identities_with_party_changes, 1);

        let identity = &runner.snapshot().identities()[0];
        let terms: Vec<u32> = identity.history.iter().map(|e| e.term).collect();
        assert_eq!(terms, vec![14, 15]);
        assert_eq!(identity.party_changes.len(), 1);
        assert_eq!(identity.party_changes[0].from_term, 14);
        assert_eq!(identity.party_changes[0].party, "PN");
        assert_eq!(identity.historical_data.original_party, "BN - UMNO");
    }

    #[tokio::test]
    async fn test_discovered_titles_are_persisted() {
        let mut runner = runner(InMemoryRegistry::new());
        let summary = runner
            .run(vec![obs("Ahmad bin Ali, Dato'Sri", "", "BN", 15)])
            .await
            .unwrap();

        assert_eq!(summary.dictionary_discoveries_merged, 1);
        assert!(summary.unclassified_titles.is_empty());
        assert!(runner.dictionary().contains("Dato'Sri"));

        let document = runner
            .store()
            .load_dictionary("honorific_dictionary")
            .await
            .unwrap()
            .unwrap();
        assert!(document.categories["datuk_titles"].contains(&"Dato'Sri".to_string()));
        assert_eq!(document.new_discoveries_this_session, 1);
        assert_eq!(document.extraction_statistics.comma_based_extractions, 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_abort_run() {
        let store = FlakyStore {
            inner: InMemoryRegistry::new(),
            reject_name: "Hannah Yeoh".to_string(),
            reject_dictionary: true,
        };
        let mut runner = runner(store);
        let summary = runner
            .run(vec![
                obs("Hannah Yeoh", "P106 Segambut", "PH", 15),
                obs("Teresa Kok", "P122 Seputeh", "PH", 15),
            ])
            .await
            .unwrap();

        assert_eq!(summary.created, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures.len(), 2);
        assert_eq!(summary.failures[0].kind, FailureKind::PersistenceFailure);
        assert_eq!(summary.failures[0].observation_index, Some(0));
        // the dictionary write failure is run-level
        assert_eq!(summary.failures[1].observation_index, None);
        assert_eq!(runner.snapshot().len(), 1);
        assert_eq!(runner.store().inner.identities().await.len(), 1);
    }

    #[tokio::test]
    async fn test_blank_and_title_only_names() {
        let mut runner = runner(InMemoryRegistry::new());
        let summary = runner
            .run(vec![obs("   ", "", "PH", 15), obs("Dato' Sri (Dr.)", "", "PH", 15)])
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].kind, FailureKind::ExtractionFailure);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.degraded_extractions, 1);
        assert_eq!(runner.snapshot().identities()[0].canonical_name, "Dato' Sri (Dr.)");
        assert_eq!(summary.extraction_stats.failed_extractions, 2);
    }

    #[tokio::test]
    async fn test_dato_with_and_without_apostrophe_is_one_identity() {
        let mut runner = runner(InMemoryRegistry::new());
        let summary = runner
            .run(vec![
                obs("Dato' Seri Anwar Ibrahim", "P044 Permatang Pauh", "PH - PKR", 13),
                obs("Dato Seri Anwar Ibrahim", "P063 Tambun", "PH - PKR", 15),
                obs("Dato Sri Ahmad Zahid Hamidi", "P075 Bagan Datuk", "BN - UMNO", 15),
            ])
            .await
            .unwrap();

        assert_eq!(summary.created, 2);
        assert_eq!(summary.matched, 1);
        let anwar = &runner.snapshot().identities()[0];
        assert_eq!(anwar.canonical_name, "Anwar Ibrahim");
        assert_eq!(anwar.history.len(), 2);
        assert!(anwar.titles.contains("Dato' Seri"));
        assert!(anwar.titles.contains("Dato Seri"));
        assert_eq!(runner.snapshot().identities()[1].canonical_name, "Ahmad Zahid Hamidi");
        assert_eq!(summary.dictionary_discoveries_merged, 0);
    }

    #[tokio::test]
    async fn test_failed_observation_keeps_its_decision() {
        let runner = runner(InMemoryRegistry::new());
        let extractor = HonorificExtractor::new(&TitleDictionary::seed());
        let observation =
            crate::pipeline::prepare::prepare_one(&extractor, 4, obs("Teresa Kok", "", "PH", 15));
        let decision = ObservationDecision {
            observation_index: 4,
            term: 15,
            display_name: "Teresa Kok".to_string(),
            comparison_name: "Teresa Kok".to_string(),
            state: ObservationState::Matched,
            identity_id: None,
            score: 100.0,
            reason: "Exact match".to_string(),
            degraded: false,
            duplicate_term: false,
        };

        let mut tally = RunTally::default();
        runner.fail_observation(
            &observation,
            decision,
            FailureKind::PersistenceFailure,
            "identity went missing".to_string(),
            &ResolutionLogger::new(),
            &mut tally,
        );

        assert_eq!(tally.decisions.len(), 1);
        assert_eq!(tally.decisions[0].state, ObservationState::Failed);
        assert_eq!(tally.failures.len(), 1);
        assert_eq!(tally.failures[0].observation_index, Some(4));
        assert_eq!(tally.failures[0].message, "identity went missing");
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "left in")]
    fn test_non_terminal_decision_is_rejected() {
        let mut tally = RunTally::default();
        tally.push_decision(ObservationDecision {
            observation_index: 0,
            term: 15,
            display_name: "Hannah Yeoh".to_string(),
            comparison_name: "Hannah Yeoh".to_string(),
            state: ObservationState::Fingerprinted,
            identity_id: None,
            score: 0.0,
            reason: String::new(),
            degraded: false,
            duplicate_term: false,
        });
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let observations = vec![
            obs("YB Tuan Lim Guan Eng", "P045 Bagan", "PH - DAP", 14),
            obs("Lim Guan Eng, YB", "P045 Bagan", "PH - DAP", 15),
            obs("Anwar Ibrahim", "P063 Tambun", "PH - PKR", 15),
        ];

        let mut first = runner(InMemoryRegistry::new());
        first.run(observations.clone()).await.unwrap();
        let before = first.store().identities().await;

        let mut second = runner(first.into_store());
        let summary = second.run(observations).await.unwrap();

        assert_eq!(summary.created, 0);
        assert_eq!(summary.matched, 3);
        assert_eq!(summary.duplicate_terms, 3);
        assert_eq!(second.store().identities().await, before);
    }
}
