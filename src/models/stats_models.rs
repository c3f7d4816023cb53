// src/models/stats_models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_extractions: usize,
    pub comma_based_extractions: usize,
    pub ambiguous_token_rejections: usize,
    pub formatting_standardizations: usize,
    pub failed_extractions: usize,
}

impl ExtractionStats {
    pub fn merge(&mut self, other: &ExtractionStats) {
        self.total_extractions += other.total_extractions;
        self.comma_based_extractions += other.comma_based_extractions;
        self.ambiguous_token_rejections += other.ambiguous_token_rejections;
        self.formatting_standardizations += other.formatting_standardizations;
        self.failed_extractions += other.failed_extractions;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingStats {
    pub comparisons_attempted: usize,
    pub exact_matches: usize,
    pub gender_mismatches: usize,
    pub first_token_failures: usize,
    pub last_token_failures: usize,
    pub penalty_applications: usize,
    pub accepted_matches: usize,
    pub new_identities: usize,
}

impl MatchingStats {
    pub fn merge(&mut self, other: &MatchingStats) {
        self.comparisons_attempted += other.comparisons_attempted;
        self.exact_matches += other.exact_matches;
        self.gender_mismatches += other.gender_mismatches;
        self.first_token_failures += other.first_token_failures;
        self.last_token_failures += other.last_token_failures;
        self.penalty_applications += other.penalty_applications;
        self.accepted_matches += other.accepted_matches;
        self.new_identities += other.new_identities;
    }
}

/// Lifecycle of one observation through the engine. Only the last three
/// variants are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObservationState {
    Observed,
    Extracted,
    Fingerprinted,
    Matched,
    Unmatched,
    Consolidated,
    Created,
    Failed,
}

impl ObservationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ObservationState::Consolidated | ObservationState::Created | ObservationState::Failed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationDecision {
    pub observation_index: usize,
    pub term: u32,
    pub display_name: String,
    pub comparison_name: String,
    pub state: ObservationState,
    pub identity_id: Option<String>,
    pub score: f64,
    pub reason: String,
    /// Title extraction failed and the raw name was used instead.
    pub degraded: bool,
    /// Set when a match landed on a term the identity already had.
    pub duplicate_term: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ExtractionFailure,
    PersistenceFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationFailure {
    /// `None` for run-level failures such as the dictionary write.
    pub observation_index: Option<usize>,
    pub display_name: String,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub observations_total: usize,
    pub matched: usize,
    pub created: usize,
    pub failed: usize,
    pub degraded_extractions: usize,
    pub duplicate_terms: usize,
    pub identities_total: usize,
    pub multi_term_identities: usize,
    pub identities_with_party_changes: usize,
    pub identities_per_term: BTreeMap<u32, usize>,
    pub dictionary_discoveries_merged: usize,
    pub unclassified_titles: Vec<String>,
    pub extraction_stats: ExtractionStats,
    pub matching_stats: MatchingStats,
    pub decisions: Vec<ObservationDecision>,
    pub failures: Vec<ObservationFailure>,
}
