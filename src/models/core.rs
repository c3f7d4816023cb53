// src/models/core.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::honorifics::dictionary::TitleCategory;

/// One roster row for one parliamentary term, as handed over by a scraper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub display_name: String,
    #[serde(default)]
    pub constituency_text: String,
    #[serde(default)]
    pub party_text: String,
    #[serde(default)]
    pub state: String,
    pub term: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Titles were only removed by dictionary lookup.
    Dictionary,
    /// A trailing comma block of titles was split off first.
    CommaBased,
    /// Nothing usable was left of the name.
    Failed,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Dictionary => "dictionary",
            ExtractionMethod::CommaBased => "comma_based",
            ExtractionMethod::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermStatus {
    Historical,
    Current,
}

/// A single resolved term in an identity's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermEntry {
    pub term: u32,
    pub party: String,
    pub party_full_name: String,
    pub constituency: String,
    pub constituency_code: Option<String>,
    pub constituency_name: String,
    pub state: String,
    pub status: TermStatus,
    /// Raw display name (titles included) as it appeared for this term.
    pub source_display_name: String,
    pub matched_confidence: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyChange {
    pub from_term: u32,
    pub to_term: u32,
    pub party: String,
    pub party_full_name: String,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HonorificAnalysis {
    pub all_discovered_honorifics: BTreeSet<String>,
    pub categorized_honorifics: BTreeMap<TitleCategory, Vec<String>>,
    pub original_name_variations: Vec<String>,
    pub extraction_method: ExtractionMethod,
}

/// Verbatim copy of the observation that first created an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSnapshot {
    pub original_name: String,
    pub original_constituency: String,
    pub original_party: String,
    pub original_state: String,
    pub term_number: u32,
}

impl From<&RawObservation> for HistoricalSnapshot {
    fn from(observation: &RawObservation) -> Self {
        Self {
            original_name: observation.display_name.clone(),
            original_constituency: observation.constituency_text.clone(),
            original_party: observation.party_text.clone(),
            original_state: observation.state.clone(),
            term_number: observation.term,
        }
    }
}

/// The canonical, persisted person. `current_*` mirror the history entry
/// with the highest term number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: String,
    pub canonical_name: String,
    pub display_name_with_titles: String,
    pub titles: BTreeSet<String>,
    pub history: Vec<TermEntry>,
    pub party_changes: Vec<PartyChange>,
    pub current_party: String,
    pub current_party_full_name: String,
    pub current_constituency: String,
    pub current_constituency_code: Option<String>,
    pub current_constituency_name: String,
    pub current_state: String,
    pub current_term: u32,
    pub current_status: TermStatus,
    pub honorific_analysis: HonorificAnalysis,
    pub historical_data: HistoricalSnapshot,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IdentityRecord {
    pub fn has_term(&self, term: u32) -> bool {
        self.history.iter().any(|entry| entry.term == term)
    }

    pub fn latest_entry(&self) -> Option<&TermEntry> {
        // Ties keep the earliest inserted entry; terms are unique anyway.
        self.history
            .iter()
            .fold(None, |best: Option<&TermEntry>, entry| match best {
                Some(b) if b.term >= entry.term => Some(b),
                _ => Some(entry),
            })
    }

    pub fn is_multi_term(&self) -> bool {
        self.history.len() > 1
    }
}
