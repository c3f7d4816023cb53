// src/consolidation/history.rs
//! Merges term observations into an identity's permanent history.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::honorifics::dictionary::categorize;
use crate::models::core::{
    ExtractionMethod, HistoricalSnapshot, HonorificAnalysis, IdentityRecord, PartyChange,
    RawObservation, TermEntry,
};

/// Fields `consolidate` may touch. Everything else is fixed at creation.
pub const CONSOLIDATED_FIELDS: [&str; 14] = [
    "display_name_with_titles",
    "titles",
    "history",
    "party_changes",
    "current_party",
    "current_party_full_name",
    "current_constituency",
    "current_constituency_code",
    "current_constituency_name",
    "current_state",
    "current_term",
    "current_status",
    "honorific_analysis",
    "updated_at",
];

/// One observation, already parsed, ready to be folded into an identity.
#[derive(Debug, Clone, PartialEq)]
pub struct TermObservation {
    pub entry: TermEntry,
    pub titles: Vec<String>,
    pub extraction_method: ExtractionMethod,
}

/// Appends `observation` to the identity's history. Returns false when the
/// term is already recorded; titles and name variations are merged either way.
pub fn consolidate(
    identity: &mut IdentityRecord,
    observation: &TermObservation,
    now: DateTime<Utc>,
) -> bool {
    let entry = &observation.entry;
    let titles_changed = merge_titles(identity, observation);

    if identity.has_term(entry.term) {
        debug!(
            "Identity {} already has term {}, history unchanged",
            identity.id, entry.term
        );
        if titles_changed {
            identity.updated_at = now;
        }
        return false;
    }

    let previous = identity.history.last().map(|last| {
        let party = identity
            .party_changes
            .last()
            .map_or(last.party.as_str(), |change| change.party.as_str());
        (last.term, party.to_string())
    });
    if let Some((from_term, previous_party)) = previous {
        if previous_party != entry.party {
            info!(
                "Party change for {}: {} -> {} (term {} -> {})",
                identity.canonical_name, previous_party, entry.party, from_term, entry.term
            );
            identity.party_changes.push(PartyChange {
                from_term,
                to_term: entry.term,
                party: entry.party.clone(),
                party_full_name: entry.party_full_name.clone(),
                detected_at: now,
            });
        }
    }

    identity.history.push(entry.clone());
    refresh_current_fields(identity);
    if identity.current_term == entry.term {
        identity.honorific_analysis.extraction_method = observation.extraction_method;
    }
    identity.updated_at = now;
    true
}

fn merge_titles(identity: &mut IdentityRecord, observation: &TermObservation) -> bool {
    let mut changed = false;
    for title in &observation.titles {
        changed |= identity.titles.insert(title.clone());
        changed |= identity
            .honorific_analysis
            .all_discovered_honorifics
            .insert(title.clone());
    }
    if changed {
        identity.honorific_analysis.categorized_honorifics =
            categorize(identity.honorific_analysis.all_discovered_honorifics.iter());
    }

    let name = &observation.entry.source_display_name;
    let variations = &mut identity.honorific_analysis.original_name_variations;
    if !variations.contains(name) {
        variations.push(name.clone());
        changed = true;
    }
    changed
}

/// Mirrors the highest-term history entry into the `current_*` fields.
pub fn refresh_current_fields(identity: &mut IdentityRecord) {
    let Some(latest) = identity.latest_entry().cloned() else {
        return;
    };
    identity.display_name_with_titles = latest.source_display_name;
    identity.current_party = latest.party;
    identity.current_party_full_name = latest.party_full_name;
    identity.current_constituency = latest.constituency;
    identity.current_constituency_code = latest.constituency_code;
    identity.current_constituency_name = latest.constituency_name;
    identity.current_state = latest.state;
    identity.current_term = latest.term;
    identity.current_status = latest.status;
}

/// Starts a new identity whose history is exactly this one observation.
pub fn create_identity(
    source: &RawObservation,
    canonical_name: &str,
    observation: &TermObservation,
    now: DateTime<Utc>,
) -> IdentityRecord {
    let entry = observation.entry.clone();
    let titles: BTreeSet<String> = observation.titles.iter().cloned().collect();
    let categorized: BTreeMap<_, _> = categorize(titles.iter());

    let mut identity = IdentityRecord {
        id: Uuid::new_v4().to_string(),
        canonical_name: canonical_name.to_string(),
        display_name_with_titles: entry.source_display_name.clone(),
        titles: titles.clone(),
        history: vec![entry],
        party_changes: Vec::new(),
        current_party: String::new(),
        current_party_full_name: String::new(),
        current_constituency: String::new(),
        current_constituency_code: None,
        current_constituency_name: String::new(),
        current_state: String::new(),
        current_term: 0,
        current_status: observation.entry.status,
        honorific_analysis: HonorificAnalysis {
            all_discovered_honorifics: titles,
            categorized_honorifics: categorized,
            original_name_variations: vec![source.display_name.clone()],
            extraction_method: observation.extraction_method,
        },
        historical_data: HistoricalSnapshot::from(source),
        created_at: now,
        updated_at: now,
    };
    refresh_current_fields(&mut identity);
    identity
}

/// The `$set`-style partial document persisted after a consolidation.
pub fn consolidation_patch(identity: &IdentityRecord) -> Result<Map<String, Value>> {
    let value = serde_json::to_value(identity)
        .with_context(|| format!("Failed to serialize identity {}", identity.id))?;
    let Value::Object(mut document) = value else {
        anyhow::bail!("Identity {} did not serialize to an object", identity.id);
    };

    Ok(CONSOLIDATED_FIELDS
        .iter()
        .filter_map(|field| {
            document
                .remove(*field)
                .map(|value| (field.to_string(), value))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidation::term::build_term_entry;
    use crate::models::core::TermStatus;

    fn observation(name: &str, party: &str, constituency: &str, term: u32) -> RawObservation {
        RawObservation {
            display_name: name.to_string(),
            constituency_text: constituency.to_string(),
            party_text: party.to_string(),
            state: "Pulau Pinang".to_string(),
            term,
        }
    }

    fn term_observation(raw: &RawObservation, titles: &[&str]) -> TermObservation {
        TermObservation {
            entry: build_term_entry(raw, 15, 100.0, Utc::now()),
            titles: titles.iter().map(|t| t.to_string()).collect(),
            extraction_method: ExtractionMethod::Dictionary,
        }
    }

    fn new_identity(raw: &RawObservation, titles: &[&str]) -> IdentityRecord {
        create_identity(raw, "Lim Guan Eng", &term_observation(raw, titles), Utc::now())
    }

    #[test]
    fn test_create_identity_mirrors_first_entry() {
        let raw = observation("YB Lim Guan Eng", "PH - DAP", "P045 Bagan", 14);
        let identity = new_identity(&raw, &["YB"]);

        assert_eq!(identity.history.len(), 1);
        assert!(identity.party_changes.is_empty());
        assert_eq!(identity.current_term, 14);
        assert_eq!(identity.current_party, "PH");
        assert_eq!(identity.current_constituency_code.as_deref(), Some("P045"));
        assert_eq!(identity.current_status, TermStatus::Historical);
        assert_eq!(identity.display_name_with_titles, "YB Lim Guan Eng");
        assert_eq!(identity.historical_data.original_party, "PH - DAP");
        assert!(identity.titles.contains("YB"));
        assert!(!identity.id.is_empty());
    }

    #[test]
    fn test_duplicate_term_is_noop_for_history() {
        let raw = observation("YB Lim Guan Eng", "PH", "P045 Bagan", 14);
        let mut identity = new_identity(&raw, &["YB"]);
        let before = identity.history.clone();

        let again = observation("Tuan Lim Guan Eng", "PN", "P046 Batu Kawan", 14);
        let changed = consolidate(&mut identity, &term_observation(&again, &["Tuan"]), Utc::now());

        assert!(!changed);
        assert_eq!(identity.history, before);
        assert!(identity.party_changes.is_empty());
        assert_eq!(identity.current_constituency_code.as_deref(), Some("P045"));
        // title vocabulary still grows
        assert!(identity.titles.contains("Tuan"));
        assert!(identity
            .honorific_analysis
            .original_name_variations
            .contains(&"Tuan Lim Guan Eng".to_string()));
    }

    #[test]
    fn test_party_change_recorded_once() {
        let first = observation("Lim Guan Eng", "PH", "P045 Bagan", 13);
        let mut identity = new_identity(&first, &[]);

        assert!(consolidate(
            &mut identity,
            &term_observation(&observation("Lim Guan Eng", "PH", "P045 Bagan", 14), &[]),
            Utc::now()
        ));
        assert!(identity.party_changes.is_empty());

        assert!(consolidate(
            &mut identity,
            &term_observation(&observation("Lim Guan Eng", "BN", "P045 Bagan", 15), &[]),
            Utc::now()
        ));
        assert_eq!(identity.party_changes.len(), 1);
        let change = &identity.party_changes[0];
        assert_eq!(change.from_term, 14);
        assert_eq!(change.to_term, 15);
        assert_eq!(change.party, "BN");
        assert_eq!(change.party_full_name, "Barisan Nasional");

        assert_eq!(identity.current_party, "BN");
        assert_eq!(identity.current_status, TermStatus::Current);
    }

    #[test]
    fn test_change_reference_is_latest_change() {
        let mut identity = new_identity(&observation("Lim Guan Eng", "PH", "", 12), &[]);
        for (party, term) in [("BN", 13), ("BN", 14), ("PH", 15)] {
            consolidate(
                &mut identity,
                &term_observation(&observation("Lim Guan Eng", party, "", term), &[]),
                Utc::now(),
            );
        }
        let parties: Vec<&str> = identity.party_changes.iter().map(|c| c.party.as_str()).collect();
        assert_eq!(parties, vec!["BN", "PH"]);
    }

    #[test]
    fn test_backfilled_older_term_keeps_current_fields() {
        let latest = observation("YB Lim Guan Eng", "PH", "P045 Bagan", 14);
        let mut identity = new_identity(&latest, &[]);

        let older = observation("Lim Guan Eng", "DAP", "P048 Kota Melaka", 8);
        assert!(consolidate(&mut identity, &term_observation(&older, &[]), Utc::now()));

        assert_eq!(identity.history.len(), 2);
        assert_eq!(identity.current_term, 14);
        assert_eq!(identity.current_constituency_code.as_deref(), Some("P045"));
        assert_eq!(identity.display_name_with_titles, "YB Lim Guan Eng");
    }

    #[test]
    fn test_patch_contains_only_consolidated_fields() {
        let raw = observation("YB Lim Guan Eng", "PH", "P045 Bagan", 14);
        let identity = new_identity(&raw, &["YB"]);
        let patch = consolidation_patch(&identity).unwrap();

        assert_eq!(patch.len(), CONSOLIDATED_FIELDS.len());
        assert!(patch.contains_key("history"));
        assert!(!patch.contains_key("id"));
        assert!(!patch.contains_key("canonical_name"));
        assert!(!patch.contains_key("created_at"));
        assert_eq!(patch["current_term"], Value::from(14));
    }
}
