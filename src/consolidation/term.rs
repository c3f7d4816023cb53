// src/consolidation/term.rs
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::core::{RawObservation, TermEntry, TermStatus};

pub const UNKNOWN: &str = "UNKNOWN";

/// Coalition codes and the names they are reported under.
pub const PARTY_MAPPINGS: [(&str, &str); 10] = [
    ("PH", "Pakatan Harapan"),
    ("BN", "Barisan Nasional"),
    ("PN", "Perikatan Nasional"),
    ("GPS", "Gabungan Parti Sarawak"),
    ("GRS", "Gabungan Rakyat Sabah"),
    ("WARISAN", "Parti Warisan"),
    ("MUDA", "Malaysian United Democratic Alliance"),
    ("PBM", "Parti Bangsa Malaysia"),
    ("KDM", "Parti Kesejahteraan Demokratik Masyarakat"),
    ("BEBAS", "Independent"),
];

static CONSTITUENCY_CODE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"[pP]\d+").ok());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConstituency {
    pub code: Option<String>,
    pub name: String,
    pub full: String,
}

/// "P063 Tambun" -> code `P063`, name `Tambun`, full `P063 Tambun`.
pub fn parse_constituency(text: &str) -> ParsedConstituency {
    let text = text.trim();
    if text.is_empty() {
        return ParsedConstituency {
            code: None,
            name: UNKNOWN.to_string(),
            full: UNKNOWN.to_string(),
        };
    }

    match CONSTITUENCY_CODE.as_ref().and_then(|re| re.find(text)) {
        Some(found) => {
            let code = found.as_str().to_uppercase();
            let name = text[found.end()..].trim().to_string();
            let full = if name.is_empty() {
                code.clone()
            } else {
                format!("{} {}", code, name)
            };
            ParsedConstituency {
                code: Some(code),
                name,
                full,
            }
        }
        None => ParsedConstituency {
            code: None,
            name: text.to_string(),
            full: text.to_string(),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedParty {
    pub code: String,
    pub full_name: String,
}

/// "PH - DAP" -> coalition `PH` reported as "Pakatan Harapan".
pub fn parse_party(text: &str) -> ParsedParty {
    let upper = text.trim().to_uppercase();
    if upper.is_empty() {
        return ParsedParty {
            code: UNKNOWN.to_string(),
            full_name: UNKNOWN.to_string(),
        };
    }

    let coalition = match upper.split_once(" - ") {
        Some((head, _)) => head.trim(),
        None => upper.split('-').next().unwrap_or(&upper).trim(),
    };
    let coalition = if coalition.is_empty() { UNKNOWN } else { coalition };

    let full_name = PARTY_MAPPINGS
        .iter()
        .find(|(code, _)| *code == coalition)
        .map_or(coalition, |(_, name)| *name);

    ParsedParty {
        code: coalition.to_string(),
        full_name: full_name.to_string(),
    }
}

pub fn term_status(term: u32, current_term: u32) -> TermStatus {
    if term >= current_term {
        TermStatus::Current
    } else {
        TermStatus::Historical
    }
}

/// Builds the history entry an observation contributes to its identity.
pub fn build_term_entry(
    observation: &RawObservation,
    current_term: u32,
    matched_confidence: f64,
    recorded_at: DateTime<Utc>,
) -> TermEntry {
    let constituency = parse_constituency(&observation.constituency_text);
    let party = parse_party(&observation.party_text);
    let state = observation.state.trim();

    TermEntry {
        term: observation.term,
        party: party.code,
        party_full_name: party.full_name,
        constituency: constituency.full,
        constituency_code: constituency.code,
        constituency_name: constituency.name,
        state: if state.is_empty() {
            UNKNOWN.to_string()
        } else {
            state.to_string()
        },
        status: term_status(observation.term, current_term),
        source_display_name: observation.display_name.clone(),
        matched_confidence,
        recorded_at,
    }
}
