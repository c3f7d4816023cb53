// src/matching/scorer.rs
use log::debug;

use crate::matching::fingerprint::decompose;
use crate::matching::similarity::{partial_ratio, ratio, token_sort_ratio};
use crate::models::matching::{
    Disqualification, NameFingerprint, Penalty, ScoreKind, ScoreOutcome, Similarities,
};
use crate::models::stats_models::MatchingStats;

pub const FIRST_TOKEN_FLOOR: f64 = 98.0;
pub const LAST_TOKEN_FLOOR: f64 = 95.0;
pub const FIRST_TOKEN_WEIGHT: f64 = 0.6;
pub const LAST_TOKEN_WEIGHT: f64 = 0.4;
pub const MAX_TOKEN_COUNT_GAP: usize = 1;
pub const MAX_SCORE: f64 = 100.0;

/// Scores two cleaned names. Hard rules run first and zero the score; an
/// exact (case-insensitive) match is always exactly 100.
pub fn score(a: &str, a_fp: &NameFingerprint, b: &str, b_fp: &NameFingerprint) -> ScoreOutcome {
    if a.trim().is_empty() || b.trim().is_empty() || a_fp.is_empty() || b_fp.is_empty() {
        return ScoreOutcome::disqualified(Disqualification::NoName);
    }

    if a_fp.gender.is_known() && b_fp.gender.is_known() && a_fp.gender != b_fp.gender {
        return ScoreOutcome::disqualified(Disqualification::GenderMismatch {
            left: a_fp.gender,
            right: b_fp.gender,
        });
    }

    let first_sim = ratio(
        &a_fp.first_token.to_lowercase(),
        &b_fp.first_token.to_lowercase(),
    );
    if first_sim < FIRST_TOKEN_FLOOR {
        return ScoreOutcome::disqualified(Disqualification::FirstTokenBelowFloor(first_sim));
    }

    let last_sim = ratio(
        &a_fp.last_token.to_lowercase(),
        &b_fp.last_token.to_lowercase(),
    );
    if last_sim < LAST_TOKEN_FLOOR {
        return ScoreOutcome::disqualified(Disqualification::LastTokenBelowFloor(last_sim));
    }

    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    if a_lower == b_lower {
        return ScoreOutcome {
            score: MAX_SCORE,
            reason: "Exact match".to_string(),
            kind: ScoreKind::ExactMatch,
        };
    }

    let similarities = Similarities {
        full: ratio(&a_lower, &b_lower),
        token_sort: token_sort_ratio(&a_lower, &b_lower),
        partial: partial_ratio(&a_lower, &b_lower),
        component: first_sim * FIRST_TOKEN_WEIGHT + last_sim * LAST_TOKEN_WEIGHT,
    };

    let mut penalties = Vec::new();
    let gap = a_fp.token_count.abs_diff(b_fp.token_count);
    if gap > MAX_TOKEN_COUNT_GAP {
        penalties.push(Penalty::TokenCountGap(gap));
    }
    if !a_fp.middle_tokens.is_empty()
        && !b_fp.middle_tokens.is_empty()
        && a_fp.middle_tokens.len() != b_fp.middle_tokens.len()
    {
        penalties.push(Penalty::MiddleNameCountMismatch {
            left: a_fp.middle_tokens.len(),
            right: b_fp.middle_tokens.len(),
        });
    }

    let penalized = penalties
        .iter()
        .fold(similarities.best(), |acc, penalty| acc * penalty.factor());

    let mut reason = format!(
        "Full:{}%, Token:{}%, Partial:{}%, Component:{:.1}%",
        similarities.full, similarities.token_sort, similarities.partial, similarities.component
    );
    if !penalties.is_empty() {
        let listed: Vec<String> = penalties.iter().map(|p| p.to_string()).collect();
        reason.push_str(&format!(" | Penalties: {}", listed.join(", ")));
    }

    ScoreOutcome {
        score: penalized.min(MAX_SCORE),
        reason,
        kind: ScoreKind::Weighted {
            similarities,
            penalties,
        },
    }
}

/// Convenience for callers holding plain names: fingerprints both sides first.
pub fn score_names(a: &str, b: &str) -> ScoreOutcome {
    score(a, &decompose(a), b, &decompose(b))
}

/// Adds one comparison outcome to the running counters.
pub fn tally_outcome(stats: &mut MatchingStats, outcome: &ScoreOutcome) {
    match &outcome.kind {
        ScoreKind::Disqualified(Disqualification::NoName) => return,
        ScoreKind::Disqualified(reason) => {
            debug!("Disqualified comparison: {}", reason);
            match reason {
                Disqualification::GenderMismatch { .. } => stats.gender_mismatches += 1,
                Disqualification::FirstTokenBelowFloor(_) => stats.first_token_failures += 1,
                Disqualification::LastTokenBelowFloor(_) => stats.last_token_failures += 1,
                Disqualification::NoName => {}
            }
        }
        ScoreKind::ExactMatch => stats.exact_matches += 1,
        ScoreKind::Weighted { penalties, .. } => stats.penalty_applications += penalties.len(),
    }
    stats.comparisons_attempted += 1;
}
