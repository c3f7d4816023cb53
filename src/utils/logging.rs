// src/utils/logging.rs - Logging helpers for identity resolution runs
use log::{debug, info, warn};
use std::time::Instant;

use crate::models::stats_models::{ObservationDecision, ObservationFailure, RunSummary};

const TAG: &str = "RESOLVE";
const EMOJI: &str = "🧬";

#[derive(Clone)]
pub struct ResolutionLogger {
    start_time: Instant,
}

impl Default for ResolutionLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionLogger {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, run_id: &str, observations: usize, identities: usize) {
        info!(
            "[{}] {} 🚀 Starting identity resolution (run ID: {}): {} observations against {} existing identities",
            TAG, EMOJI, run_id, observations, identities
        );
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed().as_secs_f32();
        match details {
            Some(details) => info!(
                "[{}] {} 🔄 Phase: {} - {} [+{:.1}s]",
                TAG, EMOJI, phase, details, elapsed
            ),
            None => info!("[{}] {} 🔄 Phase: {} [+{:.1}s]", TAG, EMOJI, phase, elapsed),
        }
    }

    pub fn log_dictionary_loaded(&self, titles: usize, seeded: bool) {
        if seeded {
            info!(
                "[{}] {} 📖 No stored title dictionary, starting from {} seed titles",
                TAG, EMOJI, titles
            );
        } else {
            info!(
                "[{}] {} 📖 Loaded title dictionary with {} titles",
                TAG, EMOJI, titles
            );
        }
    }

    pub fn log_match(&self, decision: &ObservationDecision, canonical_name: &str) {
        if decision.duplicate_term {
            debug!(
                "[{}] {} ⏭️  '{}' -> '{}' already has term {}",
                TAG, EMOJI, decision.comparison_name, canonical_name, decision.term
            );
        } else {
            info!(
                "[{}] {} 🔗 MATCH ({:.1}%): '{}' -> '{}' (term {})",
                TAG, EMOJI, decision.score, decision.comparison_name, canonical_name, decision.term
            );
            debug!("[{}] {}    Reason: {}", TAG, EMOJI, decision.reason);
        }
    }

    pub fn log_created(&self, decision: &ObservationDecision) {
        info!(
            "[{}] {} ✨ NEW ({:.1}%): '{}' (term {})",
            TAG, EMOJI, decision.score, decision.comparison_name, decision.term
        );
    }

    pub fn log_near_miss(&self, name: &str, best_score: f64, reason: &str) {
        info!(
            "[{}] {} 🎯 Near miss for '{}' at {:.1}%: {}",
            TAG, EMOJI, name, best_score, reason
        );
    }

    pub fn log_degraded(&self, display_name: &str) {
        warn!(
            "[{}] {} ⚠️  Could not clean '{}', using the raw name",
            TAG, EMOJI, display_name
        );
    }

    pub fn log_failure(&self, failure: &ObservationFailure) {
        warn!(
            "[{}] {} ❌ {:?} for '{}': {}",
            TAG, EMOJI, failure.kind, failure.display_name, failure.message
        );
    }

    pub fn log_completion(&self, summary: &RunSummary) {
        let duration = self.start_time.elapsed();
        info!(
            "[{}] {} 🎉 COMPLETED in {:.2?}: {} observations → {} matched, {} created, {} failed",
            TAG,
            EMOJI,
            duration,
            summary.observations_total,
            summary.matched,
            summary.created,
            summary.failed
        );
        info!(
            "[{}] {} 📊 Registry: {} identities, {} multi-term, {} with party changes",
            TAG,
            EMOJI,
            summary.identities_total,
            summary.multi_term_identities,
            summary.identities_with_party_changes
        );
        if summary.dictionary_discoveries_merged > 0 {
            info!(
                "[{}] {} 📖 {} new titles merged into the dictionary",
                TAG, EMOJI, summary.dictionary_discoveries_merged
            );
        }
        if !summary.unclassified_titles.is_empty() {
            warn!(
                "[{}] {} ⚠️  Unclassified titles not persisted: {:?}",
                TAG, EMOJI, summary.unclassified_titles
            );
        }
        if summary.degraded_extractions > 0 {
            warn!(
                "[{}] {} ⚠️  {} observations resolved on their raw name",
                TAG, EMOJI, summary.degraded_extractions
            );
        }
    }
}
