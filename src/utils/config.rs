// src/utils/config.rs
use log::info;
use std::env;

pub const DEFAULT_CURRENT_TERM: u32 = 15;
pub const DEFAULT_NEAR_MISS_FLOOR: f64 = 80.0;
pub const DEFAULT_PREPARE_WORKERS: usize = 4;
pub const DEFAULT_DICTIONARY_ID: &str = "honorific_dictionary";

/// Run-level knobs. Matching thresholds are constants and live in `matching`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionConfig {
    /// Terms at or above this number are recorded as `current`.
    pub current_term: u32,
    /// Rejected best scores above this are logged as near misses.
    pub near_miss_floor: f64,
    pub prepare_workers: usize,
    pub dictionary_key: String,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            current_term: DEFAULT_CURRENT_TERM,
            near_miss_floor: DEFAULT_NEAR_MISS_FLOOR,
            prepare_workers: DEFAULT_PREPARE_WORKERS,
            dictionary_key: DEFAULT_DICTIONARY_ID.to_string(),
        }
    }
}

impl ResolutionConfig {
    pub fn from_env() -> Self {
        Self {
            current_term: env::var("CURRENT_PARLIAMENT_TERM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CURRENT_TERM),
            near_miss_floor: env::var("NEAR_MISS_LOG_FLOOR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_NEAR_MISS_FLOOR),
            prepare_workers: env::var("PREPARE_WORKERS")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|workers| *workers > 0)
                .unwrap_or(DEFAULT_PREPARE_WORKERS),
            dictionary_key: env::var("TITLE_DICTIONARY_ID")
                .ok()
                .filter(|key| !key.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DICTIONARY_ID.to_string()),
        }
    }

    pub fn log_config(&self) {
        info!(
            "Resolution config: current term={}, near-miss floor={}, prepare workers={}, dictionary='{}'",
            self.current_term, self.near_miss_floor, self.prepare_workers, self.dictionary_key
        );
    }
}
