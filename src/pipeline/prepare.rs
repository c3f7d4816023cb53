// src/pipeline/prepare.rs
//! Extraction and fingerprinting, which depend only on the observation and a
//! frozen dictionary, so they run on a bounded pool of blocking workers.

use anyhow::{Context, Result};
use futures::future::join_all;
use log::debug;
use std::sync::Arc;

use crate::consolidation::term::parse_constituency;
use crate::honorifics::extractor::{ExtractionOutcome, HonorificExtractor};
use crate::matching::fingerprint::decompose;
use crate::models::core::RawObservation;
use crate::models::matching::NameFingerprint;

#[derive(Debug, Clone)]
pub struct PreparedObservation {
    /// Position in the input, used as the within-term tie-break.
    pub index: usize,
    pub raw: RawObservation,
    pub extraction: ExtractionOutcome,
    /// Name used for scoring and, for new identities, as the canonical name.
    /// Empty when there was nothing usable at all.
    pub comparison_name: String,
    /// Extraction failed and `comparison_name` is the raw display name.
    pub degraded: bool,
    pub fingerprint: NameFingerprint,
    pub constituency_code: Option<String>,
}

impl PreparedObservation {
    pub fn is_unusable(&self) -> bool {
        self.comparison_name.is_empty()
    }
}

pub fn prepare_one(
    extractor: &HonorificExtractor,
    index: usize,
    raw: RawObservation,
) -> PreparedObservation {
    let extraction = extractor.extract(&raw.display_name);
    let (comparison_name, degraded) = match extraction.best_name() {
        Some(name) => (name.to_string(), false),
        None => {
            let fallback = raw.display_name.split_whitespace().collect::<Vec<_>>().join(" ");
            let degraded = !fallback.is_empty();
            (fallback, degraded)
        }
    };
    let fingerprint = decompose(&comparison_name);
    let constituency_code = parse_constituency(&raw.constituency_text).code;

    PreparedObservation {
        index,
        raw,
        extraction,
        comparison_name,
        degraded,
        fingerprint,
        constituency_code,
    }
}

/// Prepares every observation on at most `workers` blocking tasks. Output
/// order matches input order.
pub async fn prepare_all(
    extractor: Arc<HonorificExtractor>,
    observations: Vec<RawObservation>,
    workers: usize,
) -> Result<Vec<PreparedObservation>> {
    if observations.is_empty() {
        return Ok(Vec::new());
    }
    let workers = workers.max(1);
    let chunk_size = (observations.len() + workers - 1) / workers;

    let mut chunks: Vec<Vec<(usize, RawObservation)>> = Vec::new();
    let mut current = Vec::with_capacity(chunk_size);
    for item in observations.into_iter().enumerate() {
        current.push(item);
        if current.len() == chunk_size {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    debug!(
        "Preparing observations in {} chunks of up to {}",
        chunks.len(),
        chunk_size
    );

    let handles = chunks.into_iter().map(|chunk| {
        let extractor = Arc::clone(&extractor);
        tokio::task::spawn_blocking(move || {
            chunk
                .into_iter()
                .map(|(index, raw)| prepare_one(&extractor, index, raw))
                .collect::<Vec<_>>()
        })
    });

    let mut prepared = Vec::new();
    for result in join_all(handles).await {
        prepared.extend(result.context("Observation preparation worker panicked")?);
    }
    Ok(prepared)
}
