// src/matching/mod.rs
pub mod fingerprint;
pub mod resolver;
pub mod scorer;
pub mod similarity;

pub use fingerprint::decompose;
pub use resolver::{meets_acceptance_threshold, resolve, MatchCandidate, ACCEPTANCE_THRESHOLD};
pub use scorer::{score, score_names};
