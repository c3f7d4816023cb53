// src/models/matching.rs
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::stats_models::MatchingStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

impl Gender {
    pub fn is_known(&self) -> bool {
        !matches!(self, Gender::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Unknown => "unknown",
        }
    }
}

/// Patronymic connector found inside a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connector {
    #[serde(rename = "bin")]
    Bin,
    #[serde(rename = "binti")]
    Binti,
    #[serde(rename = "a/l")]
    AnakLelaki,
    #[serde(rename = "a/p")]
    AnakPerempuan,
    #[serde(rename = "anak")]
    Anak,
    #[serde(rename = "")]
    None,
}

impl Connector {
    pub const ALL: [Connector; 5] = [
        Connector::Bin,
        Connector::Binti,
        Connector::AnakLelaki,
        Connector::AnakPerempuan,
        Connector::Anak,
    ];

    pub fn from_token(token: &str) -> Option<Connector> {
        let lower = token.to_lowercase();
        Connector::ALL
            .iter()
            .copied()
            .find(|connector| connector.as_str() == lower)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Connector::Bin => "bin",
            Connector::Binti => "binti",
            Connector::AnakLelaki => "a/l",
            Connector::AnakPerempuan => "a/p",
            Connector::Anak => "anak",
            Connector::None => "",
        }
    }

    pub fn implied_gender(&self) -> Gender {
        match self {
            Connector::Bin | Connector::AnakLelaki => Gender::Male,
            Connector::Binti | Connector::AnakPerempuan => Gender::Female,
            Connector::Anak | Connector::None => Gender::Unknown,
        }
    }
}

/// Structural decomposition of a cleaned name. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameFingerprint {
    pub first_token: String,
    pub last_token: String,
    pub middle_tokens: Vec<String>,
    pub connector: Connector,
    pub gender: Gender,
    pub token_count: usize,
}

impl NameFingerprint {
    pub fn empty() -> Self {
        Self {
            first_token: String::new(),
            last_token: String::new(),
            middle_tokens: Vec::new(),
            connector: Connector::None,
            gender: Gender::Unknown,
            token_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.token_count == 0
    }
}

/// The four component similarities of a weighted comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Similarities {
    pub full: f64,
    pub token_sort: f64,
    pub partial: f64,
    pub component: f64,
}

impl Similarities {
    pub fn best(&self) -> f64 {
        self.full
            .max(self.token_sort)
            .max(self.partial)
            .max(self.component)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Penalty {
    TokenCountGap(usize),
    MiddleNameCountMismatch { left: usize, right: usize },
}

impl Penalty {
    pub fn factor(&self) -> f64 {
        match self {
            Penalty::TokenCountGap(_) => 0.85,
            Penalty::MiddleNameCountMismatch { .. } => 0.9,
        }
    }
}

impl fmt::Display for Penalty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Penalty::TokenCountGap(gap) => write!(f, "Length diff: {}", gap),
            Penalty::MiddleNameCountMismatch { left, right } => {
                write!(f, "Middle name count mismatch ({} vs {})", left, right)
            }
        }
    }
}

/// Hard rules that zero a score before any weighting happens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Disqualification {
    NoName,
    GenderMismatch { left: Gender, right: Gender },
    FirstTokenBelowFloor(f64),
    LastTokenBelowFloor(f64),
}

impl fmt::Display for Disqualification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disqualification::NoName => write!(f, "No name provided"),
            Disqualification::GenderMismatch { left, right } => {
                write!(f, "Gender mismatch: {} vs {}", left.as_str(), right.as_str())
            }
            Disqualification::FirstTokenBelowFloor(sim) => {
                write!(f, "First name below 98%: {}%", sim)
            }
            Disqualification::LastTokenBelowFloor(sim) => {
                write!(f, "Last name below 95%: {}%", sim)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ScoreKind {
    Disqualified(Disqualification),
    ExactMatch,
    Weighted {
        similarities: Similarities,
        penalties: Vec<Penalty>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreOutcome {
    pub score: f64,
    pub reason: String,
    pub kind: ScoreKind,
}

impl ScoreOutcome {
    pub fn disqualified(reason: Disqualification) -> Self {
        Self {
            score: 0.0,
            reason: reason.to_string(),
            kind: ScoreKind::Disqualified(reason),
        }
    }

    pub fn is_disqualified(&self) -> bool {
        matches!(self.kind, ScoreKind::Disqualified(_))
    }
}

/// Result of scanning the candidate snapshot for one observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Index into the candidate slice of the accepted match, if any.
    pub matched_index: Option<usize>,
    /// Index of the best-scoring candidate even when it was rejected.
    pub best_index: Option<usize>,
    pub best_score: f64,
    pub reason: String,
    /// Counters for every comparison made during the scan.
    pub tally: MatchingStats,
}

impl Resolution {
    pub fn is_match(&self) -> bool {
        self.matched_index.is_some()
    }

    pub fn matched<'a, T>(&self, candidates: &'a [T]) -> Option<&'a T> {
        self.matched_index.and_then(|idx| candidates.get(idx))
    }
}
