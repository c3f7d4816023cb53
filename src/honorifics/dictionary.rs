// src/honorifics/dictionary.rs
//! Categorised set of known honorifics, plus the document it is persisted as.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::models::stats_models::ExtractionStats;

pub const DICTIONARY_VERSION: &str = "3.0_enhanced";
pub const DICTIONARY_SOURCE: &str = "Historical + current parliament rosters";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleCategory {
    RoyalNobleTitles,
    DatukTitles,
    ParliamentaryTitles,
    ProfessionalTitles,
    ReligiousTitles,
    MilitaryTitles,
    GenderTitles,
    RegionalTitles,
}

impl TitleCategory {
    /// Classification precedence order.
    pub const ALL: [TitleCategory; 8] = [
        TitleCategory::RoyalNobleTitles,
        TitleCategory::DatukTitles,
        TitleCategory::ParliamentaryTitles,
        TitleCategory::ProfessionalTitles,
        TitleCategory::ReligiousTitles,
        TitleCategory::MilitaryTitles,
        TitleCategory::GenderTitles,
        TitleCategory::RegionalTitles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TitleCategory::RoyalNobleTitles => "royal_noble_titles",
            TitleCategory::DatukTitles => "datuk_titles",
            TitleCategory::ParliamentaryTitles => "parliamentary_titles",
            TitleCategory::ProfessionalTitles => "professional_titles",
            TitleCategory::ReligiousTitles => "religious_titles",
            TitleCategory::MilitaryTitles => "military_titles",
            TitleCategory::GenderTitles => "gender_titles",
            TitleCategory::RegionalTitles => "regional_titles",
        }
    }

    pub fn from_key(key: &str) -> Option<TitleCategory> {
        TitleCategory::ALL
            .iter()
            .copied()
            .find(|category| category.as_str() == key)
    }
}

impl fmt::Display for TitleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum KeywordMode {
    Contains,
    Exact,
}

struct KeywordRule {
    category: TitleCategory,
    mode: KeywordMode,
    keywords: &'static [&'static str],
}

// Evaluated top to bottom; the first hit wins.
const KEYWORD_RULES: [KeywordRule; 9] = [
    KeywordRule {
        category: TitleCategory::RoyalNobleTitles,
        mode: KeywordMode::Contains,
        keywords: &[
            "yab", "yang amat berhormat", "tan sri", "tan seri", "tun", "tengku", "tunku",
            "tuanku",
        ],
    },
    KeywordRule {
        category: TitleCategory::DatukTitles,
        mode: KeywordMode::Contains,
        keywords: &[
            "dato", "dato'", "datuk", "dato seri", "dato' seri", "dato sri", "dato' sri",
            "datuk seri", "datuk sri",
        ],
    },
    // Left behind on their own when "Dato" is written without an apostrophe.
    KeywordRule {
        category: TitleCategory::DatukTitles,
        mode: KeywordMode::Exact,
        keywords: &["seri", "sri"],
    },
    KeywordRule {
        category: TitleCategory::ParliamentaryTitles,
        mode: KeywordMode::Exact,
        keywords: &["yb", "yang berhormat"],
    },
    KeywordRule {
        category: TitleCategory::ProfessionalTitles,
        mode: KeywordMode::Exact,
        keywords: &["ir", "ir.", "ts", "ts.", "dr", "dr.", "prof", "prof."],
    },
    KeywordRule {
        category: TitleCategory::ReligiousTitles,
        mode: KeywordMode::Contains,
        keywords: &[
            "haji", "hajah", "sheikh", "syeikh", "ustaz", "ustazah", "hajjah", "hj.",
        ],
    },
    KeywordRule {
        category: TitleCategory::MilitaryTitles,
        mode: KeywordMode::Contains,
        keywords: &[
            "kapten", "komander", "general", "admiral", "colonel", "major", "brigadier",
        ],
    },
    KeywordRule {
        category: TitleCategory::GenderTitles,
        mode: KeywordMode::Exact,
        keywords: &["tuan", "puan", "encik", "cik"],
    },
    KeywordRule {
        category: TitleCategory::RegionalTitles,
        mode: KeywordMode::Contains,
        keywords: &["panglima", "wira", "indera", "paduka", "utama"],
    },
];

/// Titles the engine starts from when no dictionary has been persisted yet.
pub const SEED_TITLES: &[&str] = &[
    "YB", "YAB", "Yang Berhormat", "Yang Amat Berhormat", "Tan Sri", "Tun", "Tengku", "Tunku",
    "Dato", "Dato'", "Datuk", "Dato' Sri", "Dato' Seri", "Dato Sri", "Dato Seri", "Datuk Seri",
    "Datuk Sri", "Seri", "Sri", "Dr", "Dr.", "Prof", "Ir", "Ts", "Haji", "Hajah", "Hajjah",
    "Hj.", "Ustaz", "Tuan", "Puan", "Kapten",
];

pub fn normalize_apostrophes(text: &str) -> String {
    text.replace(['\u{2019}', '\u{2018}', '`'], "'")
}

/// Keyword-membership classification, in `TitleCategory::ALL` order.
pub fn classify(title: &str) -> Option<TitleCategory> {
    let lower = normalize_apostrophes(title).to_lowercase();
    let lower = lower.trim();
    KEYWORD_RULES
        .iter()
        .find(|rule| match rule.mode {
            KeywordMode::Contains => rule.keywords.iter().any(|kw| lower.contains(kw)),
            KeywordMode::Exact => rule.keywords.iter().any(|kw| lower == *kw),
        })
        .map(|rule| rule.category)
}

/// Group titles by category; unclassifiable titles are dropped.
pub fn categorize<'a, I>(titles: I) -> BTreeMap<TitleCategory, Vec<String>>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut categorized: BTreeMap<TitleCategory, Vec<String>> = BTreeMap::new();
    for title in titles {
        if let Some(category) = classify(title) {
            let bucket = categorized.entry(category).or_default();
            if !bucket.contains(title) {
                bucket.push(title.clone());
            }
        }
    }
    categorized
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub added: Vec<(TitleCategory, String)>,
    pub unclassified: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TitleDictionary {
    categories: BTreeMap<TitleCategory, BTreeSet<String>>,
}

impl TitleDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed() -> Self {
        let mut dictionary = Self::new();
        for title in SEED_TITLES {
            dictionary.insert_classified(title);
        }
        dictionary
    }

    /// Builds a dictionary from explicit (category, title) pairs.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (TitleCategory, S)>,
        S: Into<String>,
    {
        let mut dictionary = Self::new();
        for (category, title) in entries {
            dictionary.insert(category, title.into());
        }
        dictionary
    }

    pub fn from_document(document: &TitleDictionaryDocument) -> Self {
        let mut dictionary = Self::new();
        for (key, titles) in &document.categories {
            match TitleCategory::from_key(key) {
                Some(category) => {
                    for title in titles {
                        dictionary.insert(category, title.clone());
                    }
                }
                None => warn!(
                    "Ignoring {} titles under unknown dictionary category '{}'",
                    titles.len(),
                    key
                ),
            }
        }
        debug!("Loaded title dictionary with {} titles", dictionary.len());
        dictionary
    }

    pub fn insert(&mut self, category: TitleCategory, title: String) -> bool {
        let title = title.trim().to_string();
        if title.is_empty() {
            return false;
        }
        self.categories.entry(category).or_default().insert(title)
    }

    pub fn insert_classified(&mut self, title: &str) -> Option<TitleCategory> {
        let category = classify(title)?;
        self.insert(category, title.to_string());
        Some(category)
    }

    pub fn contains(&self, title: &str) -> bool {
        self.categories.values().any(|set| set.contains(title))
    }

    pub fn titles(&self) -> impl Iterator<Item = &String> {
        self.categories.values().flat_map(|set| set.iter())
    }

    pub fn titles_in(&self, category: TitleCategory) -> Option<&BTreeSet<String>> {
        self.categories.get(&category)
    }

    pub fn len(&self) -> usize {
        self.categories.values().map(|set| set.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unions discoveries into their classified category. Titles that fit no
    /// category are reported back, not stored.
    pub fn merge_discoveries(&mut self, discoveries: &[String]) -> MergeReport {
        let mut report = MergeReport::default();
        for title in discoveries {
            match classify(title) {
                Some(category) => {
                    if self.insert(category, title.clone()) {
                        report.added.push((category, title.clone()));
                    }
                }
                None => report.unclassified.push(title.clone()),
            }
        }
        report
    }

    pub fn to_document(
        &self,
        updated_at: DateTime<Utc>,
        new_discoveries: usize,
        extraction_statistics: ExtractionStats,
    ) -> TitleDictionaryDocument {
        TitleDictionaryDocument {
            version: DICTIONARY_VERSION.to_string(),
            source: DICTIONARY_SOURCE.to_string(),
            updated_at,
            total_honorifics: self.len(),
            categories: self
                .categories
                .iter()
                .map(|(category, titles)| {
                    (category.as_str().to_string(), titles.iter().cloned().collect())
                })
                .collect(),
            new_discoveries_this_session: new_discoveries,
            extraction_statistics,
        }
    }
}

/// Shape of the single persisted dictionary document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleDictionaryDocument {
    pub version: String,
    pub source: String,
    pub updated_at: DateTime<Utc>,
    pub total_honorifics: usize,
    pub categories: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub new_discoveries_this_session: usize,
    #[serde(default)]
    pub extraction_statistics: ExtractionStats,
}
