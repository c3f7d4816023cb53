// src/honorifics/extractor.rs
//! Strips honorifics from raw roster names and standardizes what is left.
//!
//! Extraction is a pure read of the dictionary: titles that the dictionary does
//! not know yet come back in `ExtractionOutcome::discoveries` and it is up to
//! the caller to merge them at a checkpoint.

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::honorifics::dictionary::{normalize_apostrophes, TitleDictionary};
use crate::models::core::ExtractionMethod;
use crate::models::stats_models::ExtractionStats;

/// A common Chinese surname that is also the first half of "Tan Sri". It is
/// only ever a title inside that compound.
pub const AMBIGUOUS_CLAN_TOKEN: &str = "tan";

pub const LOWERCASE_CONNECTORS: [&str; 18] = [
    "bin", "binti", "a/l", "a/p", "anak", "de", "da", "van", "von", "al", "el", "del", "di", "du",
    "le", "la", "abu", "ibn",
];

const TOKEN_TRIM_CHARS: &[char] = &[
    '(', ')', ',', '.', '\'', '"', '\u{2018}', '\u{2019}', '\u{201c}', '\u{201d}',
];
const BRACKET_TRIM_CHARS: &[char] = &['(', ')', ',', '"', '\u{201c}', '\u{201d}'];

/// Single comma-block tokens that are titles even when the dictionary has
/// never seen them.
static COMPOUND_TITLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)tan\s+sri",
        r"(?i)dato'\s*sri",
        r"(?i)datuk\s+sri",
        r"(?i)yang\s+berhormat",
        r"(?i)yang\s+amat\s+berhormat",
    ]
    .iter()
    .filter_map(|pattern| match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("Invalid compound title pattern '{}': {}", pattern, e);
            None
        }
    })
    .collect()
});

/// Multi-word titles recognised inside a comma block before it is tokenized.
static COMMA_BLOCK_COMPOUNDS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("Yang Amat Berhormat", r"(?i)\byang\s+amat\s+berhormat\b"),
        ("Yang Berhormat", r"(?i)\byang\s+berhormat\b"),
        ("Dato' Seri", r"(?i)\bdato'?\s+seri\b"),
        ("Dato' Sri", r"(?i)\bdato'?\s+sri\b"),
        ("Datuk Seri", r"(?i)\bdatuk\s+seri\b"),
        ("Datuk Sri", r"(?i)\bdatuk\s+sri\b"),
        ("Tan Sri", r"(?i)\btan'?\s+s(?:e)?ri\b"),
    ]
    .iter()
    .filter_map(|(title, pattern)| match Regex::new(pattern) {
        Ok(re) => Some((*title, re)),
        Err(e) => {
            warn!("Invalid comma compound pattern '{}': {}", pattern, e);
            None
        }
    })
    .collect()
});

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutcome {
    pub original_name: String,
    pub cleaned_name: Option<String>,
    pub standardized_name: Option<String>,
    /// Extracted titles in discovery order, deduplicated.
    pub titles: Vec<String>,
    pub method: ExtractionMethod,
    /// Titles from `titles` that the dictionary did not contain.
    pub discoveries: Vec<String>,
    /// How many times the clan-name token was refused as a standalone title.
    pub ambiguous_rejections: usize,
}

impl ExtractionOutcome {
    fn failed(original_name: &str) -> Self {
        Self {
            original_name: original_name.to_string(),
            cleaned_name: None,
            standardized_name: None,
            titles: Vec::new(),
            method: ExtractionMethod::Failed,
            discoveries: Vec::new(),
            ambiguous_rejections: 0,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.method == ExtractionMethod::Failed
    }

    /// Name to compare with: standardized, else cleaned, else nothing.
    pub fn best_name(&self) -> Option<&str> {
        self.standardized_name
            .as_deref()
            .or(self.cleaned_name.as_deref())
    }

    pub fn stats(&self) -> ExtractionStats {
        ExtractionStats {
            total_extractions: 1,
            comma_based_extractions: usize::from(self.method == ExtractionMethod::CommaBased),
            ambiguous_token_rejections: self.ambiguous_rejections,
            formatting_standardizations: usize::from(self.standardized_name.is_some()),
            failed_extractions: usize::from(self.is_failed()),
        }
    }
}

enum CommaToken {
    Title(String),
    AmbiguousClanToken,
    NotATitle,
}

struct RemovalPattern {
    title: String,
    regex: Regex,
}

pub struct HonorificExtractor {
    known: HashSet<String>,
    removal_patterns: Vec<RemovalPattern>,
}

impl HonorificExtractor {
    pub fn new(dictionary: &TitleDictionary) -> Self {
        let known: HashSet<String> = dictionary.titles().cloned().collect();

        let mut ordered: Vec<&String> = known.iter().collect();
        // Longest first so "Dato' Sri" is removed before "Dato" can shadow it.
        ordered.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));

        let removal_patterns = ordered
            .into_iter()
            .filter(|title| title.to_lowercase() != AMBIGUOUS_CLAN_TOKEN)
            .filter_map(|title| match Regex::new(&removal_pattern(title)) {
                Ok(regex) => Some(RemovalPattern {
                    title: title.clone(),
                    regex,
                }),
                Err(e) => {
                    warn!("Skipping title '{}' with unusable pattern: {}", title, e);
                    None
                }
            })
            .collect();

        Self {
            known,
            removal_patterns,
        }
    }

    pub fn knows(&self, title: &str) -> bool {
        self.known.contains(title)
    }

    pub fn extract(&self, raw_name: &str) -> ExtractionOutcome {
        if raw_name.trim().is_empty() {
            return ExtractionOutcome::failed(raw_name);
        }

        let mut name = normalize_apostrophes(raw_name.trim());
        let mut titles: Vec<String> = Vec::new();
        let mut method = ExtractionMethod::Dictionary;
        let mut ambiguous_rejections = 0;

        if let Some((main, suffix)) = name.split_once(',') {
            let mut suffix = suffix.trim().to_string();
            for (title, regex) in COMMA_BLOCK_COMPOUNDS.iter() {
                if regex.is_match(&suffix) {
                    titles.push((*title).to_string());
                    suffix = regex.replace_all(&suffix, " ").into_owned();
                }
            }
            for token in suffix.split_whitespace() {
                match self.check_comma_token(token) {
                    CommaToken::Title(title) => titles.push(title),
                    CommaToken::AmbiguousClanToken => ambiguous_rejections += 1,
                    CommaToken::NotATitle => {}
                }
            }
            method = ExtractionMethod::CommaBased;
            name = main.trim().to_string();
        }

        for pattern in &self.removal_patterns {
            if pattern.regex.is_match(&name) {
                titles.push(pattern.title.clone());
                name = pattern.regex.replace_all(&name, " ").into_owned();
            }
        }

        let mut seen = HashSet::new();
        titles.retain(|title| seen.insert(title.clone()));

        let discoveries = titles
            .iter()
            .filter(|title| !self.knows(title) && title.to_lowercase() != AMBIGUOUS_CLAN_TOKEN)
            .cloned()
            .collect();

        let cleaned = clean_remainder(&name);
        let (cleaned_name, standardized_name) = if cleaned.is_empty() {
            method = ExtractionMethod::Failed;
            (None, None)
        } else {
            let standardized = standardize_name(&cleaned);
            (Some(cleaned), Some(standardized))
        };

        ExtractionOutcome {
            original_name: raw_name.to_string(),
            cleaned_name,
            standardized_name,
            titles,
            method,
            discoveries,
            ambiguous_rejections,
        }
    }

    fn check_comma_token(&self, token: &str) -> CommaToken {
        let bracket_trimmed = token.trim_matches(BRACKET_TRIM_CHARS);
        let clean = token.trim_matches(TOKEN_TRIM_CHARS);
        if clean.is_empty() {
            return CommaToken::NotATitle;
        }

        if clean.to_lowercase() == AMBIGUOUS_CLAN_TOKEN {
            return CommaToken::AmbiguousClanToken;
        }

        // "Hj." is stored with its period, "Dato'" with its apostrophe.
        if self.knows(bracket_trimmed) {
            return CommaToken::Title(bracket_trimmed.to_string());
        }
        if self.knows(clean) {
            return CommaToken::Title(clean.to_string());
        }
        if COMPOUND_TITLE_PATTERNS.iter().any(|re| re.is_match(clean)) {
            return CommaToken::Title(clean.to_string());
        }
        CommaToken::NotATitle
    }
}

/// Case-insensitive pattern for one dictionary title. Word boundaries are only
/// asserted on edges that are word characters, so "Dato'" still matches
/// before a space.
fn removal_pattern(title: &str) -> String {
    let starts_word = title.chars().next().map_or(false, is_word_char);
    let ends_word = title.chars().last().map_or(false, is_word_char);
    format!(
        "(?i){}{}{}\\.?",
        if starts_word { "\\b" } else { "" },
        regex::escape(title),
        if ends_word { "\\b" } else { "" },
    )
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn clean_remainder(name: &str) -> String {
    let without_marks: String = name
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '\''))
        .collect();
    let joined = without_marks
        .split_whitespace()
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .collect::<Vec<_>>()
        .join(" ");
    joined
        .trim_matches(|c: char| c == '-' || c.is_whitespace() || matches!(c, '.' | ',' | ';' | ':'))
        .to_string()
}

/// Title-cases every token except lowercase connectors after the first token.
pub fn standardize_name(name: &str) -> String {
    name.split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            if i > 0 && LOWERCASE_CONNECTORS.contains(&lower.as_str()) {
                lower
            } else {
                title_case_word(word)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Upper-cases a letter that follows a non-letter, lower-cases the rest,
/// so "a/l" becomes "A/L" and "abdul-rahman" becomes "Abdul-Rahman".
fn title_case_word(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut previous_is_letter = false;
    for c in word.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }
    out
}
