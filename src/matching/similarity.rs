// src/matching/similarity.rs
//! Edit-distance ratios on a 0-100 scale.
//!
//! All three metrics return whole percentages so that the floors and the
//! acceptance threshold compare against stable values.

use strsim::normalized_levenshtein;

/// Whole-string similarity. Symmetric; 0 when either side is empty.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    (normalized_levenshtein(a, b) * 100.0).round()
}

/// Ratio over tokens sorted alphabetically, so word order does not matter.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

/// Best ratio of the shorter string against every same-length window of the
/// longer one.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() || b_chars.is_empty() {
        return 0.0;
    }

    let (shorter, longer) = if a_chars.len() <= b_chars.len() {
        (a_chars, b_chars)
    } else {
        (b_chars, a_chars)
    };
    if shorter.len() == longer.len() {
        return ratio(a, b);
    }

    let needle: String = shorter.iter().collect();
    let mut best = 0.0_f64;
    for window in longer.windows(shorter.len()) {
        let candidate: String = window.iter().collect();
        let sim = ratio(&needle, &candidate);
        if sim > best {
            best = sim;
            if best >= 100.0 {
                break;
            }
        }
    }
    best
}

fn sorted_tokens(text: &str) -> String {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let mut tokens: Vec<&str> = normalized.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}
