// src/matching/fingerprint.rs
use crate::models::matching::{Connector, NameFingerprint};

/// Splits a cleaned name into the pieces the scorer disqualifies on.
pub fn decompose(cleaned_name: &str) -> NameFingerprint {
    let tokens: Vec<&str> = cleaned_name.split_whitespace().collect();
    let (first, last) = match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return NameFingerprint::empty(),
    };

    let connector = tokens
        .iter()
        .find_map(|token| Connector::from_token(token))
        .unwrap_or(Connector::None);

    let middle_tokens = if tokens.len() > 2 {
        tokens[1..tokens.len() - 1]
            .iter()
            .filter(|token| Connector::from_token(token).is_none())
            .map(|token| token.to_string())
            .collect()
    } else {
        Vec::new()
    };

    NameFingerprint {
        first_token: first.to_string(),
        last_token: last.to_string(),
        middle_tokens,
        connector,
        gender: connector.implied_gender(),
        token_count: tokens.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::matching::Gender;

    #[test]
    fn test_connector_sets_gender_and_is_not_a_middle_token() {
        let fp = decompose("Nurul Izzah binti Anwar");
        assert_eq!(fp.first_token, "Nurul");
        assert_eq!(fp.last_token, "Anwar");
        assert_eq!(fp.middle_tokens, vec!["Izzah".to_string()]);
        assert_eq!(fp.connector, Connector::Binti);
        assert_eq!(fp.gender, Gender::Female);
        assert_eq!(fp.token_count, 4);

        let fp = decompose("M. Kulasegaran a/l Murugeson");
        assert_eq!(fp.connector, Connector::AnakLelaki);
        assert_eq!(fp.gender, Gender::Male);
    }

    #[test]
    fn test_anak_has_no_gender() {
        let fp = decompose("Richard Riot anak Jaem");
        assert_eq!(fp.connector, Connector::Anak);
        assert_eq!(fp.gender, Gender::Unknown);
        assert_eq!(fp.middle_tokens, vec!["Riot".to_string()]);
    }

    #[test]
    fn test_single_token_and_empty_names() {
        let fp = decompose("Sivarasa");
        assert_eq!(fp.first_token, "Sivarasa");
        assert_eq!(fp.last_token, "Sivarasa");
        assert!(fp.middle_tokens.is_empty());
        assert_eq!(fp.token_count, 1);

        let fp = decompose("   ");
        assert!(fp.is_empty());
        assert_eq!(fp, NameFingerprint::empty());
    }

    #[test]
    fn test_first_connector_wins() {
        let fp = decompose("Ahmad bin Abdullah binti Salleh");
        assert_eq!(fp.connector, Connector::Bin);
        assert_eq!(fp.gender, Gender::Male);
        assert_eq!(fp.middle_tokens, vec!["Abdullah".to_string()]);
    }
}
