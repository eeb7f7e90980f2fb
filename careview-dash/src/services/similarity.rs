//! Approximate string scoring for client names
//!
//! Scores are integers on 0..=100 built from `strsim::normalized_levenshtein`.

use strsim::normalized_levenshtein;

/// Normalize a client name for matching
///
/// Lowercases, drops punctuation, collapses whitespace. `"  J. O'Doe "` → `"j odoe"`.
pub fn client_key(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Plain similarity ratio of two strings (0..=100)
///
/// Two empty strings score 0 so blank values never pair up.
pub fn ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    to_score(normalized_levenshtein(a, b))
}

/// Token-sort ratio over keys built by [`client_key`] (0..=100)
///
/// **Algorithm:**
/// 1. Split each key into tokens, sort, re-join with single spaces
/// 2. Score the sorted strings with [`ratio`]
///
/// Word order does not matter: `"doe jane"` scores 100 against `"jane doe"`.
pub fn key_similarity(key_a: &str, key_b: &str) -> u8 {
    ratio(&sorted_tokens(key_a), &sorted_tokens(key_b))
}

fn sorted_tokens(key: &str) -> String {
    let mut tokens: Vec<&str> = key.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn to_score(similarity: f64) -> u8 {
    (similarity.clamp(0.0, 1.0) * 100.0).round() as u8
}
