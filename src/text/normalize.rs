use crate::text::vocabulary::Vocabulary;

/// Digits that recognition commonly returns in place of letters
const CONFUSIONS: [(char, char); 5] = [('0', 'O'), ('1', 'I'), ('5', 'S'), ('2', 'Z'), ('8', 'B')];

/// Tokens containing any of these are leftovers of URLs
const URL_ARTIFACTS: [&str; 2] = ["HTTP", "WWW"];

/// Tokens shorter than this are dropped
pub const MIN_TOKEN_CHARS: usize = 2;

/// Corrections are only accepted at this edit distance or closer
pub const MAX_CORRECTION_DISTANCE: usize = 1;

/// Clean raw recognized text and correct near-miss words.
///
/// Uppercases, maps digit/letter confusions, strips symbols, drops short
/// and URL tokens, then replaces tokens that are one edit away from a
/// vocabulary word. If no token survives, the trimmed uppercased input is
/// returned instead of an empty string.
pub fn normalize(raw_text: &str, vocabulary: &Vocabulary) -> String {
    let upper = raw_text.trim().to_uppercase();

    let mapped: String = upper.chars().map(map_confusion).collect();
    let cleaned = strip_symbols(&mapped);

    let tokens: Vec<String> = cleaned
        .split_whitespace()
        .filter(|token| keep_token(token))
        .map(|token| correct_token(token, vocabulary))
        .collect();

    if tokens.is_empty() {
        return upper;
    }
    tokens.join(" ")
}

fn map_confusion(c: char) -> char {
    CONFUSIONS
        .iter()
        .find(|(digit, _)| *digit == c)
        .map(|(_, letter)| *letter)
        .unwrap_or(c)
}

/// Remove everything that is neither alphanumeric nor whitespace
fn strip_symbols(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect()
}

fn keep_token(token: &str) -> bool {
    token.chars().count() >= MIN_TOKEN_CHARS
        && !URL_ARTIFACTS.iter().any(|artifact| token.contains(artifact))
}

fn correct_token(token: &str, vocabulary: &Vocabulary) -> String {
    if vocabulary.contains(token) {
        return token.to_string();
    }

    match vocabulary.closest(token, MAX_CORRECTION_DISTANCE) {
        Some((word, distance)) if vocabulary.contains(word) => {
            tracing::debug!("Corrected {} -> {} (distance {})", token, word, distance);
            word.to_string()
        }
        _ => token.to_string(),
    }
}
