use crate::error::OcrError;
use crate::ranking::select_best;
use crate::text::distance::levenshtein;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::path::Path;

/// Word list compiled into the binary
const BUILTIN_WORDS: &str = include_str!("../../assets/vocabulary.txt");

/// Words shorter than this are skipped at load time
pub const MIN_WORD_CHARS: usize = 2;

/// Uppercase reference words used for correction.
///
/// Built once at startup and shared read-only. Words keep their load order,
/// which is the order correction candidates are examined in.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    words: Vec<String>,
    index: HashSet<String>,
}

impl Vocabulary {
    /// Build from any word source. Blank lines, `#` comments, duplicates
    /// and words under two characters are skipped.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocabulary = Self::default();
        for word in words {
            let word = word.as_ref().trim();
            if word.is_empty() || word.starts_with('#') {
                continue;
            }
            let word = word.to_uppercase();
            if word.chars().count() < MIN_WORD_CHARS || vocabulary.index.contains(&word) {
                continue;
            }
            vocabulary.index.insert(word.clone());
            vocabulary.words.push(word);
        }
        vocabulary
    }

    /// The compiled-in word list
    pub fn builtin() -> Self {
        Self::from_words(BUILTIN_WORDS.lines())
    }

    /// Load a word list with one word per line
    pub fn load(path: &Path) -> Result<Self, OcrError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            OcrError::Initialization(format!(
                "Failed to read vocabulary {}: {}",
                path.display(),
                e
            ))
        })?;
        let vocabulary = Self::from_words(contents.lines());
        tracing::info!(
            "Loaded {} vocabulary words from {}",
            vocabulary.len(),
            path.display()
        );
        Ok(vocabulary)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Case-insensitive membership
    pub fn contains(&self, word: &str) -> bool {
        self.index.contains(&word.to_uppercase())
    }

    /// Words in load order
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }

    /// Closest word within `max_distance` edits.
    ///
    /// Only words whose length differs by at most `max_distance` can
    /// qualify, so the rest are skipped without computing a distance.
    /// Equal distances resolve to the earliest word in load order.
    pub fn closest(&self, token: &str, max_distance: usize) -> Option<(&str, usize)> {
        let token = token.to_uppercase();
        let token_len = token.chars().count();

        let candidates = self
            .words
            .iter()
            .filter(|w| w.chars().count().abs_diff(token_len) <= max_distance)
            .map(|w| (w.as_str(), levenshtein(&token, w)))
            .filter(|(_, d)| *d <= max_distance);

        select_best(candidates, |(_, d)| Reverse(*d))
    }
}
