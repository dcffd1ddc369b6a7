//! Word counting and word-to-token estimation.

use once_cell::sync::Lazy;
use regex::Regex;

/// Estimated tokens per counted word
pub const TOKENS_PER_WORD: f64 = 1.33;

/// A run of ASCII alphanumerics, optionally joined to further runs by `'` or `-`.
///
/// Contractions ("don't") and hyphenated compounds ("over-think") count as a
/// single word. Both ends must sit on an ASCII word boundary, so a run glued
/// to `_` (as in `snake_case`) is not a word at all.
static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?-u:\b)[A-Za-z0-9]+(?:['-][A-Za-z0-9]+)*(?-u:\b)").unwrap()
});

/// Count the words in a piece of text.
///
/// Leading and trailing whitespace is ignored; empty or punctuation-only text
/// yields `0`. Non-Latin scripts also yield `0` since only ASCII alphanumerics
/// are matched.
pub fn count_words(text: &str) -> usize {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0;
    }
    WORD_PATTERN.find_iter(trimmed).count()
}

/// Estimate the token count for a number of words (`round(words * 1.33)`).
pub fn estimate_tokens(words: usize) -> u64 {
    (words as f64 * TOKENS_PER_WORD).round() as u64
}
