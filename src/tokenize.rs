//! Text normalization and n-gram extraction
//!
//! Every comparison the rule engine makes goes through this module, so the
//! output must be a pure function of the input text and the
//! [`NormalizationPolicy`]. The policy carries a version number: changing
//! the token rules below means bumping [`NormalizationPolicy::VERSION`] so
//! that cached n-gram statistics are recomputed.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::OnceLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// A single normalized token
pub type Token = String;

/// Punctuation dropped from the token stream.
///
/// Symbols not listed here (`#`, `@`, emoji, ...) are kept as tokens of
/// their own since they carry meaning in profile text.
const STOP_PUNCTUATION: &[&str] = &[
    ",", ".", "'", "\"", "-", "+", "&", "/", "|", ":", ";", "(", ")", "!", "*", "?", "]", "[",
    "^", "~", "$", "%", "{", "}", "=", "\u{2019}", "\u{200D}", "\u{FE0F}",
];

/// Word runs (letters, digits, underscore) with internal apostrophes or
/// zero-width joiners, or any single non-space symbol.
fn token_regex() -> &'static Regex {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    TOKEN_RE.get_or_init(|| {
        Regex::new(r"\w+(?:['\x{2019}\x{200D}]\w+)*|[^\w\s]")
            .expect("token pattern is a valid regex")
    })
}

/// Versioned normalization policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormalizationPolicy {
    /// Remove combining marks after canonical decomposition ("café" -> "cafe")
    #[serde(default)]
    pub strip_diacritics: bool,
}

impl NormalizationPolicy {
    /// Version of the tokenization rules in this module
    pub const VERSION: u32 = 1;

    /// Stable tag identifying this policy in statistics cache fingerprints
    pub fn policy_tag(&self) -> String {
        format!(
            "v{}{}",
            Self::VERSION,
            if self.strip_diacritics { "+nodiacritics" } else { "" }
        )
    }

    /// Normalize text into its ordered token sequence
    ///
    /// # Example
    /// ```
    /// use twittersphere::tokenize::NormalizationPolicy;
    ///
    /// let tokens = NormalizationPolicy::default().normalize("Climate ACTION, now!");
    /// assert_eq!(tokens, vec!["climate", "action", "now"]);
    /// ```
    pub fn normalize(&self, text: &str) -> Vec<Token> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let folded: String = if self.strip_diacritics {
            text.nfkc()
                .nfd()
                .filter(|c| !is_combining_mark(*c))
                .nfc()
                .collect()
        } else {
            text.nfkc().collect()
        };
        let lowered = folded.to_lowercase();

        token_regex()
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|t| !STOP_PUNCTUATION.contains(t))
            .map(str::to_string)
            .collect()
    }
}

/// Normalize with the default policy
pub fn normalize(text: &str) -> Vec<Token> {
    NormalizationPolicy::default().normalize(text)
}

/// An ordered tuple of consecutive tokens
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NGram(Vec<Token>);

impl NGram {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self(tokens)
    }

    /// Build from already-normalized, space separated tokens
    pub fn from_joined(joined: &str) -> Self {
        Self(joined.split_whitespace().map(str::to_string).collect())
    }

    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `needle` occurs in this n-gram as a contiguous run
    pub fn contains_run(&self, needle: &[Token]) -> bool {
        contains_run(&self.0, needle)
    }
}

impl fmt::Display for NGram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

impl From<Vec<Token>> for NGram {
    fn from(tokens: Vec<Token>) -> Self {
        Self(tokens)
    }
}

/// True if `needle` appears in `haystack` as a contiguous subsequence
pub fn contains_run(haystack: &[Token], needle: &[Token]) -> bool {
    if needle.is_empty() {
        return true;
    }
    if haystack.len() < needle.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Extracts all n-grams of size `n` from a token sequence
///
/// Sliding window: `tokens.len() - n + 1` windows, none if that is negative.
///
/// # Example
/// ```
/// use twittersphere::tokenize::{ngrams, normalize};
///
/// let tokens = normalize("renewable energy future");
/// let bigrams = ngrams(&tokens, 2);
/// assert_eq!(bigrams.len(), 2);
/// assert_eq!(bigrams[0].to_string(), "renewable energy");
/// ```
pub fn ngrams(tokens: &[Token], n: usize) -> Vec<NGram> {
    if n == 0 || tokens.len() < n {
        return Vec::new();
    }

    tokens.windows(n).map(|w| NGram(w.to_vec())).collect()
}

/// Distinct n-grams for every size in `sizes`
pub fn ngram_set(tokens: &[Token], sizes: RangeInclusive<usize>) -> BTreeSet<NGram> {
    sizes.flat_map(|n| ngrams(tokens, n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases_and_drops_punctuation() {
        let tokens = normalize("I support Climate Action, every day!");
        assert_eq!(
            tokens,
            vec!["i", "support", "climate", "action", "every", "day"]
        );
    }

    #[test]
    fn test_normalize_empty_and_whitespace() {
        assert!(normalize("").is_empty());
        assert!(normalize("   \t\n ").is_empty());
    }

    #[test]
    fn test_normalize_keeps_hashtag_and_emoji_symbols() {
        let tokens = normalize("#auspol 🌏 voter");
        assert_eq!(tokens, vec!["#", "auspol", "🌏", "voter"]);
    }

    #[test]
    fn test_normalize_keeps_internal_apostrophe() {
        let tokens = normalize("Don't panic");
        assert_eq!(tokens, vec!["don't", "panic"]);
    }

    #[test]
    fn test_normalize_unicode_case_folding() {
        assert_eq!(normalize("ÉCOLOGIE"), vec!["écologie"]);
        // Full-width letters fold through NFKC
        assert_eq!(normalize("ＡＢＣ"), vec!["abc"]);
    }

    #[test]
    fn test_strip_diacritics_policy() {
        let policy = NormalizationPolicy {
            strip_diacritics: true,
        };
        assert_eq!(policy.normalize("Café Niño"), vec!["cafe", "nino"]);
        assert_eq!(normalize("Café"), vec!["café"]);
    }

    #[test]
    fn test_policy_tag_tracks_flags() {
        let plain = NormalizationPolicy::default();
        let stripped = NormalizationPolicy {
            strip_diacritics: true,
        };
        assert_ne!(plain.policy_tag(), stripped.policy_tag());
        assert!(plain.policy_tag().starts_with('v'));
    }

    #[test]
    fn test_ngrams_window_count() {
        let tokens = normalize("a b c d");
        assert_eq!(ngrams(&tokens, 1).len(), 4);
        assert_eq!(ngrams(&tokens, 3).len(), 2);
        assert_eq!(ngrams(&tokens, 4).len(), 1);
        assert!(ngrams(&tokens, 5).is_empty());
        assert!(ngrams(&tokens, 0).is_empty());
    }

    #[test]
    fn test_ngram_set_dedups() {
        let tokens = normalize("go go go");
        let set = ngram_set(&tokens, 1..=2);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&NGram::from_joined("go")));
        assert!(set.contains(&NGram::from_joined("go go")));
    }

    #[test]
    fn test_contains_run() {
        let hay = normalize("climate action bot account");
        assert!(contains_run(&hay, &normalize("action bot")));
        assert!(!contains_run(&hay, &normalize("climate bot")));
        assert!(contains_run(&hay, &[]));
    }

    #[test]
    fn test_ngram_display() {
        let ngram = NGram::new(vec!["renewable".into(), "energy".into()]);
        assert_eq!(ngram.to_string(), "renewable energy");
        assert_eq!(NGram::from_joined("renewable  energy"), ngram);
    }
}
