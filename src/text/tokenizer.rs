//! 見出しテキストのトークナイズと正規化処理。
use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static ALPHABETIC_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\p{Alphabetic}+").expect("compile alphabetic token regex"));

pub(crate) const DEFAULT_MIN_TOKEN_LEN: usize = 2;

fn normalize_text(input: &str) -> String {
    input.nfc().collect::<String>()
}

/// Splits text into lowercase alphabetic terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tokenizer {
    min_token_len: usize,
}

impl Tokenizer {
    #[must_use]
    pub fn new(min_token_len: usize) -> Self {
        Self { min_token_len }
    }

    #[must_use]
    pub fn min_token_len(&self) -> usize {
        self.min_token_len
    }

    /// Digits, punctuation and whitespace all act as separators.
    #[must_use]
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = normalize_text(text);
        ALPHABETIC_RUN
            .find_iter(&normalized)
            .map(|m| m.as_str().to_lowercase())
            .filter(|token| token.chars().count() >= self.min_token_len)
            .collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_TOKEN_LEN)
    }
}
