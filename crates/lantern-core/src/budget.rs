//! Turns ranked search results into a context string that fits the prompt budget.
//!
//! Truncation is token-aware when a tokenizer is configured and falls back to a
//! fixed characters-per-token approximation otherwise. The fallback is also taken
//! when the tokenizer errors, so building a context never fails.

use std::path::Path;

use crate::engine::SearchResult;

pub const DEFAULT_TOP_N: usize = 2;
pub const DEFAULT_TOKEN_BUDGET: usize = 6000;
pub const DEFAULT_CHARS_PER_TOKEN: usize = 4;
pub const DEFAULT_SEPARATOR: &str = "\n";

/// Token boundaries of a text, as byte ranges into it.
pub trait Tokenize: Send + Sync {
    fn token_spans(&self, text: &str) -> Result<Vec<(usize, usize)>, TokenizeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TokenizeError {
    #[error("failed to load tokenizer from {0}: {1}")]
    Load(String, String),
    #[error("tokenization failed: {0}")]
    Encode(String),
}

/// HuggingFace `tokenizers` model loaded from a `tokenizer.json`.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> Result<Self, TokenizeError> {
        let load_err = |e: tokenizers::Error| TokenizeError::Load(path.display().to_string(), e.to_string());
        let mut inner = tokenizers::Tokenizer::from_file(path).map_err(load_err)?;
        // Counting needs the full encoding, not one cut at the model's max length.
        inner.with_truncation(None).map_err(load_err)?;
        Ok(Self { inner })
    }
}

impl Tokenize for HfTokenizer {
    fn token_spans(&self, text: &str) -> Result<Vec<(usize, usize)>, TokenizeError> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| TokenizeError::Encode(e.to_string()))?;
        Ok(encoding.get_offsets().to_vec())
    }
}

/// Outcome of [`ContextBudgeter::truncate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Truncation {
    /// A prefix of the input.
    pub text: String,
    pub truncated: bool,
    /// True when the character approximation was used because the tokenizer failed.
    pub used_fallback: bool,
}

/// Selects the top results and bounds their combined size.
pub struct ContextBudgeter {
    top_n: usize,
    separator: String,
    budget: usize,
    chars_per_token: usize,
    tokenizer: Option<Box<dyn Tokenize>>,
}

impl Default for ContextBudgeter {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_BUDGET)
    }
}

impl ContextBudgeter {
    /// Budgeter for `budget` tokens with the default top-N, separator and ratio.
    pub fn new(budget: usize) -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            separator: DEFAULT_SEPARATOR.to_string(),
            budget,
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
            tokenizer: None,
        }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_chars_per_token(mut self, ratio: usize) -> Self {
        self.chars_per_token = ratio.max(1);
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: impl Tokenize + 'static) -> Self {
        self.tokenizer = Some(Box::new(tokenizer));
        self
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Join the first `top_n` results and truncate the result to the budget.
    pub fn build(&self, results: &[SearchResult]) -> Truncation {
        let joined = results
            .iter()
            .take(self.top_n)
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join(&self.separator);
        self.truncate(&joined)
    }

    /// Keep the longest prefix of `text` within the budget.
    pub fn truncate(&self, text: &str) -> Truncation {
        let Some(tokenizer) = &self.tokenizer else {
            return self.truncate_chars(text, false);
        };
        match tokenizer.token_spans(text) {
            Ok(spans) => match self.token_cut(text, &spans) {
                Some(end) => Truncation {
                    text: text[..end].to_string(),
                    truncated: end < text.len(),
                    used_fallback: false,
                },
                None => {
                    tracing::warn!("token offsets do not fall on char boundaries, using character-based fallback");
                    self.truncate_chars(text, true)
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "token counting failed, using character-based fallback");
                self.truncate_chars(text, true)
            }
        }
    }

    /// Byte end of the allowed prefix, or `None` if the spans are unusable.
    fn token_cut(&self, text: &str, spans: &[(usize, usize)]) -> Option<usize> {
        if spans.len() <= self.budget {
            return Some(text.len());
        }
        if self.budget == 0 {
            return Some(0);
        }
        let end = spans[self.budget - 1].1;
        (end <= text.len() && text.is_char_boundary(end)).then_some(end)
    }

    fn truncate_chars(&self, text: &str, used_fallback: bool) -> Truncation {
        let limit = self.budget.saturating_mul(self.chars_per_token);
        let end = text
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(text.len());
        Truncation {
            text: text[..end].to_string(),
            truncated: end < text.len(),
            used_fallback,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn result(text: &str, score: f32) -> SearchResult {
        SearchResult {
            text: text.to_string(),
            score,
        }
    }

    #[test]
    fn under_budget_is_unmodified() {
        let budgeter = ContextBudgeter::new(100).with_tokenizer(WordTokenizer);
        let out = budgeter.truncate("short text here");
        assert_eq!(out.text, "short text here");
        assert!(!out.truncated);
        assert!(!out.used_fallback);
    }

    #[test]
    fn token_cut_keeps_prefix_within_budget() {
        let budgeter = ContextBudgeter::new(3).with_tokenizer(WordTokenizer);
        let text = "one two three four five";
        let out = budgeter.truncate(text);
        assert_eq!(out.text, "one two three");
        assert!(out.truncated);
        assert!(text.starts_with(&out.text));
        assert_eq!(WordTokenizer.token_spans(&out.text).unwrap().len(), 3);
    }

    #[test]
    fn tokenizer_failure_falls_back_to_characters() {
        let budgeter = ContextBudgeter::new(2).with_tokenizer(BrokenTokenizer);
        let out = budgeter.truncate("abcdefghijkl");
        assert_eq!(out.text, "abcdefgh");
        assert!(out.truncated);
        assert!(out.used_fallback);
    }

    #[test]
    fn no_tokenizer_uses_character_ratio() {
        let budgeter = ContextBudgeter::new(1).with_chars_per_token(3);
        let out = budgeter.truncate("abcdef");
        assert_eq!(out.text, "abc");
        assert!(!out.used_fallback);
    }

    #[test]
    fn character_cut_respects_char_boundaries() {
        let budgeter = ContextBudgeter::new(1).with_chars_per_token(2);
        let out = budgeter.truncate("ééé");
        assert_eq!(out.text, "éé");
    }

    #[test]
    fn build_takes_top_two_joined() {
        let budgeter = ContextBudgeter::new(100).with_tokenizer(WordTokenizer);
        let results = vec![
            result("DigiLocker is a government document wallet.", 4.0),
            result("Users can upload and verify documents.", 7.0),
            result("Unrelated third passage.", 9.0),
        ];
        let out = budgeter.build(&results);
        assert_eq!(
            out.text,
            "DigiLocker is a government document wallet.\nUsers can upload and verify documents."
        );
        assert!(!out.truncated);
    }

    #[test]
    fn build_over_budget_is_strict_prefix() {
        let budgeter = ContextBudgeter::new(4).with_tokenizer(WordTokenizer);
        let results = vec![result("a b c", 0.0), result("d e f", 1.0)];
        let out = budgeter.build(&results);
        let joined = "a b c\nd e f";
        assert!(joined.starts_with(&out.text));
        assert!(out.text.len() < joined.len());
        assert_eq!(out.text, "a b c\nd");
    }

    #[test]
    fn build_with_no_results_is_empty() {
        let out = ContextBudgeter::default().build(&[]);
        assert_eq!(out.text, "");
        assert!(!out.truncated);
    }

    #[test]
    fn zero_budget_keeps_nothing() {
        let budgeter = ContextBudgeter::new(0).with_tokenizer(WordTokenizer);
        assert_eq!(budgeter.truncate("one two").text, "");
    }

    const WORD_LEVEL_JSON: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": { "[UNK]": 0, "héllo": 1, "wörld": 2 },
            "unk_token": "[UNK]"
        }
    }"#;

    fn word_level_tokenizer(dir: &tempfile::TempDir) -> HfTokenizer {
        let path = dir.path().join("tokenizer.json");
        std::fs::write(&path, WORD_LEVEL_JSON).unwrap();
        HfTokenizer::from_file(&path).unwrap()
    }

    #[test]
    fn hf_tokenizer_reports_byte_offsets() {
        let tmp = tempfile::tempdir().unwrap();
        let tokenizer = word_level_tokenizer(&tmp);
        let spans = tokenizer.token_spans("héllo wörld").unwrap();
        assert_eq!(spans, vec![(0, 6), (7, 13)]);
    }

    #[test]
    fn hf_tokenizer_cuts_multibyte_text_on_token_end() {
        let tmp = tempfile::tempdir().unwrap();
        let budgeter = ContextBudgeter::new(2).with_tokenizer(word_level_tokenizer(&tmp));
        let out = budgeter.truncate("héllo wörld héllo ünknown");
        assert_eq!(out.text, "héllo wörld");
        assert!(out.truncated);
        assert!(!out.used_fallback);

        let whole = budgeter.truncate("wörld héllo");
        assert_eq!(whole.text, "wörld héllo");
        assert!(!whole.truncated);
    }

    #[test]
    fn missing_tokenizer_file_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            HfTokenizer::from_file(&tmp.path().join("tokenizer.json")),
            Err(TokenizeError::Load(..))
        ));
    }
}
