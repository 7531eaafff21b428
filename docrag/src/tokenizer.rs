//! Tokenizers used for token-budgeted chunking and token inspection.
//!
//! [`BpeTokenizer`] is the default: the byte-pair encodings used by OpenAI
//! models, with real token ids. [`RegexTokenizer`] is a dependency-light
//! approximation that splits on GPT-style pre-token boundaries only. With the
//! `hf-tokenizer` feature, [`HfTokenizer`] loads a `tokenizer.json` so counts
//! match a specific model's vocabulary.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tiktoken_rs::CoreBPE;

use crate::error::{RagError, Result};

/// A single token: its byte span in the source text and, when the tokenizer
/// has a vocabulary, its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Byte range of the token in the tokenized text.
    pub span: Range<usize>,
    /// Vocabulary id, if the tokenizer has one.
    pub id: Option<u32>,
}

impl Token {
    /// The token's text within `source`, or `""` if the span is not on char boundaries.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.span.clone()).unwrap_or("")
    }
}

/// Splits text into tokens with byte spans.
pub trait Tokenizer: Send + Sync {
    /// Tokenize `text`. Spans are ordered and non-overlapping.
    fn tokenize(&self, text: &str) -> Result<Vec<Token>>;

    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> Result<usize> {
        Ok(self.tokenize(text)?.len())
    }

    /// Short name for logs and CLI output.
    fn name(&self) -> &str;
}

// Contractions, words with an optional leading space, digit groups of up to
// three, punctuation runs, then whitespace. Every char falls in one branch so
// matches tile the input.
static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"'(?:[sdmt]|ll|ve|re)| ?\p{L}+| ?\p{N}{1,3}| ?[^\s\p{L}\p{N}]+|\s+")
        .expect("token pattern is valid")
});

/// Byte-pair encodings shipped with [`BpeTokenizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// GPT-4, GPT-3.5-turbo and `text-embedding-ada-002`.
    #[default]
    Cl100kBase,
    /// GPT-3 models such as davinci.
    P50kBase,
    /// Older GPT-3 models.
    R50kBase,
}

impl Encoding {
    /// The encoding's tiktoken name, e.g. `cl100k_base`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cl100kBase => "cl100k_base",
            Self::P50kBase => "p50k_base",
            Self::R50kBase => "r50k_base",
        }
    }

    /// Models that use this encoding.
    pub fn used_by(self) -> &'static str {
        match self {
            Self::Cl100kBase => "GPT-4, GPT-3.5-turbo, text-embedding-ada-002",
            Self::P50kBase => "GPT-3 models like davinci",
            Self::R50kBase => "Older GPT-3 models",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cl100k_base" => Ok(Self::Cl100kBase),
            "p50k_base" => Ok(Self::P50kBase),
            "r50k_base" => Ok(Self::R50kBase),
            other => Err(RagError::InvalidConfiguration(format!("unknown encoding: {other}"))),
        }
    }
}

/// A byte-pair-encoding tokenizer with the vocabularies of OpenAI models.
///
/// A token may cover only part of a multibyte character. Such tokens are
/// grouped until the group decodes to valid UTF-8: the last token of the group
/// carries the group's span and the others get an empty span at its start, so
/// spans stay ordered and on char boundaries.
pub struct BpeTokenizer {
    bpe: CoreBPE,
    encoding: Encoding,
}

impl fmt::Debug for BpeTokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BpeTokenizer").field("encoding", &self.encoding).finish()
    }
}

impl BpeTokenizer {
    /// Load the vocabulary for `encoding`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if the bundled vocabulary
    /// cannot be parsed.
    pub fn new(encoding: Encoding) -> Result<Self> {
        let bpe = match encoding {
            Encoding::Cl100kBase => tiktoken_rs::cl100k_base(),
            Encoding::P50kBase => tiktoken_rs::p50k_base(),
            Encoding::R50kBase => tiktoken_rs::r50k_base(),
        }
        .map_err(|e| RagError::InvalidConfiguration(format!("failed to load {encoding}: {e}")))?;
        Ok(Self { bpe, encoding })
    }

    /// The encoding in use.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }
}

impl Tokenizer for BpeTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        let ids = self.bpe.encode_ordinary(text);
        let mut tokens = Vec::with_capacity(ids.len());
        let mut offset = 0;
        let mut group_start = 0;
        for i in 0..ids.len() {
            // Incomplete UTF-8 until the group reaches a char boundary.
            let Ok(piece) = self.bpe.decode(ids[group_start..=i].to_vec()) else {
                continue;
            };
            for &id in &ids[group_start..i] {
                tokens.push(Token { span: offset..offset, id: u32::try_from(id).ok() });
            }
            let end = offset + piece.len();
            tokens.push(Token { span: offset..end, id: u32::try_from(ids[i]).ok() });
            offset = end;
            group_start = i + 1;
        }
        if group_start < ids.len() {
            return Err(RagError::InvalidConfiguration(format!(
                "{} produced tokens that do not decode to the input",
                self.encoding
            )));
        }
        Ok(tokens)
    }

    fn name(&self) -> &str {
        self.encoding.as_str()
    }
}

/// A GPT-style regex pre-tokenizer, an approximation of BPE counts.
///
/// It stops at pre-token boundaries, so every word is one token and there are
/// no ids. Counts run low against [`BpeTokenizer`] for long or rare words.
/// Spans cover the input with no gaps, so joining the token texts reproduces
/// the input.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexTokenizer;

impl RegexTokenizer {
    /// Create a new regex tokenizer.
    pub fn new() -> Self {
        Self
    }
}

impl Tokenizer for RegexTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        Ok(TOKEN_PATTERN.find_iter(text).map(|m| Token { span: m.range(), id: None }).collect())
    }

    fn name(&self) -> &str {
        "regex"
    }
}

/// A tokenizer backed by a Hugging Face `tokenizer.json`.
#[cfg(feature = "hf-tokenizer")]
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
    name: String,
}

#[cfg(feature = "hf-tokenizer")]
impl HfTokenizer {
    /// Load a tokenizer from a `tokenizer.json` file.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`](crate::RagError::InvalidConfiguration)
    /// if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            crate::error::RagError::InvalidConfiguration(format!(
                "failed to load tokenizer from {}: {e}",
                path.display()
            ))
        })?;
        let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("hf").to_string();
        Ok(Self { inner, name })
    }
}

#[cfg(feature = "hf-tokenizer")]
impl Tokenizer for HfTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        let encoding = self.inner.encode(text, false).map_err(|e| {
            crate::error::RagError::InvalidConfiguration(format!("tokenization failed: {e}"))
        })?;
        Ok(encoding
            .get_offsets()
            .iter()
            .zip(encoding.get_ids())
            .map(|(&(start, end), &id)| Token { span: start..end.max(start), id: Some(id) })
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(text: &str) -> Vec<String> {
        RegexTokenizer.tokenize(text).unwrap().iter().map(|t| t.text(text).to_string()).collect()
    }

    #[test]
    fn splits_words_with_leading_space() {
        assert_eq!(texts("Hello, world!"), vec!["Hello", ",", " world", "!"]);
    }

    #[test]
    fn groups_digits_in_threes() {
        assert_eq!(texts("12345"), vec!["123", "45"]);
    }

    #[test]
    fn separates_contractions() {
        assert_eq!(texts("don't"), vec!["don", "'t"]);
    }

    #[test]
    fn tokens_tile_the_input() {
        let text = "Multiple  spaces,\nnewlines\t and ünïcödé 42!";
        let joined: String = texts(text).concat();
        assert_eq!(joined, text);
    }

    fn cl100k() -> BpeTokenizer {
        BpeTokenizer::new(Encoding::Cl100kBase).unwrap()
    }

    #[test]
    fn bpe_splits_long_words_into_subwords() {
        let tokens = cl100k().tokenize("antidisestablishmentarianism").unwrap();
        assert!(tokens.len() > 1);
        assert!(tokens.iter().all(|t| t.id.is_some()));
        assert_eq!(RegexTokenizer.tokenize("antidisestablishmentarianism").unwrap().len(), 1);
    }

    #[test]
    fn bpe_known_ids() {
        // "hello world" in cl100k_base.
        let tokens = cl100k().tokenize("hello world").unwrap();
        let ids: Vec<u32> = tokens.iter().filter_map(|t| t.id).collect();
        assert_eq!(ids, [15339, 1917]);
    }

    #[test]
    fn bpe_spans_tile_multibyte_input() {
        let text = "naïve café 日本語 🦀 tokens";
        let tokens = cl100k().tokenize(text).unwrap();
        let joined: String = tokens.iter().map(|t| t.text(text)).collect();
        assert_eq!(joined, text);
        for pair in tokens.windows(2) {
            assert_eq!(pair[0].span.end, pair[1].span.start);
        }
    }

    #[test]
    fn encoding_names_round_trip() {
        for encoding in [Encoding::Cl100kBase, Encoding::P50kBase, Encoding::R50kBase] {
            assert_eq!(encoding.to_string().parse::<Encoding>().unwrap(), encoding);
        }
        assert!("gpt2".parse::<Encoding>().is_err());
        assert_eq!(BpeTokenizer::new(Encoding::P50kBase).unwrap().name(), "p50k_base");
    }

    #[test]
    fn count_matches_tokenize() {
        let tokenizer = RegexTokenizer::new();
        assert_eq!(tokenizer.count("one two three").unwrap(), 3);
        assert_eq!(tokenizer.count("").unwrap(), 0);
    }
}
