//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and three implementations:
//!
//! - [`RecursiveChunker`]: splits on paragraph, line, sentence and word
//!   boundaries, falling back to raw characters
//! - [`FixedWidthChunker`]: splits on a single separator (default `"\n"`)
//! - [`TokenChunker`]: sizes chunks by token count using a [`Tokenizer`]
//!
//! The character strategies share one chunk geometry. Chunk `i + 1` starts
//! exactly `overlap` characters before the end of chunk `i`, every chunk is at
//! most `chunk_size` characters, and every chunk except the last is longer than
//! `overlap`. Dropping the first `overlap` characters of every chunk after the
//! first and concatenating therefore reproduces the input exactly.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{CHUNK_INDEX_KEY, Chunk, Document};
use crate::error::{RagError, Result};
use crate::tokenizer::Tokenizer;

/// Separators tried by [`RecursiveChunker`], coarsest first. Characters are the
/// implicit last resort.
pub const RECURSIVE_SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Default separator for [`FixedWidthChunker`].
pub const DEFAULT_FIXED_SEPARATOR: &str = "\n";

/// A strategy for splitting text into overlapping chunks.
///
/// Implementations are pure: the same text and configuration always yield the
/// same chunks.
pub trait Chunker: Send + Sync {
    /// Split `text` into ordered byte ranges, one per chunk.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyInput`] if `text` is empty.
    fn split_spans(&self, text: &str) -> Result<Vec<Range<usize>>>;

    /// Split `text` into ordered chunk strings.
    fn split_text(&self, text: &str) -> Result<Vec<String>> {
        Ok(self
            .split_spans(text)?
            .into_iter()
            .map(|span| text.get(span).unwrap_or_default().to_string())
            .collect())
    }

    /// Split a document into [`Chunk`]s carrying its source and metadata.
    ///
    /// Each chunk inherits the document's metadata plus a `chunk_index` field.
    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        let spans = self.split_spans(&document.text)?;
        Ok(spans
            .into_iter()
            .enumerate()
            .map(|(index, span)| {
                let mut metadata = document.metadata.clone();
                metadata.insert(CHUNK_INDEX_KEY.to_string(), index.to_string());
                Chunk {
                    text: document.text.get(span.clone()).unwrap_or_default().to_string(),
                    source: document.source.clone(),
                    index,
                    offset: span.start,
                    metadata,
                }
            })
            .collect())
    }
}

/// Which chunking strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// Boundary-priority recursive splitting.
    #[default]
    Recursive,
    /// Single-separator splitting.
    #[serde(alias = "character")]
    FixedWidth,
    /// Token-count splitting.
    Token,
}

impl fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Recursive => "recursive",
            Self::FixedWidth => "fixed_width",
            Self::Token => "token",
        };
        f.write_str(name)
    }
}

impl FromStr for ChunkStrategy {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "recursive" => Ok(Self::Recursive),
            "fixed_width" | "fixed-width" | "character" => Ok(Self::FixedWidth),
            "token" => Ok(Self::Token),
            other => Err(RagError::InvalidConfiguration(format!("unknown chunking method: {other}"))),
        }
    }
}

/// Check that `chunk_size` and `chunk_overlap` describe a terminating split.
pub fn validate_chunk_params(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::InvalidConfiguration("chunk_size must be greater than zero".into()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::InvalidConfiguration(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

fn ensure_not_empty(text: &str) -> Result<()> {
    if text.is_empty() {
        return Err(RagError::EmptyInput("cannot chunk empty text".into()));
    }
    Ok(())
}

/// Byte offsets of every char boundary, so sizes can be counted in chars while
/// slicing stays in bytes.
struct CharOffsets {
    bounds: Vec<usize>,
}

impl CharOffsets {
    fn new(text: &str) -> Self {
        let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        bounds.push(text.len());
        Self { bounds }
    }

    fn char_len(&self) -> usize {
        self.bounds.len() - 1
    }

    fn byte(&self, char_index: usize) -> usize {
        self.bounds[char_index]
    }

    fn char_index(&self, byte: usize) -> usize {
        self.bounds.binary_search(&byte).unwrap_or_else(|i| i)
    }
}

/// The end (in chars) of an atomic piece of text. Segments tile the input.
#[derive(Debug, Clone, Copy)]
struct Segment {
    end: usize,
    /// A preferred cut point follows this segment.
    hard_break: bool,
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return vec![text];
    }

    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Cut the char range `start..end` into pieces of at most `budget` chars.
fn split_by_chars(start: usize, end: usize, budget: usize, out: &mut Vec<Segment>) {
    let mut cursor = start;
    while cursor < end {
        cursor = (cursor + budget).min(end);
        out.push(Segment { end: cursor, hard_break: false });
    }
}

/// Break the char range `start..end` into segments of at most `budget` chars,
/// trying each separator in turn before falling back to raw characters.
fn split_recursive(
    text: &str,
    offsets: &CharOffsets,
    range: Range<usize>,
    separators: &[&str],
    budget: usize,
    out: &mut Vec<Segment>,
) {
    if range.end - range.start <= budget {
        out.push(Segment { end: range.end, hard_break: false });
        return;
    }
    let Some((separator, finer)) = separators.split_first() else {
        split_by_chars(range.start, range.end, budget, out);
        return;
    };

    let base = offsets.byte(range.start);
    let slice = &text[base..offsets.byte(range.end)];
    let mut piece_start = range.start;
    let mut byte_cursor = base;
    for piece in split_keeping_separator(slice, separator) {
        byte_cursor += piece.len();
        let piece_end = offsets.char_index(byte_cursor);
        if piece_end - piece_start <= budget {
            out.push(Segment { end: piece_end, hard_break: false });
        } else {
            split_recursive(text, offsets, piece_start..piece_end, finer, budget, out);
        }
        piece_start = piece_end;
    }
}

/// Greedily pack segments into chunk char ranges of at most `chunk_size`
/// chars, each starting `chunk_overlap` chars before the previous end.
///
/// Every segment must be at most `chunk_size - chunk_overlap` chars, which
/// guarantees that a freshly opened chunk always accepts the next segment.
///
/// A hard break closes the chunk early only once it holds at least half a
/// budget of chars that are not carried-over overlap.
fn pack_segments(
    segments: &[Segment],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<Range<usize>> {
    let min_fresh = (chunk_size - chunk_overlap).div_ceil(2);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut fresh_start = 0;
    let mut end = 0;
    let mut open = false;
    let mut after_break = false;

    for segment in segments {
        let fits = segment.end - start <= chunk_size;
        let at_break =
            after_break && end - start > chunk_overlap && end - fresh_start >= min_fresh;
        if open && (!fits || at_break) {
            chunks.push(start..end);
            start = end - chunk_overlap;
            fresh_start = end;
        }
        end = segment.end;
        open = true;
        after_break = segment.hard_break;
    }

    if open {
        chunks.push(start..end);
    }
    chunks
}

fn to_byte_spans(offsets: &CharOffsets, chunks: Vec<Range<usize>>) -> Vec<Range<usize>> {
    chunks.into_iter().map(|r| offsets.byte(r.start)..offsets.byte(r.end)).collect()
}

/// Splits text on the coarsest boundary that keeps pieces within budget.
///
/// Paragraph breaks (`"\n\n"`) are preferred cut points: once a chunk holds
/// at least half of `chunk_size - chunk_overlap` new characters it is closed
/// at the next paragraph break even if the following paragraph would fit.
/// Shorter paragraphs are packed together up to the size budget. Paragraphs too long for a
/// chunk are subdivided by line breaks, then `". "`, then spaces, then raw
/// characters, and the pieces are packed greedily. Separators stay attached to
/// the text before them so no characters are dropped.
///
/// # Example
///
/// ```rust
/// use docrag::{Chunker, RecursiveChunker};
///
/// let chunker = RecursiveChunker::new(20, 0).unwrap();
/// let chunks = chunker.split_text("para one.\n\npara two.").unwrap();
/// assert_eq!(chunks, vec!["para one.\n\n", "para two."]);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of overlapping characters between consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if `chunk_overlap >= chunk_size`
    /// or `chunk_size == 0`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunk_params(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Chunker for RecursiveChunker {
    fn split_spans(&self, text: &str) -> Result<Vec<Range<usize>>> {
        ensure_not_empty(text)?;
        let offsets = CharOffsets::new(text);
        let budget = self.chunk_size - self.chunk_overlap;
        let (paragraph, finer) = RECURSIVE_SEPARATORS.split_at(1);

        let mut segments = Vec::new();
        let mut section_start = 0;
        let mut byte_cursor = 0;
        for section in split_keeping_separator(text, paragraph[0]) {
            byte_cursor += section.len();
            let section_end = offsets.char_index(byte_cursor);
            split_recursive(text, &offsets, section_start..section_end, finer, budget, &mut segments);
            if let Some(last) = segments.last_mut() {
                last.hard_break = true;
            }
            section_start = section_end;
        }

        let chunks = pack_segments(&segments, self.chunk_size, self.chunk_overlap);
        debug!(
            strategy = "recursive",
            text_chars = offsets.char_len(),
            segment_count = segments.len(),
            chunk_count = chunks.len(),
            "split text"
        );
        Ok(to_byte_spans(&offsets, chunks))
    }
}

/// Splits text on a single separator and packs the pieces up to `chunk_size`
/// characters.
///
/// No attempt is made to respect sentence or paragraph boundaries, so chunks
/// may end mid-sentence. Pieces longer than `chunk_size - chunk_overlap` are
/// cut at character boundaries so the size bound always holds.
#[derive(Debug, Clone)]
pub struct FixedWidthChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separator: String,
}

impl FixedWidthChunker {
    /// Create a new `FixedWidthChunker` splitting on `"\n"`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if `chunk_overlap >= chunk_size`
    /// or `chunk_size == 0`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunk_params(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap, separator: DEFAULT_FIXED_SEPARATOR.to_string() })
    }

    /// Use a different separator. An empty separator splits on characters only.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

impl Chunker for FixedWidthChunker {
    fn split_spans(&self, text: &str) -> Result<Vec<Range<usize>>> {
        ensure_not_empty(text)?;
        let offsets = CharOffsets::new(text);
        let budget = self.chunk_size - self.chunk_overlap;

        let mut segments = Vec::new();
        let mut piece_start = 0;
        let mut byte_cursor = 0;
        for piece in split_keeping_separator(text, &self.separator) {
            byte_cursor += piece.len();
            let piece_end = offsets.char_index(byte_cursor);
            split_by_chars(piece_start, piece_end, budget, &mut segments);
            piece_start = piece_end;
        }

        let chunks = pack_segments(&segments, self.chunk_size, self.chunk_overlap);
        debug!(
            strategy = "fixed_width",
            text_chars = offsets.char_len(),
            chunk_count = chunks.len(),
            "split text"
        );
        Ok(to_byte_spans(&offsets, chunks))
    }
}

/// Splits text into windows of `chunk_size` tokens, each sharing
/// `chunk_overlap` tokens with the previous window.
///
/// Use this when the downstream model has a token-budgeted context window.
/// Chunk text is the source substring from the first token's start to the last
/// token's end.
#[derive(Clone)]
pub struct TokenChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    tokenizer: Arc<dyn Tokenizer>,
}

impl fmt::Debug for TokenChunker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenChunker")
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("tokenizer", &self.tokenizer.name())
            .finish()
    }
}

impl TokenChunker {
    /// Create a new `TokenChunker`. Sizes are counted in tokens.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if `chunk_overlap >= chunk_size`
    /// or `chunk_size == 0`.
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Result<Self> {
        validate_chunk_params(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap, tokenizer })
    }
}

impl Chunker for TokenChunker {
    fn split_spans(&self, text: &str) -> Result<Vec<Range<usize>>> {
        ensure_not_empty(text)?;
        let tokens = self.tokenizer.tokenize(text)?;
        let step = self.chunk_size - self.chunk_overlap;

        let mut spans = Vec::new();
        let mut start = 0;
        while start < tokens.len() {
            let end = (start + self.chunk_size).min(tokens.len());
            let byte_start = tokens[start].span.start;
            let byte_end = tokens[end - 1].span.end.max(byte_start);
            spans.push(byte_start..byte_end);
            if end == tokens.len() {
                break;
            }
            start += step;
        }

        debug!(
            strategy = "token",
            tokenizer = self.tokenizer.name(),
            token_count = tokens.len(),
            chunk_count = spans.len(),
            "split text"
        );
        Ok(spans)
    }
}
