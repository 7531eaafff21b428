//! Property tests for chunk geometry across strategies.

use std::sync::Arc;

use docrag::{
    Chunker, FixedWidthChunker, RecursiveChunker, RegexTokenizer, TokenChunker, Tokenizer,
};
use proptest::prelude::*;

/// Rebuild the source from chunks by dropping each later chunk's overlap prefix.
fn reconstruct(chunks: &[String], overlap: usize) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let skip = if i == 0 { 0 } else { overlap };
        out.extend(chunk.chars().skip(skip));
    }
    out
}

/// Prose-like text with paragraph breaks, sentences and multibyte letters.
fn arb_text() -> impl Strategy<Value = String> {
    "([a-zé]{1,12}[ .,]{0,2}(\n\n|\n| ){0,1}){1,60}"
}

/// A `(chunk_size, chunk_overlap)` pair with overlap strictly below size.
fn arb_geometry() -> impl Strategy<Value = (usize, usize)> {
    (1usize..80).prop_flat_map(|size| (Just(size), 0..size))
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn check_geometry(
    chunks: &[String],
    text: &str,
    size: usize,
    overlap: usize,
) -> Result<(), TestCaseError> {
    prop_assert!(!chunks.is_empty());
    for chunk in chunks {
        prop_assert!(char_len(chunk) <= size, "chunk {:?} exceeds {}", chunk, size);
    }
    for pair in chunks.windows(2) {
        let tail: String = pair[0].chars().skip(char_len(&pair[0]) - overlap).collect();
        let head: String = pair[1].chars().take(overlap).collect();
        prop_assert_eq!(tail, head);
    }
    prop_assert_eq!(reconstruct(chunks, overlap), text);
    Ok(())
}

mod prop_recursive {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_rebuild_text_and_respect_bounds(text in arb_text(), (size, overlap) in arb_geometry()) {
            let chunker = RecursiveChunker::new(size, overlap).unwrap();
            let chunks = chunker.split_text(&text).unwrap();
            check_geometry(&chunks, &text, size, overlap)?;
        }

        #[test]
        fn chunking_is_idempotent(text in arb_text(), (size, overlap) in arb_geometry()) {
            let chunker = RecursiveChunker::new(size, overlap).unwrap();
            prop_assert_eq!(chunker.split_text(&text).unwrap(), chunker.split_text(&text).unwrap());
        }
    }
}

mod prop_fixed_width {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_rebuild_text_and_respect_bounds(text in arb_text(), (size, overlap) in arb_geometry()) {
            let chunker = FixedWidthChunker::new(size, overlap).unwrap();
            let chunks = chunker.split_text(&text).unwrap();
            check_geometry(&chunks, &text, size, overlap)?;
        }
    }
}

mod prop_token {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn windows_advance_by_size_minus_overlap(text in arb_text(), (size, overlap) in arb_geometry()) {
            let tokenizer = Arc::new(RegexTokenizer::new());
            let tokens = tokenizer.tokenize(&text).unwrap();
            let chunker = TokenChunker::new(size, overlap, tokenizer).unwrap();
            let spans = chunker.split_spans(&text).unwrap();

            let step = size - overlap;
            for (i, span) in spans.iter().enumerate() {
                let first = i * step;
                let last = (first + size).min(tokens.len()) - 1;
                prop_assert_eq!(span.start, tokens[first].span.start);
                prop_assert_eq!(span.end, tokens[last].span.end);
            }
            prop_assert_eq!(spans.last().unwrap().end, text.len());
        }
    }
}

#[test]
fn regex_tokens_tile_the_input() {
    let text = "Don't panic: it's 2024, and the café opens at 09:30.\n\nBye!";
    let tokens = RegexTokenizer::new().tokenize(text).unwrap();
    let joined: String = tokens.iter().map(|t| t.text(text)).collect();
    assert_eq!(joined, text);
    for pair in tokens.windows(2) {
        assert_eq!(pair[0].span.end, pair[1].span.start);
    }
}

#[test]
fn paragraph_example_splits_in_two() {
    let chunker = RecursiveChunker::new(20, 0).unwrap();
    let chunks = chunker.split_text("para one.\n\npara two.").unwrap();
    assert_eq!(chunks, ["para one.\n\n", "para two."]);
}
