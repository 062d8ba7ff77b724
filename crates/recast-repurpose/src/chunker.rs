// ABOUTME: Greedy tweet-thread chunker that packs sentences into character-budgeted segments
// ABOUTME: Appends two-pass (i/N) ordinal suffixes once the total segment count is known
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! # Thread Chunking
//!
//! Sentences are packed greedily into a buffer bounded by the chunk budget
//! (`max_chars - reserved_suffix`). Sentences inside a paragraph are joined
//! with a single space; a buffer carried over a paragraph boundary keeps the
//! break as a blank line. At the end of each paragraph the buffer is flushed
//! once it holds more than a third of the budget.
//!
//! A sentence longer than the budget is never split or truncated; it becomes
//! an oversized segment on its own.

use std::mem;

use recast_core::constants::twitter::{MAX_TWEET_CHARS, THREAD_SUFFIX_RESERVE};

use crate::segment::{char_len, split_text_sentences};

const SENTENCE_SEPARATOR: &str = " ";
const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Splits prose into tweet-sized segments along sentence boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadChunker {
    max_chars: usize,
    reserved_suffix: usize,
}

impl Default for ThreadChunker {
    fn default() -> Self {
        Self::new(MAX_TWEET_CHARS, THREAD_SUFFIX_RESERVE)
    }
}

impl ThreadChunker {
    /// Create a chunker for segments of at most `max_chars`, keeping
    /// `reserved_suffix` characters free for the ordinal suffix
    #[must_use]
    pub const fn new(max_chars: usize, reserved_suffix: usize) -> Self {
        Self {
            max_chars,
            reserved_suffix,
        }
    }

    /// Characters available to the core text of each segment
    #[must_use]
    pub const fn budget(&self) -> usize {
        self.max_chars.saturating_sub(self.reserved_suffix)
    }

    /// Segment `text` without ordinal suffixes
    #[must_use]
    pub fn chunk_cores(&self, text: &str) -> Vec<String> {
        let budget = self.budget();
        let mut packer = Packer::default();

        for paragraph in split_text_sentences(text) {
            for sentence in paragraph {
                packer.push(sentence, budget);
            }
            packer.end_paragraph(budget / 3);
        }
        packer.finish()
    }

    /// Segment `text` and append ` (i/N)` to every segment
    #[must_use]
    pub fn chunk(&self, text: &str) -> Vec<String> {
        number_segments(self.chunk_cores(text))
    }
}

/// Append ` (i/N)` to each core once the total count is known
#[must_use]
pub fn number_segments(cores: Vec<String>) -> Vec<String> {
    let total = cores.len();
    cores
        .into_iter()
        .enumerate()
        .map(|(index, core)| format!("{core} ({}/{total})", index + 1))
        .collect()
}

#[derive(Default)]
struct Packer {
    segments: Vec<String>,
    buffer: String,
    buffer_len: usize,
    paragraph_break: bool,
}

impl Packer {
    fn push(&mut self, sentence: String, budget: usize) {
        let sentence_len = char_len(&sentence);
        if self.buffer.is_empty() {
            self.buffer = sentence;
            self.buffer_len = sentence_len;
            self.paragraph_break = false;
            return;
        }

        let separator = if self.paragraph_break {
            PARAGRAPH_SEPARATOR
        } else {
            SENTENCE_SEPARATOR
        };
        let combined = self.buffer_len + separator.len() + sentence_len;
        if combined > budget {
            self.flush();
            self.buffer = sentence;
            self.buffer_len = sentence_len;
        } else {
            self.buffer.push_str(separator);
            self.buffer.push_str(&sentence);
            self.buffer_len = combined;
        }
        self.paragraph_break = false;
    }

    fn end_paragraph(&mut self, flush_threshold: usize) {
        if self.buffer_len > flush_threshold {
            self.flush();
        } else if !self.buffer.is_empty() {
            self.paragraph_break = true;
        }
    }

    fn flush(&mut self) {
        if !self.buffer.is_empty() {
            self.segments.push(mem::take(&mut self.buffer));
        }
        self.buffer_len = 0;
        self.paragraph_break = false;
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.segments
    }
}

/// Remove a trailing ` (i/N)` ordinal suffix, if present
#[must_use]
pub fn strip_ordinal_suffix(segment: &str) -> &str {
    let Some(inner) = segment.strip_suffix(')') else {
        return segment;
    };
    let Some(open) = inner.rfind(" (") else {
        return segment;
    };
    let Some((index, total)) = inner[open + 2..].split_once('/') else {
        return segment;
    };
    let is_number = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if is_number(index) && is_number(total) {
        &segment[..open]
    } else {
        segment
    }
}

/// Rebuild prose from segment cores so that re-chunking yields the same cores
#[must_use]
pub fn reconstruct<S: AsRef<str>>(cores: &[S]) -> String {
    cores
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(PARAGRAPH_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::split_sentences;

    fn sentence_of_len(len: usize, seed: char) -> String {
        let mut s = seed.to_string().repeat(len - 1);
        s.push('.');
        s
    }

    fn all_sentences(text: &str) -> Vec<String> {
        split_text_sentences(text).into_iter().flatten().collect()
    }

    fn sample_article() -> String {
        let mut text = String::new();
        for p in 0..6 {
            for s in 0..(p + 2) {
                text.push_str(&format!(
                    "Paragraph {p} makes point number {s} about shipping software in small steps. "
                ));
            }
            text.push_str("\n\n");
        }
        text.push_str("A closing thought without punctuation");
        text
    }

    #[test]
    fn test_two_short_sentences_fit_in_one_segment() {
        let chunker = ThreadChunker::default();
        let segments = chunker.chunk("Short sentence one. Short sentence two.");
        assert_eq!(
            segments,
            vec!["Short sentence one. Short sentence two. (1/1)"]
        );
    }

    #[test]
    fn test_empty_input_yields_no_segments() {
        let chunker = ThreadChunker::default();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("  \n\n \t").is_empty());
    }

    #[test]
    fn test_sentences_just_under_half_budget_pair_up() {
        let chunker = ThreadChunker::new(280, 10);
        let half = chunker.budget() / 2;
        for n in 1..=7_usize {
            let text = (0..n)
                .map(|i| sentence_of_len(half - 1, char::from(b'a' + i as u8)))
                .collect::<Vec<_>>()
                .join(" ");
            let cores = chunker.chunk_cores(&text);
            assert_eq!(cores.len(), n.div_ceil(2), "n = {n}");
            for core in &cores[..cores.len() - 1] {
                assert_eq!(split_sentences(core).len(), 2);
            }
        }
    }

    #[test]
    fn test_cores_reconstruct_original_sentences() {
        let chunker = ThreadChunker::default();
        let text = sample_article();
        let cores = chunker.chunk_cores(&text);
        assert!(cores.len() > 1);

        let rebuilt: Vec<String> = cores.iter().flat_map(|c| all_sentences(c)).collect();
        assert_eq!(rebuilt, all_sentences(&text));
    }

    #[test]
    fn test_suffix_stripping_recovers_cores() {
        let chunker = ThreadChunker::default();
        let text = sample_article();
        let cores = chunker.chunk_cores(&text);
        let suffixed = chunker.chunk(&text);
        let stripped: Vec<&str> = suffixed.iter().map(|s| strip_ordinal_suffix(s)).collect();
        assert_eq!(stripped, cores);
        assert!(suffixed[0].ends_with(&format!("(1/{})", cores.len())));
    }

    #[test]
    fn test_no_core_exceeds_budget_unless_single_oversized_sentence() {
        let chunker = ThreadChunker::new(120, 10);
        let long = sentence_of_len(300, 'x');
        let article = sample_article();
        let text = format!("{article}\n\nTiny one. {long} After the long one.\n\n{article}");

        for core in chunker.chunk_cores(&text) {
            if char_len(&core) > chunker.budget() {
                assert_eq!(all_sentences(&core), vec![core.clone()]);
            }
        }
    }

    #[test]
    fn test_oversized_sentence_is_emitted_whole() {
        let chunker = ThreadChunker::default();
        let long = sentence_of_len(400, 'z');
        let cores = chunker.chunk_cores(&format!("Intro here. {long} Outro."));
        assert_eq!(cores, vec!["Intro here.".to_owned(), long, "Outro.".to_owned()]);
    }

    #[test]
    fn test_rechunking_reconstruction_is_idempotent() {
        for chunker in [ThreadChunker::default(), ThreadChunker::new(90, 10)] {
            let cores = chunker.chunk_cores(&sample_article());
            let again = chunker.chunk_cores(&reconstruct(&cores));
            assert_eq!(again, cores);
        }
    }

    #[test]
    fn test_short_paragraph_carries_into_next_with_blank_line() {
        let chunker = ThreadChunker::default();
        let cores = chunker.chunk_cores("Hi.\n\nThis follows.");
        assert_eq!(cores, vec!["Hi.\n\nThis follows.".to_owned()]);
    }

    #[test]
    fn test_long_paragraph_flushes_at_paragraph_end() {
        let chunker = ThreadChunker::default();
        let first = sentence_of_len(chunker.budget() / 3 + 5, 'a');
        let cores = chunker.chunk_cores(&format!("{first}\n\nNext."));
        assert_eq!(cores, vec![first, "Next.".to_owned()]);
    }

    #[test]
    fn test_strip_ordinal_suffix_leaves_other_parentheses() {
        assert_eq!(strip_ordinal_suffix("Hello (3/12)"), "Hello");
        assert_eq!(strip_ordinal_suffix("Hello (see below)"), "Hello (see below)");
        assert_eq!(strip_ordinal_suffix("Ratio (1/x)"), "Ratio (1/x)");
        assert_eq!(strip_ordinal_suffix("plain"), "plain");
    }

    #[test]
    fn test_every_suffixed_segment_fits_when_cores_fit() {
        let chunker = ThreadChunker::default();
        for segment in chunker.chunk(&sample_article()) {
            assert!(char_len(&segment) <= 280, "{segment}");
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn sentence_strategy() -> impl Strategy<Value = String> {
        (
            prop::collection::vec("[a-zA-Z0-9,]{1,14}", 1..40),
            prop_oneof![Just("."), Just("!"), Just("?"), Just("..."), Just("?!")],
        )
            .prop_map(|(words, terminator)| format!("{}{terminator}", words.join(" ")))
    }

    fn paragraph_strategy() -> impl Strategy<Value = String> {
        (
            prop::collection::vec(sentence_strategy(), 1..8),
            prop_oneof![Just(" "), Just("  "), Just("\n")],
        )
            .prop_map(|(sentences, joiner)| sentences.join(joiner))
    }

    fn article_strategy() -> impl Strategy<Value = String> {
        (
            prop::collection::vec(paragraph_strategy(), 1..6),
            prop_oneof![Just("\n\n"), Just("\n \n"), Just("\n\n\n"), Just("\r\n\r\n")],
        )
            .prop_map(|(paragraphs, blank)| paragraphs.join(blank))
    }

    fn chunker_strategy() -> impl Strategy<Value = ThreadChunker> {
        prop_oneof![Just(280_usize), Just(120), Just(60)]
            .prop_map(|max_chars| ThreadChunker::new(max_chars, THREAD_SUFFIX_RESERVE))
    }

    fn sentences_of(text: &str) -> Vec<String> {
        split_text_sentences(text).into_iter().flatten().collect()
    }

    proptest! {
        /// Concatenated core sentences equal the input's sentences in order
        #[test]
        fn prop_cores_preserve_sentences(
            text in article_strategy(),
            chunker in chunker_strategy(),
        ) {
            let cores = chunker.chunk_cores(&text);
            let rebuilt: Vec<String> = cores.iter().flat_map(|c| sentences_of(c)).collect();
            prop_assert_eq!(rebuilt, sentences_of(&text));
        }

        /// A core over budget holds exactly one sentence
        #[test]
        fn prop_cores_respect_budget(text in article_strategy(), chunker in chunker_strategy()) {
            for core in chunker.chunk_cores(&text) {
                if char_len(&core) > chunker.budget() {
                    prop_assert_eq!(sentences_of(&core).len(), 1, "{}", core);
                }
            }
        }

        /// Re-chunking the reconstructed cores yields the same cores
        #[test]
        fn prop_rechunking_is_idempotent(
            text in article_strategy(),
            chunker in chunker_strategy(),
        ) {
            let cores = chunker.chunk_cores(&text);
            prop_assert_eq!(chunker.chunk_cores(&reconstruct(&cores)), cores);
        }

        /// Numbered segments strip back to their cores
        #[test]
        fn prop_suffixes_strip_to_cores(text in article_strategy(), chunker in chunker_strategy()) {
            let cores = chunker.chunk_cores(&text);
            let numbered = number_segments(cores.clone());
            let stripped: Vec<&str> = numbered.iter().map(|s| strip_ordinal_suffix(s)).collect();
            prop_assert_eq!(stripped, cores);
        }
    }
}
