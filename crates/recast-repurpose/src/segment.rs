// ABOUTME: Paragraph and sentence segmentation for long-form prose
// ABOUTME: Splits on blank lines and terminal punctuation while normalizing whitespace
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! Text segmentation.
//!
//! A paragraph is a run of non-blank lines. A sentence ends at a run of `.`,
//! `!` or `?`, optionally followed by closing quotes or brackets, when that run
//! is followed by whitespace or the end of the paragraph. Text left after the
//! last terminator is a sentence of its own. No non-whitespace character is
//! ever dropped.

const fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}

const fn is_closing(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '”' | '’' | '»')
}

/// Split text into paragraphs delimited by blank (or whitespace-only) lines
#[must_use]
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim());
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }
    paragraphs
}

/// Split one paragraph into whitespace-normalized sentences
#[must_use]
pub fn split_sentences(paragraph: &str) -> Vec<String> {
    let chars: Vec<(usize, char)> = paragraph.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        if !is_terminal(chars[i].1) {
            i += 1;
            continue;
        }
        let mut j = i;
        while j < chars.len() && is_terminal(chars[j].1) {
            j += 1;
        }
        while j < chars.len() && is_closing(chars[j].1) {
            j += 1;
        }
        if j == chars.len() || chars[j].1.is_whitespace() {
            let end = chars.get(j).map_or(paragraph.len(), |(idx, _)| *idx);
            push_normalized(&mut sentences, &paragraph[start..end]);
            start = end;
        }
        i = j;
    }
    push_normalized(&mut sentences, &paragraph[start..]);
    sentences
}

/// All sentences of a text, paragraph by paragraph
#[must_use]
pub fn split_text_sentences(text: &str) -> Vec<Vec<String>> {
    split_paragraphs(text)
        .iter()
        .map(|p| split_sentences(p))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Collapse every whitespace run into a single space and trim the ends
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Number of whitespace-separated words
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Length in Unicode scalar values, the unit every character budget uses
#[must_use]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn push_normalized(out: &mut Vec<String>, raw: &str) {
    let sentence = normalize_whitespace(raw);
    if !sentence.is_empty() {
        out.push(sentence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraphs_split_on_blank_and_whitespace_lines() {
        let text = "First line\nstill first.\n\n   \nSecond.\n\n\n\nThird.";
        let paragraphs = split_paragraphs(text);
        assert_eq!(
            paragraphs,
            vec!["First line\nstill first.", "Second.", "Third."]
        );
    }

    #[test]
    fn test_sentences_keep_closing_quotes_and_trailing_fragment() {
        let sentences = split_sentences("He said \"stop!\" Then   he left... And then");
        assert_eq!(
            sentences,
            vec!["He said \"stop!\"", "Then he left...", "And then"]
        );
    }

    #[test]
    fn test_punctuation_inside_words_does_not_split() {
        let sentences = split_sentences("Version 2.5 shipped on example.com today. Nice");
        assert_eq!(
            sentences,
            vec!["Version 2.5 shipped on example.com today.", "Nice"]
        );
    }

    #[test]
    fn test_empty_input_has_no_segments() {
        assert!(split_paragraphs("").is_empty());
        assert!(split_paragraphs(" \n\t\n").is_empty());
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_char_len_counts_scalars_not_bytes() {
        assert_eq!(char_len("café"), 4);
        assert_eq!("café".len(), 5);
    }
}
