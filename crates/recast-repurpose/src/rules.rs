// ABOUTME: Rule-based generators producing platform-specific snippets without an LLM
// ABOUTME: Builds threads, LinkedIn posts, summaries, key points and newsletter sections
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! # Rule Engine
//!
//! Deterministic, extractive generators. Every generator works from the
//! sentences of the source text and never invents wording beyond a fixed
//! call-to-action or closing line.

use recast_core::models::Platform;
use serde::Serialize;
use tracing::debug;

use crate::chunker::ThreadChunker;
use crate::segment::{char_len, split_text_sentences, word_count};
use crate::template::{hashtags, render_template};

/// Maximum characters of a `LinkedIn` post
pub const LINKEDIN_MAX_CHARS: usize = 3000;
/// Target length of an extractive summary
pub const SUMMARY_TARGET_WORDS: usize = 60;
/// Maximum number of bullets in a key-points list
pub const MAX_KEY_POINTS: usize = 7;

const LINKEDIN_BODY_PARAGRAPHS: usize = 3;
const LINKEDIN_CALL_TO_ACTION: &str = "What's your take? Share your thoughts below.";
const NEWSLETTER_CLOSING: &str =
    "Thanks for reading. Reply and tell me what you'd like covered next.";
const BULLET: &str = "• ";

/// Source material handed to the generators
#[derive(Debug, Clone, Copy)]
pub struct SourceContent<'a> {
    /// Content title
    pub title: &'a str,
    /// Original long-form text
    pub text: &'a str,
    /// Free-form tags, rendered as hashtags where a platform uses them
    pub tags: &'a [String],
}

/// Result of a rule-based generation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleOutput {
    /// Generated parts in publishing order (a single element for one-part platforms)
    pub parts: Vec<String>,
    /// User-facing notice when nothing could be generated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl RuleOutput {
    fn single(text: String) -> Self {
        Self {
            parts: vec![text],
            notice: None,
        }
    }

    fn empty(notice: impl Into<String>) -> Self {
        Self {
            parts: Vec::new(),
            notice: Some(notice.into()),
        }
    }
}

/// Deterministic snippet generator
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngine {
    chunker: ThreadChunker,
}

impl RuleEngine {
    /// Create an engine using the given thread chunker
    #[must_use]
    pub const fn new(chunker: ThreadChunker) -> Self {
        Self { chunker }
    }

    /// The chunker used for threads
    #[must_use]
    pub const fn chunker(&self) -> &ThreadChunker {
        &self.chunker
    }

    /// Generate snippets for `platform` from `source`
    #[must_use]
    pub fn generate(&self, platform: Platform, source: &SourceContent<'_>) -> RuleOutput {
        if word_count(source.text) == 0 {
            return RuleOutput::empty(empty_notice(platform));
        }
        let output = match platform {
            Platform::TwitterThread => self.thread(source.text),
            Platform::LinkedinPost => RuleOutput::single(linkedin_post(source)),
            Platform::Summary => RuleOutput::single(summary(source.text)),
            Platform::KeyPoints => RuleOutput::single(key_points(source.text)),
            Platform::Newsletter => RuleOutput::single(newsletter(source)),
        };
        debug!(
            platform = platform.as_str(),
            parts = output.parts.len(),
            "Rule-based generation finished"
        );
        output
    }

    /// Generate snippets shaped by a user template.
    ///
    /// For threads the rendered template (with `{{content}}` bound to the
    /// original text) is what gets chunked. For single-part platforms
    /// `{{content}}` is bound to the generated snippet.
    #[must_use]
    pub fn generate_with_template(
        &self,
        platform: Platform,
        source: &SourceContent<'_>,
        template_body: &str,
    ) -> RuleOutput {
        if platform.is_multi_part() {
            let rendered = render_template(template_body, source, source.text);
            let templated = SourceContent {
                text: &rendered,
                ..*source
            };
            return self.generate(platform, &templated);
        }

        let mut output = self.generate(platform, source);
        for part in &mut output.parts {
            *part = render_template(template_body, source, part);
        }
        output
    }

    fn thread(&self, text: &str) -> RuleOutput {
        let parts = self.chunker.chunk(text);
        if parts.is_empty() {
            RuleOutput::empty(empty_notice(Platform::TwitterThread))
        } else {
            RuleOutput {
                parts,
                notice: None,
            }
        }
    }
}

fn empty_notice(platform: Platform) -> String {
    match platform {
        Platform::TwitterThread => "Not enough text to build a thread.".to_owned(),
        Platform::LinkedinPost => "Not enough text to write a LinkedIn post.".to_owned(),
        Platform::Summary => "Not enough text to summarize.".to_owned(),
        Platform::KeyPoints => "Not enough text to extract key points.".to_owned(),
        Platform::Newsletter => "Not enough text to draft a newsletter section.".to_owned(),
    }
}

/// Extractive summary of leading sentences up to roughly [`SUMMARY_TARGET_WORDS`]
#[must_use]
pub fn summary(text: &str) -> String {
    let mut picked = Vec::new();
    let mut words = 0;
    for sentence in split_text_sentences(text).into_iter().flatten() {
        if words >= SUMMARY_TARGET_WORDS {
            break;
        }
        words += word_count(&sentence);
        picked.push(sentence);
    }
    picked.join(" ")
}

/// One bullet per paragraph, taken from its first sentence
#[must_use]
pub fn key_points(text: &str) -> String {
    split_text_sentences(text)
        .into_iter()
        .filter_map(|paragraph| paragraph.into_iter().next())
        .take(MAX_KEY_POINTS)
        .map(|sentence| format!("{BULLET}{sentence}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn linkedin_post(source: &SourceContent<'_>) -> String {
    let paragraphs = split_text_sentences(source.text);
    let first_sentence = paragraphs
        .first()
        .and_then(|p| p.first())
        .cloned()
        .unwrap_or_default();
    let hook = if source.title.trim().is_empty() {
        first_sentence.clone()
    } else {
        source.title.trim().to_owned()
    };

    let mut body: Vec<String> = paragraphs
        .iter()
        .map(|p| {
            p.iter()
                .filter(|s| **s != hook)
                .take(2)
                .cloned()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|p| !p.is_empty())
        .take(LINKEDIN_BODY_PARAGRAPHS)
        .collect();

    let tags = hashtags(source.tags);
    loop {
        let mut sections = vec![hook.clone()];
        sections.extend(body.iter().cloned());
        sections.push(LINKEDIN_CALL_TO_ACTION.to_owned());
        if !tags.is_empty() {
            sections.push(tags.clone());
        }
        let post = sections.join("\n\n");
        if char_len(&post) <= LINKEDIN_MAX_CHARS || body.is_empty() {
            return truncate_on_sentence(&post, LINKEDIN_MAX_CHARS);
        }
        body.pop();
    }
}

fn newsletter(source: &SourceContent<'_>) -> String {
    let mut sections = Vec::new();
    if !source.title.trim().is_empty() {
        sections.push(format!("## {}", source.title.trim()));
    }
    sections.push(summary(source.text));
    let points = key_points(source.text);
    if !points.is_empty() {
        sections.push(format!("Key points:\n{points}"));
    }
    sections.push(NEWSLETTER_CLOSING.to_owned());
    sections.join("\n\n")
}

/// Cut `text` to at most `max_chars`, backing up to the last sentence end
#[must_use]
pub fn truncate_on_sentence(text: &str, max_chars: usize) -> String {
    if char_len(text) <= max_chars {
        return text.to_owned();
    }
    let prefix: String = text.chars().take(max_chars).collect();
    let cut = prefix
        .rfind(['.', '!', '?'])
        .map_or(prefix.len(), |idx| idx + 1);
    prefix[..cut].trim_end().to_owned()
}
