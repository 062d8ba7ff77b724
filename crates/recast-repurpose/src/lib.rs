// ABOUTME: Deterministic content repurposing engine for the Recast platform
// ABOUTME: Segmentation, tweet-thread chunking and rule-based platform generators
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

#![deny(unsafe_code)]

//! # Recast Repurpose
//!
//! Pure, synchronous text processing with no I/O. The server crate calls into
//! this crate for rule-based generation and to post-process LLM output.
//!
//! - **segment**: paragraph and sentence splitting
//! - **chunker**: greedy tweet-thread packing with `(i/N)` suffixes
//! - **rules**: platform generators (thread, `LinkedIn`, summary, key points, newsletter)
//! - **template**: `{{placeholder}}` rendering for user templates

/// Paragraph and sentence segmentation
pub mod segment;

/// Tweet-thread chunking
pub mod chunker;

/// Rule-based generators
pub mod rules;

/// Template rendering
pub mod template;

pub use chunker::{number_segments, reconstruct, strip_ordinal_suffix, ThreadChunker};
pub use rules::{RuleEngine, RuleOutput, SourceContent};
