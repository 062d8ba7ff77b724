// ABOUTME: Criterion benchmarks for rule-based repurposing and snippet persistence
// ABOUTME: Measures thread chunking, per-platform rule generation and storing snippet groups
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! Criterion benchmarks for the repurposing hot path.
//!
//! Articles of increasing length are chunked into threads and run through every
//! platform rule, then the resulting parts are stored as a snippet group.

#![allow(
    clippy::missing_docs_in_private_items,
    clippy::unwrap_used,
    missing_docs
)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use recast_core::models::{GenerationMethod, Platform};
use recast_repurpose::{RuleEngine, SourceContent, ThreadChunker};
use recast_server::crypto::SecretCipher;
use recast_server::database::{
    ContentManager, Database, NewContent, NewSnippetGroup, SnippetsManager,
};
use recast_server::models::User;
use tokio::runtime::Runtime;

const SENTENCES: &[&str] = &[
    "Rust gives you memory safety without a garbage collector.",
    "The borrow checker rejects data races before the program ever runs.",
    "Async functions compile down to state machines polled by an executor.",
    "Tokio schedules those futures on a work-stealing pool of threads.",
    "Traits let libraries describe behaviour without dictating representation.",
    "Zero-cost abstractions mean iterators compile to the loops you would write by hand.",
];

/// Article of `paragraphs` paragraphs with four sentences each
fn generate_article(paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|p| {
            (0..4)
                .map(|s| SENTENCES[(p * 4 + s) % SENTENCES.len()])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn bench_thread_chunking(c: &mut Criterion) {
    let mut group = c.benchmark_group("thread_chunking");
    let chunker = ThreadChunker::default();

    for paragraphs in [4, 32, 256] {
        let article = generate_article(paragraphs);
        group.throughput(Throughput::Bytes(article.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(paragraphs),
            &article,
            |b, article| b.iter(|| chunker.chunk(black_box(article))),
        );
    }

    group.finish();
}

fn bench_rule_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("rule_engine");
    let engine = RuleEngine::default();
    let article = generate_article(32);
    let tags = vec!["rust".to_owned(), "async".to_owned()];
    let source = SourceContent {
        title: "Why Rust",
        text: &article,
        tags: &tags,
    };

    for platform in [
        Platform::TwitterThread,
        Platform::LinkedinPost,
        Platform::Summary,
        Platform::KeyPoints,
        Platform::Newsletter,
    ] {
        group.bench_function(platform.as_str(), |b| {
            b.iter(|| engine.generate(black_box(platform), black_box(&source)));
        });
    }

    group.bench_function("twitter_thread_with_template", |b| {
        b.iter(|| {
            engine.generate_with_template(
                Platform::TwitterThread,
                black_box(&source),
                "{{title}}\n\n{{content}}\n\n{{tags}}",
            )
        });
    });

    group.finish();
}

fn bench_snippet_group_storage(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("snippet_group_storage");

    let (database, user_id, content_id) = rt.block_on(async {
        let database = Database::new("sqlite::memory:", SecretCipher::new([0u8; 32]))
            .await
            .unwrap();
        let user = User::new("bench@example.com".to_owned(), "hash".to_owned(), None);
        database.create_user(&user).await.unwrap();
        let content = ContentManager::new(database.pool().clone())
            .create(
                user.id,
                NewContent {
                    title: "Why Rust".to_owned(),
                    original_text: generate_article(32),
                    source_url: None,
                    tags: vec!["rust".to_owned()],
                    folder_id: None,
                },
            )
            .await
            .unwrap();
        (database, user.id, content.id)
    });

    let parts = ThreadChunker::default().chunk(&generate_article(32));
    let snippets = SnippetsManager::new(database.pool().clone());
    group.throughput(Throughput::Elements(parts.len() as u64));
    group.bench_function("thread_group", |b| {
        b.to_async(&rt).iter(|| async {
            snippets
                .create_group(
                    user_id,
                    NewSnippetGroup {
                        content_id,
                        platform: Platform::TwitterThread,
                        method: GenerationMethod::RuleBased,
                        provider: None,
                        parts: parts.clone(),
                    },
                )
                .await
                .unwrap()
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_thread_chunking,
    bench_rule_engine,
    bench_snippet_group_storage,
);
criterion_main!(benches);
