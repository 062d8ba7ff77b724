// ABOUTME: Integration tests for folders, content, personas, repurposing, snippets and templates
// ABOUTME: Covers ownership isolation and the rule-based generation path end to end
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{long_article, TestServer};
use serde_json::{json, Value};

fn ids(list: &Value) -> Vec<String> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap().to_owned())
        .collect()
}

#[tokio::test]
async fn test_folder_crud_and_duplicate_names() -> Result<()> {
    let server = TestServer::new().await?;
    let token = server.register("folders@example.com").await?;

    let (status, folder) = server
        .post("/api/folders", &token, json!({ "name": "Drafts", "description": "wip" }))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let folder_id = folder["id"].as_str().unwrap().to_owned();

    let (status, body) = server
        .post("/api/folders", &token, json!({ "name": "Drafts" }))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "RESOURCE_ALREADY_EXISTS");

    let (status, renamed) = server
        .put(&format!("/api/folders/{folder_id}"), &token, json!({ "name": "Ideas" }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["name"], "Ideas");

    let (_, list) = server.get("/api/folders", &token).await?;
    assert_eq!(ids(&list["folders"]), vec![folder_id.clone()]);

    let (status, _) = server.delete(&format!("/api/folders/{folder_id}"), &token).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = server.delete(&format!("/api/folders/{folder_id}"), &token).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_content_crud_and_filters() -> Result<()> {
    let server = TestServer::new().await?;
    let token = server.register("writer@example.com").await?;

    let (_, folder) = server
        .post("/api/folders", &token, json!({ "name": "Essays" }))
        .await?;
    let folder_id = folder["id"].as_str().unwrap().to_owned();

    let (status, filed) = server
        .post(
            "/api/content",
            &token,
            json!({
                "title": "On ownership",
                "original_text": "Ownership is Rust's most unique feature.",
                "source_url": "https://blog.example.com/ownership",
                "tags": ["rust", " Rust ", "memory"],
                "folder_id": folder_id,
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(filed["tags"], json!(["rust", "memory"]));
    let filed_id = filed["id"].as_str().unwrap().to_owned();
    let loose_id = server
        .create_content(&token, "Loose note", "Just a short note.")
        .await?;

    let (_, all) = server.get("/api/content", &token).await?;
    assert_eq!(all["content"].as_array().unwrap().len(), 2);

    let (_, in_folder) = server
        .get(&format!("/api/content?folder_id={folder_id}"), &token)
        .await?;
    assert_eq!(ids(&in_folder["content"]), vec![filed_id.clone()]);

    let (_, tagged) = server.get("/api/content?tag=async", &token).await?;
    assert_eq!(ids(&tagged["content"]), vec![loose_id.clone()]);

    let (status, _) = server.get("/api/content?folder_id=nope", &token).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = server
        .put(
            &format!("/api/content/{filed_id}"),
            &token,
            json!({ "title": "On ownership, revised", "source_url": null, "folder_id": null }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "On ownership, revised");
    assert!(updated["source_url"].is_null());
    assert!(updated["folder_id"].is_null());
    assert_eq!(updated["original_text"], "Ownership is Rust's most unique feature.");

    let (status, _) = server.delete(&format!("/api/content/{loose_id}"), &token).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = server.get(&format!("/api/content/{loose_id}"), &token).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_content_validation() -> Result<()> {
    let server = TestServer::new().await?;
    let token = server.register("strict@example.com").await?;

    let (status, body) = server
        .post("/api/content", &token, json!({ "title": "  ", "original_text": "text" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MISSING_REQUIRED_FIELD");

    let (status, body) = server
        .post(
            "/api/content",
            &token,
            json!({ "title": "t", "original_text": "text", "source_url": "ftp://example.com" }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_FORMAT");

    let (status, body) = server
        .post(
            "/api/content",
            &token,
            json!({
                "title": "t",
                "original_text": "text",
                "folder_id": "00000000-0000-4000-8000-000000000000"
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "RESOURCE_NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn test_users_cannot_see_each_others_content() -> Result<()> {
    let server = TestServer::new().await?;
    let owner = server.register("owner@example.com").await?;
    let intruder = server.register("intruder@example.com").await?;
    let content_id = server.create_content(&owner, "Private", "Secret plans.").await?;

    let uri = format!("/api/content/{content_id}");
    assert_eq!(server.get(&uri, &intruder).await?.0, StatusCode::NOT_FOUND);
    assert_eq!(
        server.put(&uri, &intruder, json!({ "title": "Mine" })).await?.0,
        StatusCode::NOT_FOUND
    );
    assert_eq!(server.delete(&uri, &intruder).await?.0, StatusCode::NOT_FOUND);
    assert_eq!(
        server
            .post(&format!("{uri}/repurpose"), &intruder, json!({ "platform": "summary" }))
            .await?
            .0,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        server.get(&format!("{uri}/snippets"), &intruder).await?.0,
        StatusCode::NOT_FOUND
    );

    let (_, list) = server.get("/api/content", &intruder).await?;
    assert!(list["content"].as_array().unwrap().is_empty());
    assert_eq!(server.get(&uri, &owner).await?.0, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_rule_based_thread_repurpose() -> Result<()> {
    let server = TestServer::new().await?;
    let token = server.register("threads@example.com").await?;
    let content_id = server
        .create_content(&token, "Why Rust", &long_article())
        .await?;

    let (status, result) = server
        .post(
            &format!("/api/content/{content_id}/repurpose"),
            &token,
            json!({ "platform": "twitter_thread" }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(result["method"], "rule_based");

    let snippets = result["snippets"].as_array().unwrap();
    let total = snippets.len();
    assert!(total > 1, "a long article should need several tweets");
    let group_id = result["group_id"].as_str().unwrap();
    for (index, snippet) in snippets.iter().enumerate() {
        let text = snippet["text"].as_str().unwrap();
        assert!(text.chars().count() <= 280, "tweet too long: {text}");
        assert!(text.ends_with(&format!("({}/{total})", index + 1)));
        assert_eq!(snippet["group_id"], group_id);
        assert_eq!(snippet["position"], index);
        assert_eq!(snippet["status"], "draft");
    }

    let (status, listed) = server
        .get(&format!("/api/content/{content_id}/snippets"), &token)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["snippets"].as_array().unwrap().len(), total);
    Ok(())
}

#[tokio::test]
async fn test_single_part_platforms_and_ai_only_options() -> Result<()> {
    let server = TestServer::new().await?;
    let token = server.register("summary@example.com").await?;
    let content_id = server
        .create_content(&token, "Why Rust", &long_article())
        .await?;
    let uri = format!("/api/content/{content_id}/repurpose");

    for platform in ["summary", "key_points", "linkedin_post", "newsletter"] {
        let (status, result) = server.post(&uri, &token, json!({ "platform": platform })).await?;
        assert_eq!(status, StatusCode::CREATED, "{platform}: {result}");
        assert_eq!(result["snippets"].as_array().unwrap().len(), 1, "{platform}");
    }

    let (status, body) = server
        .post(&uri, &token, json!({ "platform": "summary", "method": "ai" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MISSING_REQUIRED_FIELD");
    Ok(())
}

#[tokio::test]
async fn test_snippet_edit_and_delete() -> Result<()> {
    let server = TestServer::new().await?;
    let token = server.register("editor@example.com").await?;
    let other = server.register("other-editor@example.com").await?;
    let content_id = server
        .create_content(&token, "Why Rust", &long_article())
        .await?;
    let (_, result) = server
        .post(
            &format!("/api/content/{content_id}/repurpose"),
            &token,
            json!({ "platform": "summary" }),
        )
        .await?;
    let snippet_id = result["snippets"][0]["id"].as_str().unwrap().to_owned();
    let uri = format!("/api/snippets/{snippet_id}");

    let (status, edited) = server
        .put(&uri, &token, json!({ "text": "Hand-tuned summary.", "status": "finalized" }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["text"], "Hand-tuned summary.");
    assert_eq!(edited["status"], "finalized");

    assert_eq!(
        server.put(&uri, &other, json!({ "text": "hijack" })).await?.0,
        StatusCode::NOT_FOUND
    );
    assert_eq!(server.delete(&uri, &other).await?.0, StatusCode::NOT_FOUND);
    assert_eq!(server.delete(&uri, &token).await?.0, StatusCode::NO_CONTENT);

    let (_, listed) = server
        .get(&format!("/api/content/{content_id}/snippets"), &token)
        .await?;
    assert!(listed["snippets"].as_array().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_persona_crud() -> Result<()> {
    let server = TestServer::new().await?;
    let token = server.register("personas@example.com").await?;

    let (status, persona) = server
        .post(
            "/api/personas",
            &token,
            json!({ "name": "CTO", "audience": "engineering leaders", "tone": "direct" }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let persona_id = persona["id"].as_str().unwrap().to_owned();

    let (status, updated) = server
        .put(
            &format!("/api/personas/{persona_id}"),
            &token,
            json!({ "name": "CTO", "tone": "warm" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["tone"], "warm");
    assert!(updated["audience"].is_null());

    let (_, list) = server.get("/api/personas", &token).await?;
    assert_eq!(ids(&list["personas"]), vec![persona_id.clone()]);
    assert_eq!(
        server.delete(&format!("/api/personas/{persona_id}"), &token).await?.0,
        StatusCode::NO_CONTENT
    );
    Ok(())
}

#[tokio::test]
async fn test_templates_marketplace_and_clone() -> Result<()> {
    let server = TestServer::new().await?;
    let author = server.register("author@example.com").await?;
    let reader = server.register("reader@example.com").await?;

    let (status, public) = server
        .post(
            "/api/templates",
            &author,
            json!({
                "name": "Launch summary",
                "platform": "summary",
                "body": "{{title}}: {{content}} {{tags}}",
                "description": "For product launches",
                "is_public": true,
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let public_id = public["id"].as_str().unwrap().to_owned();
    server
        .post(
            "/api/templates",
            &author,
            json!({ "name": "Private", "platform": "summary", "body": "{{content}}" }),
        )
        .await?;

    let (status, market) = server
        .get("/api/templates/marketplace?q=launch&platform=summary", &reader)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&market["templates"]), vec![public_id.clone()]);

    let (status, _) = server
        .get("/api/templates/marketplace?platform=myspace", &reader)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let clone_uri = format!("/api/templates/{public_id}/clone");
    let (status, copy) = server.post(&clone_uri, &reader, json!({})).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(copy["name"], "Launch summary");
    assert_eq!(copy["is_public"], false);
    assert_eq!(copy["source_template_id"], public_id.as_str());

    let (_, second) = server.post(&clone_uri, &reader, json!({})).await?;
    assert_eq!(second["name"], "Launch summary (copy)");
    let (_, third) = server.post(&clone_uri, &reader, json!({})).await?;
    assert_eq!(third["name"], "Launch summary (copy 2)");

    let (_, market) = server.get("/api/templates/marketplace", &reader).await?;
    assert_eq!(market["templates"][0]["use_count"], 3);

    let (_, mine) = server.get("/api/templates", &reader).await?;
    assert_eq!(mine["templates"].as_array().unwrap().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_repurpose_with_template() -> Result<()> {
    let server = TestServer::new().await?;
    let token = server.register("templated@example.com").await?;
    let content_id = server
        .create_content(&token, "Async Rust", "Futures are lazy. They do nothing until polled.")
        .await?;
    let (_, template) = server
        .post(
            "/api/templates",
            &token,
            json!({
                "name": "Tagged",
                "platform": "summary",
                "body": "{{title}} :: {{content}} {{tags}}",
            }),
        )
        .await?;
    let template_id = template["id"].as_str().unwrap();
    let uri = format!("/api/content/{content_id}/repurpose");

    let (status, result) = server
        .post(&uri, &token, json!({ "platform": "summary", "template_id": template_id }))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let text = result["snippets"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Async Rust :: "), "{text}");
    assert!(text.ends_with("#rust #async"), "{text}");

    let (status, body) = server
        .post(
            &uri,
            &token,
            json!({ "platform": "twitter_thread", "template_id": template_id }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
    Ok(())
}

#[tokio::test]
async fn test_tag_filter_ignores_case() -> Result<()> {
    let server = TestServer::new().await?;
    let token = server.register("tags@example.com").await?;

    let body = json!({
        "title": "Ownership",
        "original_text": "Moves and borrows.",
        "tags": ["Rust"],
    });
    let (status, created) = server.post("/api/content", &token, body).await?;
    assert_eq!(status, StatusCode::CREATED);
    let content_id = created["id"].as_str().unwrap().to_owned();

    for tag in ["rust", "RUST", "Rust"] {
        let (status, tagged) = server.get(&format!("/api/content?tag={tag}"), &token).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&tagged["content"]), vec![content_id.clone()], "tag={tag}");
    }

    let (_, untagged) = server.get("/api/content?tag=rusty", &token).await?;
    assert!(ids(&untagged["content"]).is_empty());
    Ok(())
}
