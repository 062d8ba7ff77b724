// ABOUTME: Integration tests for the Twitter PKCE connect flow, thread publishing and state cleanup
// ABOUTME: A local axum app stands in for the Twitter token and v2 API endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::{Duration, Utc};
use common::{long_article, test_config, TestServer, TEST_ADMIN_KEY};
use recast_server::database::OAuthStatesManager;
use recast_server::models::TwitterOAuthState;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use url::Url;
use uuid::Uuid;
use zeroize::Zeroizing;

#[derive(Default)]
struct FakeTwitter {
    token_requests: Mutex<Vec<HashMap<String, String>>>,
    tweets: Mutex<Vec<Value>>,
    tweet_auth: Mutex<Vec<String>>,
    reject_grants: AtomicBool,
    next_id: AtomicU64,
}

async fn fake_token(
    State(fake): State<Arc<FakeTwitter>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let refreshing = form.get("grant_type").is_some_and(|g| g == "refresh_token");
    fake.token_requests.lock().unwrap().push(form);
    if fake.reject_grants.load(Ordering::SeqCst) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_request",
                "error_description": "Value passed for the authorization code was invalid."
            })),
        )
            .into_response();
    }
    let (access, refresh) = if refreshing {
        ("refreshed-access", "rotated-refresh")
    } else {
        ("fake-access", "fake-refresh")
    };
    Json(json!({
        "access_token": access,
        "token_type": "bearer",
        "expires_in": 7200,
        "refresh_token": refresh,
        "scope": "tweet.read tweet.write users.read offline.access"
    }))
    .into_response()
}

async fn fake_me() -> Json<Value> {
    Json(json!({ "data": { "id": "42", "username": "recast_dev", "name": "Recast" } }))
}

async fn fake_tweet(
    State(fake): State<Arc<FakeTwitter>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let id = 1000 + fake.next_id.fetch_add(1, Ordering::SeqCst);
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    fake.tweet_auth.lock().unwrap().push(auth);
    let text = body["text"].clone();
    fake.tweets.lock().unwrap().push(body);
    Json(json!({ "data": { "id": id.to_string(), "text": text } }))
}

async fn spawn_fake_twitter() -> Result<(SocketAddr, Arc<FakeTwitter>)> {
    let fake = Arc::new(FakeTwitter::default());
    let app = Router::new()
        .route("/oauth2/token", post(fake_token))
        .route("/2/users/me", get(fake_me))
        .route("/2/tweets", post(fake_tweet))
        .with_state(Arc::clone(&fake));
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((addr, fake))
}

async fn twitter_server(addr: SocketAddr) -> Result<TestServer> {
    let token_url = format!("http://{addr}/oauth2/token");
    let api_base = format!("http://{addr}/2");
    let config = test_config(&[
        ("TWITTER_CLIENT_ID", "recast-client"),
        ("TWITTER_CLIENT_SECRET", "recast-secret"),
        ("TWITTER_REDIRECT_URI", "https://api.recast.test/api/twitter/callback"),
        ("TWITTER_TOKEN_URL", token_url.as_str()),
        ("TWITTER_API_BASE_URL", api_base.as_str()),
    ])?;
    TestServer::with_config(config).await
}

/// Follow the callback and return the redirect target
async fn callback(server: &TestServer, query: &str) -> Result<String> {
    let request = Request::builder()
        .uri(format!("/api/twitter/callback?{query}"))
        .body(Body::empty())?;
    let (status, headers, _) = server.send(request).await?;
    assert!(status.is_redirection(), "callback answered {status}");
    Ok(headers[header::LOCATION].to_str()?.to_owned())
}

fn query_param(url: &str, key: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

async fn user_id(server: &TestServer, token: &str) -> Result<Uuid> {
    let (_, me) = server.get("/api/auth/me", token).await?;
    Ok(Uuid::parse_str(me["user_id"].as_str().unwrap())?)
}

/// Run the connect flow to completion and return the bearer token
async fn connected_user(server: &TestServer, email: &str) -> Result<String> {
    let token = server.register(email).await?;
    let (_, connect) = server.get("/api/twitter/connect", &token).await?;
    let state = connect["state"].as_str().unwrap();
    let location = callback(server, &format!("state={state}&code=auth-code")).await?;
    assert!(location.ends_with("twitter=connected"), "{location}");
    Ok(token)
}

/// Store a thread snippet group and return its id
async fn thread_group(server: &TestServer, token: &str) -> Result<Value> {
    let content_id = server.create_content(token, "Why Rust", &long_article()).await?;
    let (_, repurposed) = server
        .post(
            &format!("/api/content/{content_id}/repurpose"),
            token,
            json!({ "platform": "twitter_thread" }),
        )
        .await?;
    Ok(repurposed["group_id"].clone())
}

#[tokio::test]
async fn test_twitter_routes_need_configuration() -> Result<()> {
    let server = TestServer::new().await?;
    let token = server.register("untwittered@example.com").await?;

    let (status, body) = server.get("/api/twitter/connect", &token).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "CONFIG_MISSING");

    let (status, _) = server.get("/api/twitter/status", &token).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}

#[tokio::test]
async fn test_connect_callback_and_publish_thread() -> Result<()> {
    let (addr, fake) = spawn_fake_twitter().await?;
    let server = twitter_server(addr).await?;
    let token = server.register("tweeter@example.com").await?;

    let (status, connect) = server.get("/api/twitter/connect", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(connect["expires_in_minutes"], 15);
    let authorization_url = connect["authorization_url"].as_str().unwrap();
    let state = connect["state"].as_str().unwrap();
    assert_eq!(query_param(authorization_url, "state").as_deref(), Some(state));
    assert_eq!(query_param(authorization_url, "client_id").as_deref(), Some("recast-client"));
    assert_eq!(
        query_param(authorization_url, "code_challenge_method").as_deref(),
        Some("S256")
    );

    let location = callback(&server, &format!("state={state}&code=auth-code")).await?;
    assert_eq!(location, "https://app.recast.test/settings?twitter=connected");
    {
        let requests = fake.token_requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["code"], "auth-code");
        assert_eq!(requests[0]["grant_type"], "authorization_code");
        assert!(requests[0].contains_key("code_verifier"));
    }

    let (_, status_body) = server.get("/api/twitter/status", &token).await?;
    assert_eq!(status_body["connected"], true);
    assert_eq!(status_body["username"], "recast_dev");

    let replay = callback(&server, &format!("state={state}&code=auth-code")).await?;
    assert!(replay.ends_with("reason=invalid_state"), "{replay}");

    let content_id = server
        .create_content(&token, "Why Rust", &long_article())
        .await?;
    let (_, repurposed) = server
        .post(
            &format!("/api/content/{content_id}/repurpose"),
            &token,
            json!({ "platform": "twitter_thread" }),
        )
        .await?;
    let group_id = repurposed["group_id"].as_str().unwrap();
    let parts = repurposed["snippets"].as_array().unwrap().len();

    let (status, thread) = server
        .post("/api/twitter/threads", &token, json!({ "group_id": group_id }))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{thread}");
    let tweets = thread["tweets"].as_array().unwrap();
    assert_eq!(tweets.len(), parts);
    assert!(tweets[0]["url"].as_str().unwrap().contains("/recast_dev/status/"));

    let sent = fake.tweets.lock().unwrap().clone();
    assert!(sent[0].get("reply").is_none());
    assert_eq!(sent[1]["reply"]["in_reply_to_tweet_id"], tweets[0]["id"]);

    let (_, listed) = server
        .get(&format!("/api/content/{content_id}/snippets"), &token)
        .await?;
    for snippet in listed["snippets"].as_array().unwrap() {
        assert_eq!(snippet["status"], "finalized");
    }

    let (_, disconnected) = server.post("/api/twitter/disconnect", &token, json!({})).await?;
    assert_eq!(disconnected["disconnected"], true);
    let (_, me) = server.get("/api/auth/me", &token).await?;
    assert!(me["twitter_username"].is_null());
    Ok(())
}

#[tokio::test]
async fn test_callback_failure_reasons() -> Result<()> {
    let (addr, fake) = spawn_fake_twitter().await?;
    let server = twitter_server(addr).await?;
    let token = server.register("declined@example.com").await?;

    let location = callback(&server, "state=never-issued&code=x").await?;
    assert_eq!(
        location,
        "https://app.recast.test/settings?twitter=error&reason=invalid_state"
    );

    let (_, connect) = server.get("/api/twitter/connect", &token).await?;
    let state = connect["state"].as_str().unwrap().to_owned();
    let location = callback(&server, &format!("state={state}&error=access_denied")).await?;
    assert!(location.ends_with("reason=denied"), "{location}");
    let location = callback(&server, &format!("state={state}&code=late")).await?;
    assert!(location.ends_with("reason=invalid_state"), "{location}");

    let (_, me) = server.get("/api/auth/me", &token).await?;
    let user_id = Uuid::parse_str(me["user_id"].as_str().unwrap())?;
    let issued = Utc::now() - Duration::minutes(30);
    OAuthStatesManager::new(server.resources.database.pool().clone())
        .create(&TwitterOAuthState {
            state: "stale-state".to_owned(),
            user_id,
            code_verifier: Zeroizing::new("verifier".to_owned()),
            created_at: issued,
            expires_at: issued + Duration::minutes(15),
        })
        .await?;
    let location = callback(&server, "state=stale-state&code=x").await?;
    assert!(location.ends_with("reason=expired"), "{location}");

    assert!(fake.token_requests.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_publish_requires_connection() -> Result<()> {
    let (addr, _fake) = spawn_fake_twitter().await?;
    let server = twitter_server(addr).await?;
    let token = server.register("offline@example.com").await?;
    let content_id = server
        .create_content(&token, "Why Rust", &long_article())
        .await?;
    let (_, repurposed) = server
        .post(
            &format!("/api/content/{content_id}/repurpose"),
            &token,
            json!({ "platform": "twitter_thread" }),
        )
        .await?;

    let (status, body) = server
        .post(
            "/api/twitter/threads",
            &token,
            json!({ "group_id": repurposed["group_id"] }),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Twitter account is not connected");

    let (status, _) = server
        .post("/api/twitter/threads", &token, json!({ "group_id": Uuid::new_v4() }))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_admin_cleanup_of_expired_states() -> Result<()> {
    let server = TestServer::new().await?;
    let token = server.register("admin-cleanup@example.com").await?;
    let (_, me) = server.get("/api/auth/me", &token).await?;
    let user_id = Uuid::parse_str(me["user_id"].as_str().unwrap())?;

    let states = OAuthStatesManager::new(server.resources.database.pool().clone());
    let now = Utc::now();
    for (name, expires_at) in [
        ("expired-1", now - Duration::minutes(1)),
        ("expired-2", now - Duration::hours(2)),
        ("live", now + Duration::minutes(10)),
    ] {
        states
            .create(&TwitterOAuthState {
                state: name.to_owned(),
                user_id,
                code_verifier: Zeroizing::new("v".to_owned()),
                created_at: now - Duration::hours(3),
                expires_at,
            })
            .await?;
    }

    let cleanup = |key: Option<&'static str>| {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/admin/oauth-states/cleanup");
        if let Some(key) = key {
            builder = builder.header("x-admin-key", key);
        }
        builder.body(Body::empty())
    };

    let (status, _, _) = server.send(cleanup(None)?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _, _) = server.send(cleanup(Some("wrong-key"))?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = server.send(cleanup(Some(TEST_ADMIN_KEY))?).await?;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body)?;
    assert_eq!(body["deleted"], 2);

    assert!(states.consume("live").await?.is_some());
    assert!(states.consume("expired-1").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_expired_access_token_is_refreshed_before_publishing() -> Result<()> {
    let (addr, fake) = spawn_fake_twitter().await?;
    let server = twitter_server(addr).await?;
    let token = connected_user(&server, "refresher@example.com").await?;
    let user_id = user_id(&server, &token).await?;
    let database = &server.resources.database;

    let mut connection = database.get_twitter_connection(user_id).await?.unwrap();
    connection.expires_at = Some(Utc::now() - Duration::hours(1));
    database.save_twitter_connection(&connection).await?;

    let group_id = thread_group(&server, &token).await?;
    let (status, thread) = server
        .post("/api/twitter/threads", &token, json!({ "group_id": group_id }))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{thread}");

    let grants: Vec<String> = fake
        .token_requests
        .lock()
        .unwrap()
        .iter()
        .map(|form| form["grant_type"].clone())
        .collect();
    assert_eq!(grants, vec!["authorization_code", "refresh_token"]);
    assert_eq!(fake.token_requests.lock().unwrap()[1]["refresh_token"], "fake-refresh");
    assert!(fake
        .tweet_auth
        .lock()
        .unwrap()
        .iter()
        .all(|auth| auth == "Bearer refreshed-access"));

    let stored = database.get_twitter_connection(user_id).await?.unwrap();
    assert_eq!(stored.access_token.as_str(), "refreshed-access");
    assert_eq!(stored.refresh_token.as_deref().map(String::as_str), Some("rotated-refresh"));
    assert!(stored.expires_at.unwrap() > Utc::now());
    assert_eq!(stored.username.as_deref(), Some("recast_dev"));
    Ok(())
}

#[tokio::test]
async fn test_rejected_code_exchange_redirects_with_exchange_failed() -> Result<()> {
    let (addr, fake) = spawn_fake_twitter().await?;
    let server = twitter_server(addr).await?;
    let token = server.register("rejected@example.com").await?;
    let user_id = user_id(&server, &token).await?;
    fake.reject_grants.store(true, Ordering::SeqCst);

    let (_, connect) = server.get("/api/twitter/connect", &token).await?;
    let state = connect["state"].as_str().unwrap().to_owned();
    let location = callback(&server, &format!("state={state}&code=bad-code")).await?;
    assert_eq!(
        location,
        "https://app.recast.test/settings?twitter=error&reason=exchange_failed"
    );
    assert_eq!(fake.token_requests.lock().unwrap().len(), 1);

    let states = OAuthStatesManager::new(server.resources.database.pool().clone());
    assert!(states.consume(&state).await?.is_none());
    assert!(server
        .resources
        .database
        .get_twitter_connection(user_id)
        .await?
        .is_none());
    let (_, status_body) = server.get("/api/twitter/status", &token).await?;
    assert_eq!(status_body["connected"], false);
    Ok(())
}
