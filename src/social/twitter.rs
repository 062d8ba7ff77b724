// ABOUTME: Twitter/X v2 REST client for the connected account and thread publishing
// ABOUTME: Posts threads tweet by tweet as replies, validating every part before the first call
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

use std::time::Duration;

use recast_core::constants::twitter::{MAX_TWEET_CHARS, THREAD_POST_DELAY_MS};
use recast_core::errors::{AppError, AppResult, ErrorCode};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{info, instrument, warn};

const SERVICE: &str = "Twitter";

/// The authenticated account
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TwitterUser {
    /// Numeric account id
    pub id: String,
    /// Handle without `@`
    pub username: String,
    /// Display name
    pub name: Option<String>,
}

/// A published tweet
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PostedTweet {
    /// Tweet id
    pub id: String,
    /// Public URL
    pub url: String,
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct CreatedTweet {
    id: String,
}

#[derive(Serialize)]
struct CreateTweet<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<ReplyTo<'a>>,
}

#[derive(Serialize)]
struct ReplyTo<'a> {
    in_reply_to_tweet_id: &'a str,
}

#[derive(Deserialize)]
struct ApiError {
    detail: Option<String>,
    title: Option<String>,
    #[serde(default)]
    errors: Vec<ApiErrorItem>,
}

#[derive(Deserialize)]
struct ApiErrorItem {
    message: String,
}

/// Thin client over the Twitter v2 API
#[derive(Debug, Clone)]
pub struct TwitterClient {
    client: Client,
    api_base_url: String,
    post_delay: Duration,
}

impl TwitterClient {
    /// Create a client for `api_base_url` (normally `https://api.twitter.com/2`)
    #[must_use]
    pub fn new(client: Client, api_base_url: &str) -> Self {
        Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_owned(),
            post_delay: Duration::from_millis(THREAD_POST_DELAY_MS),
        }
    }

    /// Override the pause between thread parts
    #[must_use]
    pub const fn with_post_delay(mut self, delay: Duration) -> Self {
        self.post_delay = delay;
        self
    }

    /// Fetch the account behind `access_token`
    ///
    /// # Errors
    ///
    /// Returns an error if the token is rejected or the API is unreachable
    pub async fn get_me(&self, access_token: &str) -> AppResult<TwitterUser> {
        let response = self
            .client
            .get(format!("{}/users/me", self.api_base_url))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::external_service(SERVICE, format!("Request failed: {e}")))?;
        let envelope: DataEnvelope<TwitterUser> = Self::parse(response).await?;
        Ok(envelope.data)
    }

    /// Post one tweet, optionally as a reply
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the tweet
    pub async fn post_tweet(
        &self,
        access_token: &str,
        text: &str,
        in_reply_to: Option<&str>,
    ) -> AppResult<String> {
        let body = CreateTweet {
            text,
            reply: in_reply_to.map(|id| ReplyTo {
                in_reply_to_tweet_id: id,
            }),
        };
        let response = self
            .client
            .post(format!("{}/tweets", self.api_base_url))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::external_service(SERVICE, format!("Request failed: {e}")))?;
        let envelope: DataEnvelope<CreatedTweet> = Self::parse(response).await?;
        Ok(envelope.data.id)
    }

    /// Publish `texts` as a thread, each part replying to the previous one
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` before posting anything if a part is empty or
    /// longer than a tweet. A failure mid-thread reports how many parts went out.
    #[instrument(skip(self, access_token, texts), fields(parts = texts.len()))]
    pub async fn post_thread(
        &self,
        access_token: &str,
        username: &str,
        texts: &[String],
    ) -> AppResult<Vec<PostedTweet>> {
        validate_thread(texts)?;

        let mut posted: Vec<PostedTweet> = Vec::with_capacity(texts.len());
        for (index, text) in texts.iter().enumerate() {
            if index > 0 && !self.post_delay.is_zero() {
                sleep(self.post_delay).await;
            }
            let reply_to = posted.last().map(|tweet| tweet.id.as_str());
            let id = match self.post_tweet(access_token, text, reply_to).await {
                Ok(id) => id,
                Err(e) if posted.is_empty() => return Err(e),
                Err(e) => {
                    warn!(posted = posted.len(), "Thread publishing stopped part-way");
                    return Err(AppError::new(
                        e.code,
                        format!(
                            "Posted {} of {} tweets before failing: {}",
                            posted.len(),
                            texts.len(),
                            e.message
                        ),
                    ));
                }
            };
            posted.push(PostedTweet {
                url: tweet_url(username, &id),
                id,
            });
        }

        info!(tweets = posted.len(), "Thread published");
        Ok(posted)
    }

    async fn parse<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> AppResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::external_service(SERVICE, format!("Response unreadable: {e}")))?;
        if !status.is_success() {
            return Err(map_api_error(status, &body));
        }
        serde_json::from_str(&body)
            .map_err(|e| AppError::external_service(SERVICE, format!("Unexpected response: {e}")))
    }
}

/// Public URL of a tweet
#[must_use]
pub fn tweet_url(username: &str, tweet_id: &str) -> String {
    format!("https://twitter.com/{username}/status/{tweet_id}")
}

/// Reject threads with empty or overlong parts
///
/// # Errors
///
/// Returns `INVALID_INPUT` naming the first offending part (1-based)
pub fn validate_thread(texts: &[String]) -> AppResult<()> {
    if texts.is_empty() {
        return Err(AppError::invalid_input("Thread has no tweets"));
    }
    for (index, text) in texts.iter().enumerate() {
        let length = text.chars().count();
        if text.trim().is_empty() {
            return Err(AppError::invalid_input(format!("Tweet {} is empty", index + 1)));
        }
        if length > MAX_TWEET_CHARS {
            return Err(AppError::new(
                ErrorCode::ValueOutOfRange,
                format!(
                    "Tweet {} is {length} characters; the limit is {MAX_TWEET_CHARS}",
                    index + 1
                ),
            ));
        }
    }
    Ok(())
}

fn map_api_error(status: StatusCode, body: &str) -> AppError {
    let detail = serde_json::from_str::<ApiError>(body).ok().and_then(|e| {
        e.detail
            .or_else(|| e.errors.into_iter().next().map(|item| item.message))
            .or(e.title)
    });
    let detail = detail.unwrap_or_else(|| body.chars().take(200).collect());
    match status {
        StatusCode::UNAUTHORIZED => AppError::new(
            ErrorCode::ExternalAuthFailed,
            format!("Twitter rejected the access token. Reconnect your account. ({detail})"),
        ),
        StatusCode::TOO_MANY_REQUESTS => AppError::new(
            ErrorCode::ExternalRateLimited,
            "Twitter rate limit reached. Please try again later.",
        ),
        _ => AppError::external_service(SERVICE, format!("API error ({status}): {detail}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_thread_limits() {
        assert!(validate_thread(&[]).is_err());
        assert!(validate_thread(&["ok".to_owned(), "fine (2/2)".to_owned()]).is_ok());

        let long = "é".repeat(MAX_TWEET_CHARS + 1);
        let err = validate_thread(&["ok".to_owned(), long]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValueOutOfRange);
        assert!(err.message.starts_with("Tweet 2 is 281 characters"));

        // Characters, not bytes
        assert!(validate_thread(&["é".repeat(MAX_TWEET_CHARS)]).is_ok());
    }

    #[test]
    fn test_reply_body_shape() {
        let body = serde_json::to_value(CreateTweet {
            text: "second",
            reply: Some(ReplyTo {
                in_reply_to_tweet_id: "1",
            }),
        })
        .unwrap();
        assert_eq!(body["reply"]["in_reply_to_tweet_id"], "1");

        let first = serde_json::to_value(CreateTweet {
            text: "first",
            reply: None,
        })
        .unwrap();
        assert!(first.get("reply").is_none());
    }

    #[test]
    fn test_error_mapping() {
        let err = map_api_error(
            StatusCode::UNAUTHORIZED,
            r#"{"title":"Unauthorized","detail":"Unauthorized"}"#,
        );
        assert_eq!(err.code, ErrorCode::ExternalAuthFailed);

        let err = map_api_error(
            StatusCode::FORBIDDEN,
            r#"{"detail":"You are not allowed to create a Tweet with duplicate content."}"#,
        );
        assert_eq!(err.code, ErrorCode::ExternalServiceError);
        assert!(err.message.contains("duplicate content"));
    }
}
