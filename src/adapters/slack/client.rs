//! Slack Web API client implementing [`ChatClient`].

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::domain::models::{Channel, SlackConfig};
use crate::domain::ports::ChatClient;

/// Page size requested from `conversations.list`.
const CHANNEL_PAGE_SIZE: u32 = 200;

/// Errors returned by the Slack Web API.
#[derive(Debug, Error)]
pub enum SlackApiError {
    /// Slack answered with `"ok": false`
    #[error("Slack API error: {0}")]
    Api(String),

    /// Non-success HTTP status
    #[error("Slack HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Transport failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Body did not match the expected shape
    #[error("Unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ts: String,
}

#[derive(Debug, Deserialize)]
struct ConversationsPage {
    #[serde(default)]
    channels: Vec<SlackChannel>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct SlackChannel {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_member: bool,
    #[serde(default)]
    is_archived: bool,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

impl From<SlackChannel> for Channel {
    fn from(c: SlackChannel) -> Self {
        let mut channel = Channel::new(c.id, c.name);
        channel.is_member = c.is_member;
        channel.is_archived = c.is_archived;
        channel
    }
}

/// Slack Web API client authenticated with a bot token.
pub struct SlackClient {
    http_client: ReqwestClient,
    token: String,
    base_url: String,
}

impl SlackClient {
    /// Client for `base_url` authenticated with a bot token.
    pub fn new(token: impl Into<String>, base_url: impl Into<String>) -> anyhow::Result<Self> {
        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            token: token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build a client from configuration; the bot token must be set.
    pub fn from_config(config: &SlackConfig) -> anyhow::Result<Self> {
        let token = config
            .bot_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .context("slack.bot_token is not configured")?;
        Self::new(token, &config.api_base_url)
    }

    /// Check Slack's `ok` flag and decode the rest of the body.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SlackApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SlackApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        if !body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            return Err(SlackApiError::Api(error.to_string()));
        }
        Ok(serde_json::from_value(body)?)
    }

    async fn post<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T, SlackApiError> {
        let response = self
            .http_client
            .post(format!("{}/{}", self.base_url, method))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, String)],
    ) -> Result<T, SlackApiError> {
        let response = self
            .http_client
            .get(format!("{}/{}", self.base_url, method))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        Self::decode(response).await
    }
}

#[async_trait]
impl ChatClient for SlackClient {
    async fn post_message(
        &self,
        channel_id: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> anyhow::Result<String> {
        let mut body = json!({ "channel": channel_id, "text": text });
        if let Some(ts) = thread_ts {
            body["thread_ts"] = Value::String(ts.to_string());
        }

        let response: PostMessageResponse = self.post("chat.postMessage", &body).await?;
        debug!(channel_id, ts = %response.ts, "message posted");
        Ok(response.ts)
    }

    async fn list_channels(&self) -> anyhow::Result<Vec<Channel>> {
        let mut channels = Vec::new();
        let mut cursor = String::new();

        loop {
            let page: ConversationsPage = self
                .get(
                    "conversations.list",
                    &[
                        ("types", "public_channel,private_channel".to_string()),
                        ("exclude_archived", "false".to_string()),
                        ("limit", CHANNEL_PAGE_SIZE.to_string()),
                        ("cursor", cursor.clone()),
                    ],
                )
                .await?;

            channels.extend(page.channels.into_iter().map(Channel::from));
            cursor = page
                .response_metadata
                .map(|m| m.next_cursor)
                .unwrap_or_default();
            if cursor.is_empty() {
                break;
            }
        }

        debug!(count = channels.len(), "channel roster fetched");
        Ok(channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_post_message_in_thread() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat.postMessage")
            .match_header("authorization", "Bearer xoxb-test")
            .match_body(Matcher::PartialJson(json!({
                "channel": "C1",
                "text": "hello",
                "thread_ts": "1.0"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok": true, "channel": "C1", "ts": "2.0"}"#)
            .create_async()
            .await;

        let client = SlackClient::new("xoxb-test", server.url()).unwrap();
        let ts = client.post_message("C1", Some("1.0"), "hello").await.unwrap();

        assert_eq!(ts, "2.0");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat.postMessage")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok": false, "error": "channel_not_found"}"#)
            .create_async()
            .await;

        let client = SlackClient::new("xoxb-test", server.url()).unwrap();
        let err = client.post_message("C404", None, "hi").await.unwrap_err();

        match err.downcast_ref::<SlackApiError>() {
            Some(SlackApiError::Api(code)) => assert_eq!(code, "channel_not_found"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_status_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat.postMessage")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = SlackClient::new("xoxb-test", server.url()).unwrap();
        let err = client.post_message("C1", None, "hi").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SlackApiError>(),
            Some(SlackApiError::Status { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_list_channels_follows_cursor() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/conversations.list")
            .match_query(Matcher::UrlEncoded("cursor".into(), String::new()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"ok": true,
                    "channels": [{"id": "C1", "name": "general", "is_member": true, "is_archived": false}],
                    "response_metadata": {"next_cursor": "page2"}}"#,
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", "/conversations.list")
            .match_query(Matcher::UrlEncoded("cursor".into(), "page2".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"ok": true,
                    "channels": [{"id": "C2", "name": "random", "is_member": false, "is_archived": true}],
                    "response_metadata": {"next_cursor": ""}}"#,
            )
            .create_async()
            .await;

        let client = SlackClient::new("xoxb-test", server.url()).unwrap();
        let channels = client.list_channels().await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(channels.len(), 2);
        assert!(channels[0].is_active());
        assert_eq!(channels[1].name, "random");
        assert!(!channels[1].is_active());
    }

    #[test]
    fn test_from_config_requires_token() {
        assert!(SlackClient::from_config(&SlackConfig::default()).is_err());

        let config = SlackConfig {
            bot_token: Some("xoxb-1".to_string()),
            ..SlackConfig::default()
        };
        assert!(SlackClient::from_config(&config).is_ok());
    }
}
