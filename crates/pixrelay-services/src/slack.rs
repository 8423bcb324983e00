//! Slack Web API client for publishing images to a channel
//!
//! Uploads use the external upload flow: reserve an upload URL, send the bytes there, then
//! complete the upload against a channel. Every Web API response carries an `ok` flag which
//! is checked before the body is trusted.

use anyhow::Context;
use async_trait::async_trait;
use pixrelay_core::SlackConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::time::Duration;

const CHANNEL_PAGE_SIZE: &str = "200";

#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("Slack API error in {method}: {error}")]
    Api { method: &'static str, error: String },

    #[error("Unexpected response from {method}: {message}")]
    InvalidResponse {
        method: &'static str,
        message: String,
    },

    #[error("Slack request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to read {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Destination for published images
#[async_trait]
pub trait MessagingService: Send + Sync {
    /// Resolve a channel name (with or without `#`) or ID to a channel ID
    async fn resolve_channel(&self, channel: &str) -> Result<String, SlackError>;

    /// Upload a local file to a channel, optionally with a message
    async fn upload_file(
        &self,
        channel_id: &str,
        path: &str,
        initial_comment: Option<&str>,
    ) -> Result<(), SlackError>;
}

/// Slack conversation IDs: uppercase prefix letter (C, G or D) then uppercase alphanumerics
pub fn is_channel_id(channel: &str) -> bool {
    channel.len() >= 9
        && matches!(channel.as_bytes()[0], b'C' | b'G' | b'D')
        && channel
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct ConversationsListResponse {
    #[serde(default)]
    channels: Vec<Channel>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct UploadUrlResponse {
    upload_url: String,
    file_id: String,
}

#[derive(Debug, Serialize)]
struct CompletedFile<'a> {
    id: &'a str,
    title: &'a str,
}

#[derive(Debug, Serialize)]
struct CompleteUploadRequest<'a> {
    files: Vec<CompletedFile<'a>>,
    channel_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    initial_comment: Option<&'a str>,
}

pub struct SlackClient {
    http_client: reqwest::Client,
    base_url: String,
    bot_token: String,
}

impl Debug for SlackClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("SlackClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl SlackClient {
    pub fn new(config: &SlackConfig, timeout: Duration) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for Slack API")?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn find_channel_by_name(&self, name: &str) -> Result<Option<String>, SlackError> {
        let mut cursor = String::new();
        loop {
            let mut request = self
                .http_client
                .get(self.method_url("conversations.list"))
                .bearer_auth(&self.bot_token)
                .query(&[
                    ("types", "public_channel,private_channel"),
                    ("exclude_archived", "true"),
                    ("limit", CHANNEL_PAGE_SIZE),
                ]);
            if !cursor.is_empty() {
                request = request.query(&[("cursor", cursor.as_str())]);
            }

            let page: ConversationsListResponse =
                read_response("conversations.list", request.send().await?).await?;

            if let Some(channel) = page.channels.into_iter().find(|c| c.name == name) {
                return Ok(Some(channel.id));
            }

            cursor = page
                .response_metadata
                .map(|m| m.next_cursor)
                .unwrap_or_default();
            if cursor.is_empty() {
                return Ok(None);
            }
        }
    }
}

/// Check the `ok` envelope of a Web API response and decode the body
async fn read_response<T: DeserializeOwned>(
    method: &'static str,
    response: reqwest::Response,
) -> Result<T, SlackError> {
    let body: Value = response.error_for_status()?.json().await?;

    if !body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
        let error = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error")
            .to_string();
        return Err(SlackError::Api { method, error });
    }

    serde_json::from_value(body).map_err(|e| SlackError::InvalidResponse {
        method,
        message: e.to_string(),
    })
}

#[async_trait]
impl MessagingService for SlackClient {
    async fn resolve_channel(&self, channel: &str) -> Result<String, SlackError> {
        let name = channel.trim().trim_start_matches('#');
        if is_channel_id(name) {
            return Ok(name.to_string());
        }

        match self.find_channel_by_name(name).await? {
            Some(id) => {
                tracing::debug!(channel = %name, channel_id = %id, "Resolved Slack channel");
                Ok(id)
            }
            None => Err(SlackError::ChannelNotFound(channel.trim().to_string())),
        }
    }

    async fn upload_file(
        &self,
        channel_id: &str,
        path: &str,
        initial_comment: Option<&str>,
    ) -> Result<(), SlackError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|source| SlackError::File {
                path: path.to_string(),
                source,
            })?;
        let filename = Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();

        let length = data.len().to_string();
        let reserved: UploadUrlResponse = read_response(
            "files.getUploadURLExternal",
            self.http_client
                .post(self.method_url("files.getUploadURLExternal"))
                .bearer_auth(&self.bot_token)
                .form(&[("filename", filename.as_str()), ("length", length.as_str())])
                .send()
                .await?,
        )
        .await?;

        let size = data.len();
        self.http_client
            .post(&reserved.upload_url)
            .body(data)
            .send()
            .await?
            .error_for_status()?;

        let complete = CompleteUploadRequest {
            files: vec![CompletedFile {
                id: &reserved.file_id,
                title: &filename,
            }],
            channel_id,
            initial_comment,
        };
        let _: Value = read_response(
            "files.completeUploadExternal",
            self.http_client
                .post(self.method_url("files.completeUploadExternal"))
                .bearer_auth(&self.bot_token)
                .json(&complete)
                .send()
                .await?,
        )
        .await?;

        tracing::info!(
            channel_id = %channel_id,
            file_id = %reserved.file_id,
            size_bytes = size,
            "Image uploaded to Slack"
        );
        Ok(())
    }
}
