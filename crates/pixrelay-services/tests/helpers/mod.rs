//! Test helpers: in-memory chat and messaging services plus image fixtures.

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use pixrelay_core::models::RequestPayload;
use pixrelay_services::{ChatResponse, ChatService, MessagingService, SlackError};
use std::path::Path;
use std::sync::Mutex;

/// Chat service that returns a scripted response and records what it was sent
pub struct ScriptedChat {
    response: Mutex<Option<anyhow::Result<ChatResponse>>>,
    pub requests: Mutex<Vec<(RequestPayload, bool)>>,
}

impl ScriptedChat {
    pub fn replying(response: ChatResponse) -> Self {
        Self {
            response: Mutex::new(Some(Ok(response))),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Mutex::new(Some(Err(anyhow::anyhow!(message.to_string())))),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatService for ScriptedChat {
    async fn complete(
        &self,
        payload: &RequestPayload,
        offer_tools: bool,
    ) -> anyhow::Result<ChatResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((payload.clone(), offer_tools));
        self.response
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted response left")))
    }
}

/// Messaging service that knows one channel and records uploads
#[derive(Default)]
pub struct RecordingMessenger {
    pub uploads: Mutex<Vec<(String, String, Option<String>)>>,
}

#[async_trait]
impl MessagingService for RecordingMessenger {
    async fn resolve_channel(&self, channel: &str) -> Result<String, SlackError> {
        match channel.trim_start_matches('#') {
            "general" => Ok("C000000001".to_string()),
            other => Err(SlackError::ChannelNotFound(other.to_string())),
        }
    }

    async fn upload_file(
        &self,
        channel_id: &str,
        path: &str,
        initial_comment: Option<&str>,
    ) -> Result<(), SlackError> {
        self.uploads.lock().unwrap().push((
            channel_id.to_string(),
            path.to_string(),
            initial_comment.map(str::to_string),
        ));
        Ok(())
    }
}

/// Write a solid-colour PNG and return its path
pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> String {
    let path = dir.join(name);
    RgbImage::from_pixel(width, height, Rgb([20, 140, 60]))
        .save_with_format(&path, ImageFormat::Png)
        .unwrap();
    path.to_string_lossy().into_owned()
}
