//! Executes tool calls requested by the model
//!
//! Dispatch never fails the request: every outcome, including bad arguments and upload
//! errors, is a message for the end user.

use crate::slack::{MessagingService, SlackError};
use pixrelay_core::models::{SelectionError, ToolInvocation};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct ToolDispatcher {
    messaging: Option<Arc<dyn MessagingService>>,
}

impl ToolDispatcher {
    pub fn new(messaging: Option<Arc<dyn MessagingService>>) -> Self {
        Self { messaging }
    }

    /// Whether any tool can be offered to the model
    pub fn is_enabled(&self) -> bool {
        self.messaging.is_some()
    }

    /// Run the tool call `name(arguments)` against the images of the current request.
    /// `paths` are the original files, in the order they were labelled.
    pub async fn dispatch<S: AsRef<str>>(
        &self,
        name: &str,
        arguments: &str,
        paths: &[S],
    ) -> String {
        let invocation = match ToolInvocation::from_call(name, arguments) {
            Ok(invocation) => invocation,
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "Rejected tool call");
                return format!("Could not upload the image: {}", e);
            }
        };

        let Some(messaging) = &self.messaging else {
            return "Slack uploads are not configured.".to_string();
        };

        let index = match invocation.selector.resolve(paths) {
            Ok(index) => index,
            Err(e) => {
                tracing::debug!(error = %e, "Tool call selected an invalid image");
                return e.to_string();
            }
        };
        let path = paths[index - 1].as_ref();

        let channel_id = match messaging.resolve_channel(&invocation.channel).await {
            Ok(id) => id,
            Err(SlackError::ChannelNotFound(channel)) => {
                return SelectionError::ChannelNotFound(channel).to_string();
            }
            Err(e) => {
                tracing::warn!(channel = %invocation.channel, error = %e, "Channel lookup failed");
                return format!("Failed to upload image {} to {}: {}", index, invocation.channel, e);
            }
        };

        match messaging
            .upload_file(&channel_id, path, invocation.context.as_deref())
            .await
        {
            Ok(()) => {
                tracing::info!(
                    image_index = index,
                    channel = %invocation.channel,
                    "Tool call uploaded image"
                );
                format!("Uploaded image {} to {}.", index, invocation.channel)
            }
            Err(e) => {
                tracing::warn!(image_index = index, error = %e, "Image upload failed");
                format!("Failed to upload image {} to {}: {}", index, invocation.channel, e)
            }
        }
    }
}
