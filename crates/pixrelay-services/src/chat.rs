//! OpenAI-compatible chat completions client (Groq by default)

use anyhow::{Context, Result};
use async_trait::async_trait;
use pixrelay_core::models::{RequestPayload, UPLOAD_IMAGE_TOOL};
use pixrelay_core::ChatConfig;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

/// What the model answered with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatResponse {
    Text(String),
    /// A function call; `arguments` is the raw JSON string the model produced.
    /// `content` is any text the model sent alongside the call.
    ToolCall {
        name: String,
        arguments: String,
        content: Option<String>,
    },
}

#[async_trait]
pub trait ChatService: Send + Sync {
    /// Send `payload` as a single user turn. When `offer_tools` is set the upload tool is
    /// declared and the model may answer with a call to it.
    async fn complete(&self, payload: &RequestPayload, offer_tools: bool) -> Result<ChatResponse>;
}

/// Function tool declaration for publishing one of the request's images
pub fn upload_tool_definition() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": UPLOAD_IMAGE_TOOL,
            "description": "Upload one of the images from this conversation to a Slack channel. \
                Identify the image by its number from the 'Image N' labels.",
            "parameters": {
                "type": "object",
                "properties": {
                    "image_index": {
                        "type": "integer",
                        "description": "1-based number of the image to upload, as labelled in the message"
                    },
                    "image_url": {
                        "type": "string",
                        "description": "Deprecated: path of the image to upload. Prefer image_index."
                    },
                    "channel": {
                        "type": "string",
                        "description": "Slack channel name (with or without #) or channel ID"
                    },
                    "context": {
                        "type": "string",
                        "description": "Optional message to post along with the image"
                    }
                },
                "required": ["channel"]
            }
        }
    })
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_completion_tokens: u32,
    top_p: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a RequestPayload,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

pub struct ChatCompletionClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    top_p: f32,
    max_completion_tokens: u32,
}

impl Debug for ChatCompletionClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ChatCompletionClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

impl ChatCompletionClient {
    pub fn new(config: &ChatConfig, timeout: Duration) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .context("CHAT_API_KEY (or GROQ_API_KEY) must be set to call the chat service")?;

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for chat API")?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
            max_completion_tokens: config.max_completion_tokens,
        })
    }

    fn build_request<'a>(
        &'a self,
        payload: &'a RequestPayload,
        offer_tools: bool,
    ) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: payload,
            }],
            temperature: self.temperature,
            max_completion_tokens: self.max_completion_tokens,
            top_p: self.top_p,
            stream: false,
            tools: offer_tools.then(|| vec![upload_tool_definition()]),
            tool_choice: offer_tools.then_some("auto"),
        }
    }
}

#[async_trait]
impl ChatService for ChatCompletionClient {
    async fn complete(&self, payload: &RequestPayload, offer_tools: bool) -> Result<ChatResponse> {
        let request_body = self.build_request(payload, offer_tools);

        tracing::debug!(
            model = %self.model,
            images = payload.image_count(),
            tools = offer_tools,
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .context("Failed to send request to chat API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            if let Ok(error_json) = serde_json::from_str::<Value>(&error_text) {
                if let Some(message) = error_json
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                {
                    return Err(anyhow::anyhow!(
                        "Chat API error: {} - Status: {}",
                        message,
                        status
                    ));
                }
            }

            return Err(anyhow::anyhow!(
                "Chat API request failed: {} - {}",
                status,
                error_text
            ));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse chat API response")?;

        let message = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .context("No choices in chat API response")?;

        let mut tool_calls = message.tool_calls.unwrap_or_default();
        if !tool_calls.is_empty() {
            if tool_calls.len() > 1 {
                tracing::warn!(
                    count = tool_calls.len(),
                    "Model requested several tool calls; only the first is dispatched"
                );
            }
            let call = tool_calls.swap_remove(0);
            tracing::info!(tool = %call.function.name, "Model requested a tool call");
            let content = message
                .content
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            return Ok(ChatResponse::ToolCall {
                name: call.function.name,
                arguments: call.function.arguments,
                content,
            });
        }

        let text = message
            .content
            .map(|s| s.trim().to_string())
            .context("No content in chat API response")?;

        tracing::info!(reply_length = text.len(), "Received chat completion");
        Ok(ChatResponse::Text(text))
    }
}
