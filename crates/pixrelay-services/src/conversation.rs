use crate::chat::{ChatResponse, ChatService};
use crate::tools::ToolDispatcher;
use pixrelay_core::models::{AssemblyOptions, RequestPayload, ValidationPolicy};
use pixrelay_core::AppError;
use pixrelay_processing::{IntakeValidator, RequestAssembler};
use serde::Serialize;
use std::sync::Arc;

/// Outcome of one user request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    /// Model text, when the model answered directly
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    /// Tool result, when the model asked for an image to be published
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<String>,
}

impl ChatReply {
    /// Text to show the user
    pub fn message(&self) -> &str {
        self.tool_result
            .as_deref()
            .or(self.reply.as_deref())
            .unwrap_or_default()
    }
}

/// Runs a request end to end: validate, assemble, ask the model, dispatch any tool call
#[derive(Clone)]
pub struct ImageChatService {
    validator: IntakeValidator,
    assembler: RequestAssembler,
    chat: Arc<dyn ChatService>,
    tools: ToolDispatcher,
}

impl ImageChatService {
    pub fn new(
        policy: ValidationPolicy,
        options: AssemblyOptions,
        chat: Arc<dyn ChatService>,
        tools: ToolDispatcher,
    ) -> Self {
        Self {
            validator: IntakeValidator::new(policy),
            assembler: RequestAssembler::new(options),
            chat,
            tools,
        }
    }

    /// Replace the assembler, e.g. to plug in a different block encoder
    pub fn with_assembler(mut self, assembler: RequestAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// Validate and assemble without calling out. Nothing is sent when this fails.
    pub async fn prepare(
        &self,
        message: &str,
        paths: &[String],
    ) -> Result<RequestPayload, AppError> {
        let validator = self.validator.clone();
        let owned = paths.to_vec();
        let candidates = tokio::task::spawn_blocking(move || validator.validate(&owned))
            .await
            .map_err(|e| AppError::Internal(format!("Validation task failed: {}", e)))??;

        tracing::info!(images = candidates.len(), "Images passed intake validation");

        Ok(self.assembler.build_payload(message, paths).await?)
    }

    pub async fn ask(&self, message: &str, paths: &[String]) -> Result<ChatReply, AppError> {
        let payload = self.prepare(message, paths).await?;

        let response = self
            .chat
            .complete(&payload, self.tools.is_enabled())
            .await
            .map_err(|e| AppError::ExternalService(format!("{:#}", e)))?;

        match response {
            ChatResponse::Text(text) => Ok(ChatReply {
                reply: Some(text),
                tool_result: None,
            }),
            ChatResponse::ToolCall {
                name,
                arguments,
                content,
            } => {
                let result = self.tools.dispatch(&name, &arguments, paths).await;
                Ok(ChatReply {
                    reply: content,
                    tool_result: Some(result),
                })
            }
        }
    }
}
