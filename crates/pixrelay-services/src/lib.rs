//! External collaborators (chat completions, Slack) and the request orchestrator

pub mod chat;
pub mod conversation;
pub mod slack;
pub mod tools;

pub use chat::{upload_tool_definition, ChatCompletionClient, ChatResponse, ChatService};
pub use conversation::{ChatReply, ImageChatService};
pub use slack::{is_channel_id, MessagingService, SlackClient, SlackError};
pub use tools::ToolDispatcher;
