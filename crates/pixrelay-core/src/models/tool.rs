//! Tool invocations returned by the chat service
//!
//! The model's tool-call arguments are untrusted. They are decoded into typed structs here
//! and every failure is a typed error, which the dispatcher turns into a message for the
//! end user instead of aborting the request.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the function tool that publishes one of the request's images
pub const UPLOAD_IMAGE_TOOL: &str = "upload_image_to_slack";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolCallError {
    #[error("Unknown tool requested: {0}")]
    UnknownTool(String),

    #[error("Malformed tool arguments: {0}")]
    MalformedArguments(String),

    #[error("Tool call did not say which image to upload")]
    MissingSelection,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("Invalid image index {input}. Please choose a number in the range [1,{count}].")]
    InvalidSelectionIndex { input: String, count: usize },

    #[error("Image {0} is not one of the images in this request.")]
    UnknownImageReference(String),

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),
}

/// Raw `image_index` as the model sent it: a JSON number or a numeric string
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum IndexArg {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl IndexArg {
    fn into_key(self) -> String {
        match self {
            IndexArg::Integer(i) => i.to_string(),
            IndexArg::Float(f) if f.fract() == 0.0 => format!("{}", f as i64),
            IndexArg::Float(f) => f.to_string(),
            IndexArg::Text(s) => s,
        }
    }
}

/// Arguments schema of the upload tool
#[derive(Debug, Deserialize)]
struct UploadImageArgs {
    #[serde(default)]
    image_index: Option<IndexArg>,
    #[serde(default)]
    image_url: Option<String>,
    channel: String,
    #[serde(default)]
    context: Option<String>,
}

/// How the model identified the image to publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ImageSelector {
    /// 1-based index key, validated against the batch at resolution time
    Index(String),
    /// Legacy: a URL or path naming the image directly
    Reference(String),
}

impl ImageSelector {
    /// Resolve to a 1-based position within `paths`
    pub fn resolve<S: AsRef<str>>(&self, paths: &[S]) -> Result<usize, SelectionError> {
        match self {
            ImageSelector::Index(raw) => {
                let invalid = || SelectionError::InvalidSelectionIndex {
                    input: raw.clone(),
                    count: paths.len(),
                };
                let index = raw.trim().parse::<usize>().map_err(|_| invalid())?;
                if index == 0 || index > paths.len() {
                    return Err(invalid());
                }
                Ok(index)
            }
            ImageSelector::Reference(reference) => {
                let reference = reference.trim();
                if let Some(pos) = paths.iter().position(|p| p.as_ref() == reference) {
                    return Ok(pos + 1);
                }
                // Fall back to matching by file name, e.g. "/uploads/a.jpg" vs "uploads/a.jpg".
                // The name must identify exactly one image.
                let unknown = || SelectionError::UnknownImageReference(reference.to_string());
                let wanted = Path::new(reference).file_name().ok_or_else(unknown)?;
                let mut matches = paths
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| {
                        let path: &str = (*p).as_ref();
                        Path::new(path).file_name() == Some(wanted)
                    });
                match (matches.next(), matches.next()) {
                    (Some((pos, _)), None) => Ok(pos + 1),
                    _ => Err(unknown()),
                }
            }
        }
    }
}

/// A decoded request to publish one image to a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolInvocation {
    pub selector: ImageSelector,
    pub channel: String,
    pub context: Option<String>,
}

impl ToolInvocation {
    /// Decode a tool call (function name + JSON-string arguments)
    pub fn from_call(name: &str, arguments: &str) -> Result<Self, ToolCallError> {
        if name != UPLOAD_IMAGE_TOOL {
            return Err(ToolCallError::UnknownTool(name.to_string()));
        }

        let args: UploadImageArgs = serde_json::from_str(arguments)
            .map_err(|e| ToolCallError::MalformedArguments(e.to_string()))?;

        let selector = match (args.image_index, args.image_url) {
            (Some(index), _) => ImageSelector::Index(index.into_key()),
            (None, Some(url)) if !url.trim().is_empty() => ImageSelector::Reference(url),
            _ => return Err(ToolCallError::MissingSelection),
        };

        let channel = args.channel.trim().to_string();
        if channel.is_empty() {
            return Err(ToolCallError::MalformedArguments(
                "channel must not be empty".to_string(),
            ));
        }

        Ok(Self {
            selector,
            channel,
            context: args.context.filter(|c| !c.trim().is_empty()),
        })
    }
}
