//! Content blocks sent as the user message of a chat completion request

use serde::{Deserialize, Serialize};

/// Prompt used when the user supplies images without any text
pub const DEFAULT_PROMPT: &str = "What's in this image?";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One element of a multimodal message, in the chat API's wire shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentBlock {
    pub fn is_text(&self) -> bool {
        matches!(self, ContentBlock::Text { .. })
    }

    pub fn as_image_url(&self) -> Option<&str> {
        match self {
            ContentBlock::ImageUrl { image_url } => Some(&image_url.url),
            ContentBlock::Text { .. } => None,
        }
    }
}

/// Ordered payload: one text block, then one image block per input path.
///
/// Image block `i` (1-based) always corresponds to the `i`-th path named in the text
/// block, so a model reference to "image N" resolves to `image(N)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RequestPayload {
    blocks: Vec<ContentBlock>,
}

impl RequestPayload {
    /// Build the payload from the text block and encoded data URLs in input order
    pub fn new(text: String, data_urls: Vec<String>) -> Self {
        let mut blocks = Vec::with_capacity(data_urls.len() + 1);
        blocks.push(ContentBlock::Text { text });
        blocks.extend(data_urls.into_iter().map(|url| ContentBlock::ImageUrl {
            image_url: ImageUrl { url },
        }));
        Self { blocks }
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<ContentBlock> {
        self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn text(&self) -> &str {
        match self.blocks.first() {
            Some(ContentBlock::Text { text }) => text,
            _ => "",
        }
    }

    pub fn image_count(&self) -> usize {
        self.blocks.len().saturating_sub(1)
    }

    /// Image block by 1-based index
    pub fn image(&self, index: usize) -> Option<&str> {
        if index == 0 {
            return None;
        }
        self.blocks.get(index).and_then(ContentBlock::as_image_url)
    }
}

/// Leading text block: the user's message followed by one label per image
pub fn label_images<S: AsRef<str>>(message: &str, paths: &[S]) -> String {
    let message = if message.trim().is_empty() {
        DEFAULT_PROMPT
    } else {
        message
    };

    if paths.is_empty() {
        return message.to_string();
    }

    let labels = paths
        .iter()
        .enumerate()
        .map(|(i, path)| format!("Image {}: {}", i + 1, path.as_ref()))
        .collect::<Vec<_>>()
        .join("\n");

    format!("{}\n\n{}", message, labels)
}
