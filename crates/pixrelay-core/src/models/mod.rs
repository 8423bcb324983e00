pub mod image;
pub mod payload;
pub mod tool;

pub use image::{
    AssemblyOptions, ImageCandidate, ResizeBound, ValidationPolicy, DEFAULT_JPEG_QUALITY,
    DEFAULT_MAX_DIMENSION, MAX_BASE64_SIZE, MAX_FILE_SIZE, MAX_IMAGES, MAX_PIXELS,
};
pub use payload::{label_images, ContentBlock, ImageUrl, RequestPayload, DEFAULT_PROMPT};
pub use tool::{ImageSelector, SelectionError, ToolCallError, ToolInvocation, UPLOAD_IMAGE_TOOL};
